use chrono::Utc;
use model::entities::user;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set, SqlErr,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{CatalogError, Result};
use crate::passwords::{hash_password, verify_password};

/// Fields needed to register an account.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

// Keeps the password out of `#[instrument]` output.
impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Partial update of a user record. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Whether `username` belongs to a user other than `exclude`.
pub async fn username_taken<C: ConnectionTrait>(
    db: &C,
    username: &str,
    exclude: Option<i32>,
) -> Result<bool> {
    let mut query = user::Entity::find().filter(user::Column::Username.eq(username));
    if let Some(id) = exclude {
        query = query.filter(user::Column::Id.ne(id));
    }
    Ok(query.count(db).await? > 0)
}

/// Whether a non-empty `email` belongs to a user other than `exclude`.
pub async fn email_taken<C: ConnectionTrait>(
    db: &C,
    email: &str,
    exclude: Option<i32>,
) -> Result<bool> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Ok(false);
    }
    let mut query = user::Entity::find().filter(user::Column::Email.eq(email));
    if let Some(id) = exclude {
        query = query.filter(user::Column::Id.ne(id));
    }
    Ok(query.count(db).await? > 0)
}

/// Maps a unique index violation to the field it guards.
///
/// The lookups in `create_user` and `update_user` catch the common case; this
/// covers a concurrent request claiming the same value in between.
fn conflict_error(err: DbErr, username: &str, email: &str) -> CatalogError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            warn!("Unique constraint violated: {}", detail);
            if detail.contains("email") {
                CatalogError::EmailTaken(normalize_email(email))
            } else {
                CatalogError::UsernameTaken(username.to_string())
            }
        }
        _ => err.into(),
    }
}

/// Registers a new account, rejecting taken usernames and emails.
#[instrument(skip(db))]
pub async fn create_user<C: ConnectionTrait>(db: &C, new_user: NewUser) -> Result<user::Model> {
    if username_taken(db, &new_user.username, None).await? {
        warn!("Username '{}' is already taken", new_user.username);
        return Err(CatalogError::UsernameTaken(new_user.username));
    }
    if email_taken(db, &new_user.email, None).await? {
        warn!("Email '{}' is already registered", new_user.email);
        return Err(CatalogError::EmailTaken(normalize_email(&new_user.email)));
    }

    let password_hash = hash_password(&new_user.password)?;
    let created = user::ActiveModel {
        username: Set(new_user.username.clone()),
        email: Set(normalize_email(&new_user.email)),
        first_name: Set(new_user.first_name),
        last_name: Set(new_user.last_name),
        password_hash: Set(password_hash),
        date_joined: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| conflict_error(e, &new_user.username, &new_user.email))?;

    info!("Created user {} ({})", created.id, created.username);
    Ok(created)
}

/// Checks an email/password pair. `Ok(None)` means the credentials are wrong.
#[instrument(skip(db, password))]
pub async fn authenticate<C: ConnectionTrait>(
    db: &C,
    email: &str,
    password: &str,
) -> Result<Option<user::Model>> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Ok(None);
    }

    let Some(candidate) = user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?
    else {
        debug!("No user registered with email {}", email);
        return Ok(None);
    };

    if verify_password(password, &candidate.password_hash) {
        debug!("Credentials accepted for user {}", candidate.id);
        Ok(Some(candidate))
    } else {
        debug!("Password mismatch for user {}", candidate.id);
        Ok(None)
    }
}

/// Merges `changes` into `existing`, enforcing username and email uniqueness.
#[instrument(skip(db, existing), fields(user_id = existing.id))]
pub async fn update_user<C: ConnectionTrait>(
    db: &C,
    existing: user::Model,
    changes: UserChanges,
) -> Result<user::Model> {
    if changes.is_empty() {
        debug!("No user fields to update");
        return Ok(existing);
    }

    if let Some(username) = &changes.username {
        if username_taken(db, username, Some(existing.id)).await? {
            return Err(CatalogError::UsernameTaken(username.clone()));
        }
    }
    if let Some(email) = &changes.email {
        if email_taken(db, email, Some(existing.id)).await? {
            return Err(CatalogError::EmailTaken(normalize_email(email)));
        }
    }

    let requested_username = changes.username.clone().unwrap_or_default();
    let requested_email = changes.email.clone().unwrap_or_default();

    let mut active: user::ActiveModel = existing.into();
    let mut updated_fields = Vec::new();
    if let Some(username) = changes.username {
        active.username = Set(username);
        updated_fields.push("username");
    }
    if let Some(email) = changes.email {
        active.email = Set(normalize_email(&email));
        updated_fields.push("email");
    }
    if let Some(first_name) = changes.first_name {
        active.first_name = Set(first_name);
        updated_fields.push("first_name");
    }
    if let Some(last_name) = changes.last_name {
        active.last_name = Set(last_name);
        updated_fields.push("last_name");
    }

    let updated = active
        .update(db)
        .await
        .map_err(|e| conflict_error(e, &requested_username, &requested_email))?;
    info!("Updated user {}: {}", updated.id, updated_fields.join(", "));
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::setup_db;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "correct-horse-battery".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let db = setup_db().await;
        let created = create_user(&db, new_user("ada", " Ada@Example.com "))
            .await
            .unwrap();
        assert_eq!(created.email, "ada@example.com");
        assert_ne!(created.password_hash, "correct-horse-battery");

        let found = authenticate(&db, "ADA@example.com", "correct-horse-battery")
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));

        let wrong = authenticate(&db, "ada@example.com", "wrong").await.unwrap();
        assert!(wrong.is_none());
        let unknown = authenticate(&db, "nobody@example.com", "x").await.unwrap();
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let db = setup_db().await;
        create_user(&db, new_user("ada", "ada@example.com"))
            .await
            .unwrap();

        let err = create_user(&db, new_user("ada", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::UsernameTaken(ref name) if name == "ada"));
        assert_eq!(user::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_but_blank_allowed() {
        let db = setup_db().await;
        create_user(&db, new_user("ada", "ada@example.com"))
            .await
            .unwrap();
        let err = create_user(&db, new_user("grace", "ADA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::EmailTaken(_)));

        create_user(&db, new_user("blank1", "")).await.unwrap();
        create_user(&db, new_user("blank2", "")).await.unwrap();
    }

    #[tokio::test]
    async fn test_unique_index_violation_maps_to_field() {
        let db = setup_db().await;
        create_user(&db, new_user("ada", "ada@example.com"))
            .await
            .unwrap();

        // Inserting directly skips the lookups, as a concurrent signup would
        let raw = |username: &str, email: &str| user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            password_hash: Set("!".to_string()),
            date_joined: Set(Utc::now()),
            ..Default::default()
        };

        let err = raw("ada", "fresh@example.com").insert(&db).await.unwrap_err();
        assert!(matches!(
            conflict_error(err, "ada", "fresh@example.com"),
            CatalogError::UsernameTaken(ref name) if name == "ada"
        ));

        let err = raw("grace", "ada@example.com").insert(&db).await.unwrap_err();
        assert!(matches!(
            conflict_error(err, "grace", "ADA@example.com"),
            CatalogError::EmailTaken(ref email) if email == "ada@example.com"
        ));

        let other = conflict_error(DbErr::Custom("boom".to_string()), "ada", "");
        assert!(matches!(other, CatalogError::Database(_)));
    }

    #[tokio::test]
    async fn test_update_user_merges_fields() {
        let db = setup_db().await;
        let ada = create_user(&db, new_user("ada", "ada@example.com"))
            .await
            .unwrap();
        create_user(&db, new_user("grace", "grace@example.com"))
            .await
            .unwrap();

        let updated = update_user(
            &db,
            ada.clone(),
            UserChanges {
                first_name: Some("Augusta".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.first_name, "Augusta");
        assert_eq!(updated.last_name, "Lovelace");
        assert_eq!(updated.username, "ada");

        // Keeping one's own username is not a conflict
        let same = update_user(
            &db,
            updated.clone(),
            UserChanges {
                username: Some("ada".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(same.is_ok());

        let conflict = update_user(
            &db,
            updated,
            UserChanges {
                username: Some("grace".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(conflict, Err(CatalogError::UsernameTaken(_))));
    }
}
