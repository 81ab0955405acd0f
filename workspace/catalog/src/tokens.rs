use chrono::Utc;
use model::entities::{auth_token, user};
use rand::RngCore;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, info, instrument, warn};

use crate::error::{CatalogError, Result};

/// Number of random bytes in a token key; the key is their lowercase hex encoding.
pub const TOKEN_BYTES: usize = 20;

/// Generates a fresh 40-character token key.
pub fn generate_key() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Cheap shape check run before touching the database.
pub fn is_well_formed(key: &str) -> bool {
    key.len() == TOKEN_BYTES * 2 && key.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Returns the user's token, creating it on first authentication.
///
/// Repeated calls return the same key until the token is revoked.
#[instrument(skip(db))]
pub async fn get_or_create_token<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<auth_token::Model> {
    if let Some(existing) = find_token_for_user(db, user_id).await? {
        debug!("Reusing existing token for user {}", user_id);
        return Ok(existing);
    }

    let new_token = auth_token::ActiveModel {
        key: Set(generate_key()),
        user_id: Set(user_id),
        created: Set(Utc::now()),
    };

    match new_token.insert(db).await {
        Ok(token) => {
            info!("Issued new token for user {}", user_id);
            Ok(token)
        }
        Err(insert_error) => {
            // A concurrent login may have inserted the row first.
            warn!(
                "Token insert for user {} failed, re-reading: {}",
                user_id, insert_error
            );
            find_token_for_user(db, user_id)
                .await?
                .ok_or(CatalogError::Database(insert_error))
        }
    }
}

pub async fn find_token_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Option<auth_token::Model>> {
    Ok(auth_token::Entity::find()
        .filter(auth_token::Column::UserId.eq(user_id))
        .one(db)
        .await?)
}

/// Resolves a presented key to its user.
pub async fn user_for_token<C: ConnectionTrait>(db: &C, key: &str) -> Result<Option<user::Model>> {
    if !is_well_formed(key) {
        return Ok(None);
    }
    let found = auth_token::Entity::find_by_id(key.to_string())
        .find_also_related(user::Entity)
        .one(db)
        .await?;
    Ok(found.and_then(|(_, owner)| owner))
}

/// Deletes the user's token. Returns whether one existed.
#[instrument(skip(db))]
pub async fn revoke_token<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<bool> {
    let result = auth_token::Entity::delete_many()
        .filter(auth_token::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    debug!("Revoked {} token(s) for user {}", result.rows_affected, user_id);
    Ok(result.rows_affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_user, setup_db};

    #[test]
    fn test_generated_key_shape() {
        let key = generate_key();
        assert_eq!(key.len(), 40);
        assert!(is_well_formed(&key));
        assert_eq!(key, key.to_lowercase());
        assert_ne!(key, generate_key());
    }

    #[test]
    fn test_malformed_keys() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed(&"z".repeat(40)));
        assert!(!is_well_formed(&"a".repeat(41)));
    }

    #[tokio::test]
    async fn test_token_reused_until_revoked() {
        let db = setup_db().await;
        let ada = seed_user(&db, "ada").await;

        let first = get_or_create_token(&db, ada.id).await.unwrap();
        let second = get_or_create_token(&db, ada.id).await.unwrap();
        assert_eq!(first.key, second.key);

        let owner = user_for_token(&db, &first.key).await.unwrap();
        assert_eq!(owner.map(|u| u.id), Some(ada.id));

        assert!(revoke_token(&db, ada.id).await.unwrap());
        assert!(!revoke_token(&db, ada.id).await.unwrap());
        assert!(user_for_token(&db, &first.key).await.unwrap().is_none());

        let rotated = get_or_create_token(&db, ada.id).await.unwrap();
        assert_ne!(rotated.key, first.key);
    }

    #[tokio::test]
    async fn test_tokens_are_per_user() {
        let db = setup_db().await;
        let ada = seed_user(&db, "ada").await;
        let grace = seed_user(&db, "grace").await;

        let ada_token = get_or_create_token(&db, ada.id).await.unwrap();
        let grace_token = get_or_create_token(&db, grace.id).await.unwrap();
        assert_ne!(ada_token.key, grace_token.key);

        let resolved = user_for_token(&db, &grace_token.key).await.unwrap();
        assert_eq!(resolved.map(|u| u.username), Some("grace".to_string()));
    }
}
