use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::MultipartBody;
use crate::handlers::products::ProductResponse;
use crate::handlers::uploads::{self, PROFILE_IMAGE_PREFIX, UploadedImage};
use crate::handlers::users::{UserResponse, validate_username};
use crate::schemas::{ApiResponse, AppState};
use axum::{
    extract::{Multipart, State},
    response::Json,
};
use catalog::{CatalogError, products, profiles, users};
use model::entities::user;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace};
use utoipa::ToSchema;
use validator::{Validate, ValidateEmail, ValidationError};

/// The caller's account together with what they listed and voted for
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub user: UserResponse,
    /// Products owned by the user, newest first
    pub products: Vec<ProductResponse>,
    /// Products the user voted for, newest first
    pub favorites: Vec<ProductResponse>,
}

/// Multipart body of a profile update. Omitted fields keep their value.
#[derive(Debug, Default, ToSchema, Validate)]
pub struct ProfileUpdateForm {
    #[validate(
        length(min = 1, max = 150, message = "Ensure this field has between 1 and 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,
    #[validate(custom(function = "validate_optional_email"))]
    pub email: Option<String>,
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    /// New profile image
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<UploadedImage>,
}

fn validate_optional_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() || email.validate_email() {
        Ok(())
    } else {
        let mut error = ValidationError::new("email");
        error.message = Some("Enter a valid email address.".into());
        Err(error)
    }
}

impl ProfileUpdateForm {
    /// Collects the form fields, ignoring parts this endpoint does not know.
    pub async fn from_multipart(
        multipart: &mut Multipart,
        max_image_bytes: usize,
    ) -> Result<Self, ApiError> {
        let mut form = ProfileUpdateForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match name.as_str() {
                "image" => form.image = uploads::read_image(field, max_image_bytes).await?,
                "username" => form.username = Some(field.text().await?.trim().to_string()),
                "email" => form.email = Some(field.text().await?.trim().to_string()),
                "first_name" => form.first_name = Some(field.text().await?),
                "last_name" => form.last_name = Some(field.text().await?),
                other => debug!("Ignoring unknown form field '{}'", other),
            }
        }
        Ok(form)
    }

    fn changes(&self) -> users::UserChanges {
        users::UserChanges {
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// Get the caller's profile
#[utoipa::path(
    get,
    path = "/profile",
    tag = "profile",
    security(("token" = [])),
    responses(
        (status = 200, description = "Profile retrieved successfully", body = ApiResponse<ProfileResponse>),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    trace!("Entering get_profile function");

    let storage = state.storage.as_ref();
    let owned = products::owned_by(&state.db, user.id).await?;
    let favorites = products::favorites_of(&state.db, &user).await?;
    debug!(
        "User {} owns {} products and voted for {}",
        user.id,
        owned.len(),
        favorites.len()
    );

    let response = ProfileResponse {
        user: UserResponse::load(&state, user).await?,
        products: ProductResponse::list(owned, storage),
        favorites: ProductResponse::list(favorites, storage),
    };
    Ok(Json(ApiResponse::ok(response, "Profile retrieved successfully")))
}

/// Update the caller's account and profile image
///
/// Only the submitted fields change. Without an `image` part the stored
/// image is kept.
#[utoipa::path(
    put,
    path = "/profile",
    tag = "profile",
    security(("token" = [])),
    request_body(content = ProfileUpdateForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Profile updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid or conflicting fields", body = crate::schemas::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 500, description = "Storage or database failure", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, user, multipart), fields(user_id = user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    MultipartBody(mut multipart): MultipartBody,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering update_profile function");

    let form =
        ProfileUpdateForm::from_multipart(&mut multipart, state.settings.upload.max_image_bytes)
            .await?;
    form.validate()?;
    let user_id = user.id;
    let changes = form.changes();

    // The object goes in first so a storage failure leaves the account untouched
    let new_key = match form.image {
        Some(image) => {
            let key = image.key(PROFILE_IMAGE_PREFIX);
            state
                .storage
                .put(&key, &image.content_type, image.bytes)
                .await?;
            Some(key)
        }
        None => None,
    };

    let (updated, replaced) =
        match apply_profile_update(&state.db, user, changes, new_key.clone()).await {
            Ok(result) => result,
            Err(e) => {
                if let Some(key) = new_key {
                    error!("Profile update of user {} failed after upload: {}", user_id, e);
                    uploads::discard_objects(state.storage.as_ref(), &[key]).await;
                }
                return Err(e.into());
            }
        };

    if let Some(previous) = replaced {
        uploads::discard_objects(state.storage.as_ref(), &[previous]).await;
    }
    if new_key.is_some() {
        info!("Profile image of user {} replaced", user_id);
    }

    info!("Profile of user {} updated", user_id);
    Ok(Json(ApiResponse::ok(
        UserResponse::load(&state, updated).await?,
        "Profile updated successfully",
    )))
}

/// Writes the user fields and the image key together.
///
/// Returns the updated user and the key of the image it replaced.
async fn apply_profile_update(
    db: &DatabaseConnection,
    user: user::Model,
    changes: users::UserChanges,
    image_key: Option<String>,
) -> Result<(user::Model, Option<String>), CatalogError> {
    let txn = db.begin().await?;
    let user_id = user.id;
    let updated = users::update_user(&txn, user, changes).await?;
    let replaced = match image_key {
        Some(key) => profiles::set_profile_image(&txn, user_id, key).await?,
        None => None,
    };
    txn.commit().await?;
    Ok((updated, replaced))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_email_is_allowed() {
        assert!(validate_optional_email("").is_ok());
        assert!(validate_optional_email("ada@example.com").is_ok());
        assert!(validate_optional_email("nope").is_err());
    }

    #[test]
    fn test_form_validation() {
        let form = ProfileUpdateForm {
            username: Some("bad name".to_string()),
            ..Default::default()
        };
        assert!(form.validate().is_err());

        let form = ProfileUpdateForm {
            first_name: Some("Augusta".to_string()),
            ..Default::default()
        };
        assert!(form.validate().is_ok());
        assert!(form.changes().username.is_none());
    }
}
