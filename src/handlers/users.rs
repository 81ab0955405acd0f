use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::schemas::{ApiResponse, AppState};
use crate::storage::ObjectStorage;
use axum::{extract::State, http::StatusCode, response::Json};
use catalog::{profiles, tokens, users};
use chrono::{DateTime, Utc};
use model::entities::{profile, user};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Request body for creating an account
#[derive(Deserialize, Serialize, ToSchema, Validate, Default)]
#[serde(default)]
pub struct SignupRequest {
    /// 150 characters or fewer. Letters, digits and @/./+/-/_ only.
    #[validate(
        length(min = 1, max = 150, message = "Ensure this field has between 1 and 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: String,
    #[validate(length(max = 150))]
    pub first_name: String,
    #[validate(length(max = 150))]
    pub last_name: String,
}

/// Request body for exchanging credentials for a token
#[derive(Deserialize, Serialize, ToSchema, Validate, Default)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub email: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if username.chars().all(allowed) {
        Ok(())
    } else {
        let mut error = ValidationError::new("username");
        error.message = Some(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .into(),
        );
        Err(error)
    }
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// URL of the profile image
    pub image: Option<String>,
    pub date_joined: DateTime<Utc>,
}

impl UserResponse {
    pub fn new(
        model: user::Model,
        profile: Option<profile::Model>,
        storage: &dyn ObjectStorage,
    ) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            image: profile
                .and_then(|p| p.image)
                .map(|key| storage.url(&key)),
            date_joined: model.date_joined,
        }
    }

    /// Loads the profile and renders the user.
    pub async fn load(state: &AppState, model: user::Model) -> Result<Self, ApiError> {
        let profile = profiles::find_profile(&state.db, model.id).await?;
        Ok(Self::new(model, profile, state.storage.as_ref()))
    }
}

/// Token plus the account it authenticates
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    /// Whether a token was deleted
    pub revoked: bool,
}

/// Create an account and return its token
#[utoipa::path(
    post,
    path = "/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Invalid or conflicting fields", body = crate::schemas::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SignupRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), ApiError> {
    trace!("Entering signup function");
    request.validate()?;

    let new_user = users::NewUser {
        username: request.username,
        email: request.email,
        password: request.password,
        first_name: request.first_name,
        last_name: request.last_name,
    };
    let user_model = users::create_user(&state.db, new_user).await?;
    let token = tokens::get_or_create_token(&state.db, user_model.id).await?;

    info!(
        "User signed up with ID: {}, username: {}",
        user_model.id, user_model.username
    );
    let response = ApiResponse::ok(
        AuthResponse {
            token: token.key,
            user: UserResponse::new(user_model, None, state.storage.as_ref()),
        },
        "Account created successfully",
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// Exchange email and password for the account's token
///
/// The same token is returned on every login until it is revoked by logging out.
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Missing or wrong credentials", body = crate::schemas::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    trace!("Entering login function");
    request.validate()?;

    let Some(user_model) = users::authenticate(&state.db, &request.email, &request.password).await?
    else {
        warn!("Rejected login attempt");
        return Err(ApiError::BadRequest {
            code: "INVALID_CREDENTIALS",
            message: "Unable to log in with provided credentials.".to_string(),
        });
    };

    let token = tokens::get_or_create_token(&state.db, user_model.id).await?;
    debug!("Token issued for user {}", user_model.id);

    info!("User {} logged in", user_model.id);
    let response = ApiResponse::ok(
        AuthResponse {
            token: token.key,
            user: UserResponse::load(&state, user_model).await?,
        },
        "Logged in successfully",
    );
    Ok(Json(response))
}

/// Revoke the caller's token
#[utoipa::path(
    post,
    path = "/logout",
    tag = "auth",
    security(("token" = [])),
    responses(
        (status = 200, description = "Token revoked", body = ApiResponse<LogoutResponse>),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, user_model), fields(user_id = user_model.id))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_model): AuthUser,
) -> Result<Json<ApiResponse<LogoutResponse>>, ApiError> {
    trace!("Entering logout function");
    let revoked = tokens::revoke_token(&state.db, user_model.id).await?;
    info!("User {} logged out", user_model.id);
    Ok(Json(ApiResponse::ok(
        LogoutResponse { revoked },
        "Logged out successfully",
    )))
}
