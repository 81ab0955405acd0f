use crate::config::Settings;
use crate::handlers::products::{
    CreateProductRequest, ImageUploadForm, MaxPriceResponse, ProductDetailResponse,
    ProductImageResponse, ProductListQuery, ProductResponse,
};
use crate::handlers::profile::{ProfileResponse, ProfileUpdateForm};
use crate::handlers::users::{
    AuthResponse, LoginRequest, LogoutResponse, SignupRequest, UserResponse,
};
use crate::storage::ObjectStorage;
use common::{ProductFilter, SortBy, ToggleResult};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

pub use common::ApiResponse;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Where uploaded images go
    pub storage: Arc<dyn ObjectStorage>,
    pub settings: Arc<Settings>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
    /// Messages per invalid request field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// Registers the bearer token scheme referenced by protected endpoints.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Token returned by /signup or /login. `Token <key>` is accepted too.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::users::signup,
        crate::handlers::users::login,
        crate::handlers::users::logout,
        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::products::filter_products,
        crate::handlers::products::get_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::upload_product_image,
        crate::handlers::products::toggle_popularity,
        crate::handlers::products::get_categories,
        crate::handlers::products::get_max_price,
        crate::handlers::profile::get_profile,
        crate::handlers::profile::update_profile,
    ),
    components(
        schemas(
            ApiResponse<AuthResponse>,
            ApiResponse<ProductResponse>,
            ApiResponse<Vec<ProductResponse>>,
            ApiResponse<ProfileResponse>,
            ErrorResponse,
            HealthResponse,
            SignupRequest,
            LoginRequest,
            AuthResponse,
            LogoutResponse,
            UserResponse,
            ProductListQuery,
            CreateProductRequest,
            ProductResponse,
            ProductImageResponse,
            ProductDetailResponse,
            MaxPriceResponse,
            ImageUploadForm,
            ProductFilter,
            SortBy,
            ToggleResult,
            ProfileResponse,
            ProfileUpdateForm,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Signup, login and logout"),
        (name = "products", description = "Catalog browsing, filtering and voting"),
        (name = "profile", description = "The authenticated user's profile"),
    ),
    info(
        title = "Marketplace API",
        description = "Product marketplace with token authentication, catalog filtering, popularity voting and profile management",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
