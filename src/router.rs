use crate::config::StorageBackend;
use crate::handlers::{
    health::health_check,
    products::{
        create_product, delete_product, filter_products, get_categories, get_max_price,
        get_product, list_products, toggle_popularity, upload_product_image,
    },
    profile::{get_profile, update_profile},
    users::{login, logout, signup},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::debug;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Room for the text fields and multipart framing around an image.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.settings.upload.max_image_bytes + FORM_OVERHEAD_BYTES;

    let mut router = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Authentication
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        // Catalog
        .route("/products", get(list_products).post(create_product))
        .route("/products/filter", post(filter_products))
        .route(
            "/products/:product_id",
            get(get_product).delete(delete_product),
        )
        .route("/products/:product_id/images", post(upload_product_image))
        .route(
            "/products/:product_id/toggle-popularity",
            post(toggle_popularity),
        )
        .route("/categories", get(get_categories))
        .route("/max-price", get(get_max_price))
        // Profile
        .route("/profile", get(get_profile).put(update_profile))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // Local uploads are served by the API itself
    let storage = &state.settings.storage;
    if storage.backend == StorageBackend::Local {
        let mount = storage.local_public_url().trim_end_matches('/');
        if mount.starts_with('/') {
            debug!("Serving {} at {}", storage.root.display(), mount);
            router = router.nest_service(mount, ServeDir::new(&storage.root));
        }
    }

    router
        // Add middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
