use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::{JsonBody, MultipartBody};
use crate::handlers::uploads::{self, PRODUCT_IMAGE_PREFIX};
use crate::schemas::{ApiResponse, AppState};
use crate::storage::ObjectStorage;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use catalog::{products, votes};
use chrono::{DateTime, Utc};
use common::{ProductFilter, ToggleResult};
use model::entities::{product, product_image};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

/// Query parameters for listing products
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ProductListQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

/// Request body for listing a new product
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate, Default)]
#[serde(default)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    pub name: String,
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Ensure this field has between 1 and 100 characters."))]
    pub category: String,
    /// Price with at most two decimal places
    #[schema(value_type = Option<String>, example = "19.99")]
    #[validate(required(message = "This field is required."), custom(function = "validate_price"))]
    pub price: Option<Decimal>,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    let max = Decimal::new(9_999_999_999, 2);
    let message = if price.is_sign_negative() {
        "Ensure this value is greater than or equal to 0."
    } else if *price > max {
        "Ensure that there are no more than 10 digits in total."
    } else if price.normalize().scale() > 2 {
        "Ensure that there are no more than 2 decimal places."
    } else {
        return Ok(());
    };
    let mut error = ValidationError::new("price");
    error.message = Some(message.into());
    Err(error)
}

/// Prices are always rendered with two decimal places.
fn money(value: Decimal) -> Decimal {
    let mut value = value.round_dp(2);
    value.rescale(2);
    value
}

/// Product response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: i32,
    pub name: String,
    pub title: String,
    pub category: String,
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
    /// Number of users who voted for the product
    pub popularity: i32,
    pub views: i32,
    /// URL of the cover image
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub owner_id: i32,
}

impl ProductResponse {
    pub fn new(model: product::Model, storage: &dyn ObjectStorage) -> Self {
        Self {
            id: model.id,
            name: model.name,
            title: model.title,
            category: model.category,
            price: money(model.price),
            popularity: model.popularity,
            views: model.views,
            image: model.image.map(|key| storage.url(&key)),
            created_at: model.created_at,
            owner_id: model.owner_id,
        }
    }

    pub fn list(models: Vec<product::Model>, storage: &dyn ObjectStorage) -> Vec<Self> {
        models
            .into_iter()
            .map(|model| Self::new(model, storage))
            .collect()
    }
}

/// Gallery image response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductImageResponse {
    pub id: i32,
    pub product_id: i32,
    /// URL of the image
    pub image: String,
    pub created_at: DateTime<Utc>,
}

impl ProductImageResponse {
    pub fn new(model: product_image::Model, storage: &dyn ObjectStorage) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            image: storage.url(&model.image),
            created_at: model.created_at,
        }
    }
}

/// A product together with its gallery
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductDetailResponse {
    pub product: ProductResponse,
    pub images: Vec<ProductImageResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MaxPriceResponse {
    /// Highest price in the catalog, null when there are no products
    #[schema(value_type = Option<String>, example = "250.00")]
    pub max_price: Option<Decimal>,
}

/// Multipart body of an image upload
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ImageUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

/// List products, newest first
#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products retrieved successfully", body = ApiResponse<Vec<ProductResponse>>),
        (status = 400, description = "Invalid pagination", body = crate::schemas::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Valid(Query(query)): Valid<Query<ProductListQuery>>,
) -> Result<Json<ApiResponse<Vec<ProductResponse>>>, ApiError> {
    trace!("Entering list_products function");
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(50);
    debug!("Fetching products - page: {}, limit: {}", page, limit);

    let models = products::list_products(&state.db, page, limit).await?;
    info!("Successfully retrieved {} products", models.len());
    Ok(Json(ApiResponse::ok(
        ProductResponse::list(models, state.storage.as_ref()),
        "Products retrieved successfully",
    )))
}

/// List a new product owned by the caller
#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    security(("token" = [])),
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created successfully", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, owner), fields(owner_id = owner.id))]
pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    JsonBody(request): JsonBody<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponse>>), ApiError> {
    trace!("Entering create_product function");
    request.validate()?;
    let price = request
        .price
        .ok_or_else(|| ApiError::field("price", "This field is required."))?;

    let model = products::create_product(
        &state.db,
        owner.id,
        products::NewProduct {
            name: request.name,
            title: request.title,
            category: request.category,
            price: price.round_dp(2),
        },
    )
    .await?;

    info!("Product created successfully with ID: {}", model.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            ProductResponse::new(model, state.storage.as_ref()),
            "Product created successfully",
        )),
    ))
}

/// Filter and sort the catalog
///
/// All criteria are optional and combined with AND; `search` matches the
/// name or the title.
#[utoipa::path(
    post,
    path = "/products/filter",
    tag = "products",
    request_body = ProductFilter,
    responses(
        (status = 200, description = "Matching products", body = ApiResponse<Vec<ProductResponse>>),
        (status = 400, description = "Invalid price range or sort order", body = crate::schemas::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn filter_products(
    State(state): State<AppState>,
    JsonBody(filter): JsonBody<ProductFilter>,
) -> Result<Json<ApiResponse<Vec<ProductResponse>>>, ApiError> {
    trace!("Entering filter_products function");
    filter.validate()?;

    let models = products::filter_products(&state.db, &filter).await?;
    info!("Filter returned {} products", models.len());
    Ok(Json(ApiResponse::ok(
        ProductResponse::list(models, state.storage.as_ref()),
        "Products retrieved successfully",
    )))
}

/// Get a product with its gallery
///
/// Every successful call counts as one view.
#[utoipa::path(
    get,
    path = "/products/{product_id}",
    tag = "products",
    params(
        ("product_id" = i32, Path, description = "Product ID"),
    ),
    responses(
        (status = 200, description = "Product retrieved successfully", body = ApiResponse<ProductDetailResponse>),
        (status = 404, description = "Product not found", body = crate::schemas::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_product(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ProductDetailResponse>>, ApiError> {
    trace!("Entering get_product function for product_id: {}", product_id);

    let model = products::record_view(&state.db, product_id).await?;
    let gallery = products::gallery(&state.db, &model).await?;
    debug!(
        "Product {} has {} views and {} gallery images",
        model.id,
        model.views,
        gallery.len()
    );

    let storage = state.storage.as_ref();
    let detail = ProductDetailResponse {
        product: ProductResponse::new(model, storage),
        images: gallery
            .into_iter()
            .map(|image| ProductImageResponse::new(image, storage))
            .collect(),
    };
    Ok(Json(ApiResponse::ok(detail, "Product retrieved successfully")))
}

/// Delete a product the caller owns
#[utoipa::path(
    delete,
    path = "/products/{product_id}",
    tag = "products",
    security(("token" = [])),
    params(
        ("product_id" = i32, Path, description = "Product ID"),
    ),
    responses(
        (status = 200, description = "Product deleted successfully", body = ApiResponse<ProductResponse>),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 403, description = "Caller does not own the product", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::schemas::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_product(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<ProductResponse>>, ApiError> {
    trace!("Entering delete_product function for product_id: {}", product_id);

    let (model, released) = products::delete_product(&state.db, product_id, user.id).await?;
    uploads::discard_objects(state.storage.as_ref(), &released).await;

    info!("Product {} deleted by user {}", product_id, user.id);
    Ok(Json(ApiResponse::ok(
        ProductResponse::new(model, state.storage.as_ref()),
        "Product deleted successfully",
    )))
}

/// Add an image to the product's gallery
///
/// The first image also becomes the product's cover image.
#[utoipa::path(
    post,
    path = "/products/{product_id}/images",
    tag = "products",
    security(("token" = [])),
    params(
        ("product_id" = i32, Path, description = "Product ID"),
    ),
    request_body(content = ImageUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored", body = ApiResponse<ProductImageResponse>),
        (status = 400, description = "Missing or invalid image", body = crate::schemas::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 403, description = "Caller does not own the product", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::schemas::ErrorResponse),
        (status = 500, description = "Storage or database failure", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, user, multipart), fields(user_id = user.id))]
pub async fn upload_product_image(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    MultipartBody(mut multipart): MultipartBody,
) -> Result<(StatusCode, Json<ApiResponse<ProductImageResponse>>), ApiError> {
    trace!("Entering upload_product_image function for product_id: {}", product_id);

    // Reject strangers before accepting any bytes into storage
    products::find_owned_product(&state.db, product_id, user.id).await?;

    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("image") {
            image = uploads::read_image(field, state.settings.upload.max_image_bytes).await?;
        }
    }
    let image = image.ok_or_else(|| ApiError::field("image", "No file was submitted."))?;

    let key = image.key(PRODUCT_IMAGE_PREFIX);
    state
        .storage
        .put(&key, &image.content_type, image.bytes)
        .await?;

    let stored = match products::add_gallery_image(&state.db, product_id, user.id, key.clone()).await {
        Ok(stored) => stored,
        Err(e) => {
            error!("Failed to record image {} for product {}: {}", key, product_id, e);
            uploads::discard_objects(state.storage.as_ref(), &[key]).await;
            return Err(e.into());
        }
    };

    info!("Stored image {} for product {}", stored.id, product_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            ProductImageResponse::new(stored, state.storage.as_ref()),
            "Image uploaded successfully",
        )),
    ))
}

/// Add or remove the caller's vote
#[utoipa::path(
    post,
    path = "/products/{product_id}/toggle-popularity",
    tag = "products",
    security(("token" = [])),
    params(
        ("product_id" = i32, Path, description = "Product ID"),
    ),
    responses(
        (status = 200, description = "Vote toggled", body = ApiResponse<ToggleResult>),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::schemas::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn toggle_popularity(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<ToggleResult>>, ApiError> {
    trace!("Entering toggle_popularity function for product_id: {}", product_id);

    let result = votes::toggle_vote(&state.db, product_id, user.id).await?;
    let message = if result.voted {
        "Vote added"
    } else {
        "Vote removed"
    };
    Ok(Json(ApiResponse::ok(result, message)))
}

/// Distinct product categories, alphabetically
#[utoipa::path(
    get,
    path = "/categories",
    tag = "products",
    responses(
        (status = 200, description = "Categories retrieved successfully", body = ApiResponse<Vec<String>>),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    trace!("Entering get_categories function");
    let categories = products::categories(&state.db).await?;
    debug!("Found {} categories", categories.len());
    Ok(Json(ApiResponse::ok(
        categories,
        "Categories retrieved successfully",
    )))
}

/// Highest product price, used to bound price sliders
#[utoipa::path(
    get,
    path = "/max-price",
    tag = "products",
    responses(
        (status = 200, description = "Maximum price retrieved successfully", body = ApiResponse<MaxPriceResponse>),
        (status = 500, description = "Internal server error", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_max_price(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MaxPriceResponse>>, ApiError> {
    trace!("Entering get_max_price function");
    let max_price = products::max_price(&state.db).await?;
    Ok(Json(ApiResponse::ok(
        MaxPriceResponse {
            max_price: max_price.map(money),
        },
        "Maximum price retrieved successfully",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_validation() {
        assert!(validate_price(&Decimal::new(1999, 2)).is_ok());
        assert!(validate_price(&Decimal::ZERO).is_ok());
        assert!(validate_price(&Decimal::new(-1, 0)).is_err());
        assert!(validate_price(&Decimal::new(1999, 3)).is_err());
        assert!(validate_price(&Decimal::new(10_000_000_000, 0)).is_err());
        // Trailing zeros are not extra precision
        assert!(validate_price(&Decimal::new(19900, 3)).is_ok());
    }

    #[test]
    fn test_money_has_two_places() {
        assert_eq!(money(Decimal::new(125, 1)).to_string(), "12.50");
        assert_eq!(money(Decimal::new(3, 0)).to_string(), "3.00");
        assert_eq!(money(Decimal::new(19999, 3)).to_string(), "20.00");
    }
}
