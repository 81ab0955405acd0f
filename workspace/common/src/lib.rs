//! Common transport-layer types shared between the HTTP handlers and the
//! catalog crate. Keeping the product filter here lets the catalog interpret
//! exactly the payload clients send to `POST /products/filter`.

mod filter;

pub use filter::{FilterError, PriceBounds, ProductFilter, SortBy};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Generic API response wrapper used by every successful endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success flag
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Outcome of flipping a user's vote on a product.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ToggleResult {
    /// Popularity after the toggle
    pub popularity: i32,
    /// Whether the caller is now in the voter set
    pub voted: bool,
}
