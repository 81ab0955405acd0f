use common::FilterError;
use thiserror::Error;

/// Error types for the catalog module
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Product with id {0} does not exist")]
    ProductNotFound(i32),

    #[error("A user with username '{0}' already exists")]
    UsernameTaken(String),

    #[error("A user with email '{0}' already exists")]
    EmailTaken(String),

    /// The acting user does not own the product
    #[error("User {user_id} does not own product {product_id}")]
    NotOwner { product_id: i32, user_id: i32 },

    #[error("Invalid product filter: {0}")]
    InvalidFilter(#[from] FilterError),

    /// Hashing failed; verification failures are reported as `false` instead
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

/// Type alias for Result with CatalogError
pub type Result<T> = std::result::Result<T, CatalogError>;
