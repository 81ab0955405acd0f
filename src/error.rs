use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use catalog::CatalogError;
use common::FilterError;
use sea_orm::DbErr;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

use crate::schemas::ErrorResponse;
use crate::storage::StorageError;

pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Every way a request can fail, rendered as an [`ErrorResponse`].
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid input")]
    Validation { fields: FieldErrors },

    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    #[error("Authentication credentials were not provided or are invalid")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// A validation failure on a single field.
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(name.to_string(), vec![message.into()]);
        ApiError::Validation { fields }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::BadRequest { code, .. } => *code,
            ApiError::Unauthorized => "NOT_AUTHENTICATED",
            ApiError::Forbidden(_) => "PERMISSION_DENIED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected ({}): {}", status, self);
        }

        // Internal details stay in the logs
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let code = self.code().to_string();
        let fields = match self {
            ApiError::Validation { fields } => Some(fields),
            _ => None,
        };

        let body = ErrorResponse {
            error: message,
            code,
            success: false,
            fields,
        };
        (status, Json(body)).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Database(e) => ApiError::Database(e),
            CatalogError::ProductNotFound(_) => ApiError::NotFound(err.to_string()),
            CatalogError::UsernameTaken(_) => {
                ApiError::field("username", "A user with that username already exists.")
            }
            CatalogError::EmailTaken(_) => {
                ApiError::field("email", "A user with that email already exists.")
            }
            CatalogError::NotOwner { .. } => {
                ApiError::Forbidden("You do not have permission to modify this product.".to_string())
            }
            CatalogError::InvalidFilter(e) => e.into(),
            CatalogError::PasswordHash(e) => ApiError::Internal(e),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::field(err.field(), err.to_string())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, field_errors)| {
                let messages = field_errors
                    .iter()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => format!("Invalid value ({})", e.code),
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        ApiError::Validation { fields }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest {
            code: "INVALID_MULTIPART",
            message: err.body_text(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let code = match &rejection {
            JsonRejection::MissingJsonContentType(_) => "UNSUPPORTED_MEDIA_TYPE",
            _ => "INVALID_JSON",
        };
        ApiError::BadRequest {
            code,
            message: rejection.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest {
            code: "INVALID_MULTIPART",
            message: rejection.body_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 3, message = "Too short"))]
        name: String,
    }

    #[test]
    fn test_validation_errors_become_field_map() {
        let errors = Sample {
            name: "ab".to_string(),
        }
        .validate()
        .unwrap_err();

        match ApiError::from(errors) {
            ApiError::Validation { fields } => {
                assert_eq!(fields.get("name"), Some(&vec!["Too short".to_string()]));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_catalog_error_mapping() {
        let not_owner = ApiError::from(CatalogError::NotOwner {
            product_id: 1,
            user_id: 2,
        });
        assert_eq!(not_owner.status(), StatusCode::FORBIDDEN);

        let missing = ApiError::from(CatalogError::ProductNotFound(7));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let taken = ApiError::from(CatalogError::UsernameTaken("ada".to_string()));
        assert_eq!(taken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(taken.code(), "VALIDATION_ERROR");

        let sort = ApiError::from(CatalogError::InvalidFilter(FilterError::UnknownSort(
            "cheap".to_string(),
        )));
        match sort {
            ApiError::Validation { fields } => assert!(fields.contains_key("sortBy")),
            other => panic!("unexpected error: {other:?}"),
        }

        let db = ApiError::from(CatalogError::Database(DbErr::Custom("boom".to_string())));
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
