//! Body extractors whose rejections render as [`ApiError`] instead of
//! axum's plain-text defaults.

use async_trait::async_trait;
use axum::extract::{FromRequest, Multipart, Request};
use axum::response::Json;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// A JSON request body. Malformed or mistyped bodies are a 400.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// A `multipart/form-data` body.
pub struct MultipartBody(pub Multipart);

#[async_trait]
impl<S> FromRequest<S> for MultipartBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Multipart::from_request(req, state).await?))
    }
}
