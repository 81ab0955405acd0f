use axum::body::Bytes;
use axum::extract::multipart::Field;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::storage::ObjectStorage;

pub const PROFILE_IMAGE_PREFIX: &str = "profile_pics";
pub const PRODUCT_IMAGE_PREFIX: &str = "product_images";

const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// An image read from a multipart field and checked, but not yet stored.
#[derive(Debug)]
pub struct UploadedImage {
    pub extension: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedImage {
    /// Fresh storage key under `prefix`; uploads never overwrite each other.
    pub fn key(&self, prefix: &str) -> String {
        format!("{}/{}.{}", prefix, Uuid::new_v4(), self.extension)
    }
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Reads an image field. An empty part without a filename counts as absent.
pub async fn read_image(field: Field<'_>, max_bytes: usize) -> Result<Option<UploadedImage>, ApiError> {
    let name = field.name().unwrap_or("image").to_string();
    let file_name = field.file_name().map(str::to_string);
    let declared_type = field.content_type().map(str::to_ascii_lowercase);
    let bytes = field.bytes().await?;

    if bytes.is_empty() {
        if file_name.as_deref().is_none_or(str::is_empty) {
            debug!("Ignoring empty '{}' part", name);
            return Ok(None);
        }
        return Err(ApiError::field(&name, "The submitted file is empty."));
    }

    if bytes.len() > max_bytes {
        warn!(
            "Rejecting {} byte upload in '{}' (limit {})",
            bytes.len(),
            name,
            max_bytes
        );
        return Err(ApiError::field(
            &name,
            format!("Images may be at most {max_bytes} bytes."),
        ));
    }

    let from_name = file_name
        .as_deref()
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));
    let from_type = declared_type
        .as_deref()
        .and_then(extension_for_content_type)
        .map(str::to_string);

    if let Some(content_type) = &declared_type {
        if !content_type.starts_with("image/") && content_type != "application/octet-stream" {
            return Err(ApiError::field(
                &name,
                "Upload a valid image. The file you uploaded was not an image.",
            ));
        }
    }

    let Some(extension) = from_name.or(from_type) else {
        return Err(ApiError::field(
            &name,
            format!("Supported image formats: {}.", ALLOWED_EXTENSIONS.join(", ")),
        ));
    };

    let content_type = declared_type
        .filter(|t| t.starts_with("image/"))
        .unwrap_or_else(|| match extension.as_str() {
            "jpg" => "image/jpeg".to_string(),
            other => format!("image/{other}"),
        });

    debug!(
        "Accepted {} byte {} upload in '{}'",
        bytes.len(),
        content_type,
        name
    );
    Ok(Some(UploadedImage {
        extension,
        content_type,
        bytes,
    }))
}

/// Removes objects that are no longer referenced. Failures are only logged.
pub async fn discard_objects(storage: &dyn ObjectStorage, keys: &[String]) {
    for key in keys {
        if let Err(e) = storage.delete(key).await {
            warn!("Failed to delete stored object {}: {}", key, e);
        }
    }
}
