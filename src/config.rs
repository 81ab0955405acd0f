use anyhow::{Context, Result};
use config::{Config, Environment, File};
use object_store::aws::AmazonS3Builder;
use sea_orm::Database;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::schemas::AppState;
use crate::storage::{BucketStorage, LocalStorage, MemoryStorage, ObjectStorage, StorageError};

/// Settings that do not fit on the command line.
///
/// Read from an optional `marketplace.toml` (or any format the `config` crate
/// understands) and `MARKETPLACE__*` environment variables, e.g.
/// `MARKETPLACE__STORAGE__BACKEND=s3`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub upload: UploadSettings,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Directory used by the local backend
    pub root: PathBuf,
    /// Base of the URLs rendered for stored images
    pub public_url: Option<String>,
    pub s3: S3Settings,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root: PathBuf::from("media"),
            public_url: None,
            s3: S3Settings::default(),
        }
    }
}

pub const DEFAULT_PUBLIC_URL: &str = "/media";

impl StorageSettings {
    pub fn local_public_url(&self) -> &str {
        self.public_url.as_deref().unwrap_or(DEFAULT_PUBLIC_URL)
    }
}

/// Bucket used by the `s3` backend.
///
/// Unset credentials, region and endpoint fall back to the standard `AWS_*`
/// environment variables.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services such as MinIO
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl S3Settings {
    /// Where uploaded objects can be fetched when no public URL is configured.
    fn default_public_url(&self, bucket: &str) -> String {
        match (&self.endpoint, &self.region) {
            (Some(endpoint), _) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            (None, Some(region)) => format!("https://{bucket}.s3.{region}.amazonaws.com"),
            (None, None) => format!("https://{bucket}.s3.amazonaws.com"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Largest accepted image, in bytes
    pub max_image_bytes: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_image_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Load settings from `marketplace.*` and the environment
pub fn load_settings() -> Result<Settings> {
    let settings = Config::builder()
        .add_source(File::with_name("marketplace").required(false))
        .add_source(
            Environment::with_prefix("MARKETPLACE")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read configuration")?
        .try_deserialize::<Settings>()
        .context("Invalid configuration")?;
    debug!("Loaded settings: {:?}", settings.storage.backend);
    Ok(settings)
}

fn s3_storage(settings: &StorageSettings) -> Result<BucketStorage, StorageError> {
    let s3 = &settings.s3;
    let bucket = s3
        .bucket
        .clone()
        .ok_or_else(|| StorageError::Misconfigured("storage.s3.bucket is required".to_string()))?;

    let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket.as_str());
    if let Some(region) = &s3.region {
        builder = builder.with_region(region);
    }
    if let Some(endpoint) = &s3.endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }
    if let Some(access_key_id) = &s3.access_key_id {
        builder = builder.with_access_key_id(access_key_id);
    }
    if let Some(secret_access_key) = &s3.secret_access_key {
        builder = builder.with_secret_access_key(secret_access_key);
    }
    let client = builder
        .build()
        .map_err(|e| StorageError::Misconfigured(e.to_string()))?;

    let public_url = settings
        .public_url
        .clone()
        .unwrap_or_else(|| s3.default_public_url(&bucket));
    info!("Storing uploads in S3 bucket '{}'", bucket);
    Ok(BucketStorage::new(Arc::new(client), public_url))
}

/// Build the storage backend selected in the settings
pub fn build_storage(settings: &StorageSettings) -> Result<Arc<dyn ObjectStorage>, StorageError> {
    let storage: Arc<dyn ObjectStorage> = match settings.backend {
        StorageBackend::Local => {
            info!("Storing uploads under {}", settings.root.display());
            Arc::new(LocalStorage::new(
                settings.root.clone(),
                settings.local_public_url(),
            ))
        }
        StorageBackend::S3 => Arc::new(s3_storage(settings)?),
        StorageBackend::Memory => {
            info!("Storing uploads in memory; they are lost on restart");
            Arc::new(MemoryStorage::new(settings.local_public_url()))
        }
    };
    Ok(storage)
}

/// Initialize application configuration and state with a specific database URL
pub async fn initialize_app_state_with_url(database_url: &str) -> Result<AppState> {
    dotenvy::dotenv().ok();
    let settings = load_settings()?;

    tracing::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    let storage = build_storage(&settings.storage)?;

    Ok(AppState {
        db,
        storage,
        settings: Arc::new(settings),
    })
}
