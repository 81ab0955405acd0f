//! Object storage for uploaded images.
//!
//! Handlers only see the [`ObjectStorage`] trait object held in `AppState`.
//! Three backends exist: a local directory (served under the public URL by
//! the router), a bucket reached through `object_store` (S3 in production),
//! and an in-memory map used by the test suite.

use async_trait::async_trait;
use axum::body::Bytes;
use object_store::{
    Attribute, Attributes, ObjectStore, PutOptions, PutPayload, path::Path as ObjectPath,
};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store request failed: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("Storage is misconfigured: {0}")]
    Misconfigured(String),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync + fmt::Debug {
    /// Stores `bytes` under `key`, replacing any existing object.
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<(), StorageError>;

    /// Removes the object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Public URL clients use to fetch the object.
    fn url(&self, key: &str) -> String;
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// Keys are relative paths made of normal segments only.
fn check_key(key: &str) -> Result<&Path, StorageError> {
    let path = Path::new(key);
    let well_formed = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if well_formed {
        Ok(path)
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Files under a root directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, key: &str, _content_type: &str, bytes: Bytes) -> Result<(), StorageError> {
        let path = self.root.join(check_key(key)?);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.root.join(check_key(key)?);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!("{} was already gone", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.public_url, key)
    }
}

/// Objects in a bucket behind the `object_store` API.
///
/// Production uses an S3 client (see `config::build_storage`), which signs
/// every request with SigV4. Any other `ObjectStore` works the same way.
#[derive(Clone)]
pub struct BucketStorage {
    store: Arc<dyn ObjectStore>,
    public_url: String,
}

// The S3 client's own Debug output includes its credentials.
impl fmt::Debug for BucketStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketStorage")
            .field("store", &self.store.to_string())
            .field("public_url", &self.public_url)
            .finish_non_exhaustive()
    }
}

impl BucketStorage {
    pub fn new(store: Arc<dyn ObjectStore>, public_url: impl Into<String>) -> Self {
        Self {
            store,
            public_url: public_url.into(),
        }
    }

    fn location(key: &str) -> Result<ObjectPath, StorageError> {
        check_key(key)?;
        ObjectPath::parse(key).map_err(|_| StorageError::InvalidKey(key.to_string()))
    }
}

#[async_trait]
impl ObjectStorage for BucketStorage {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<(), StorageError> {
        let location = Self::location(key)?;
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        trace!("PUT {} in {}", location, self.store);
        self.store
            .put_opts(&location, PutPayload::from(bytes), options)
            .await?;
        debug!("Uploaded object {}", key);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let location = Self::location(key)?;
        match self.store.delete(&location).await {
            Ok(()) => {
                debug!("Deleted object {}", key);
                Ok(())
            }
            Err(object_store::Error::NotFound { .. }) => {
                trace!("Object {} was already gone", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.public_url, key)
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Process-local storage; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, StoredObject>>,
    public_url: String,
}

impl MemoryStorage {
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            objects: RwLock::default(),
            public_url: public_url.into(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<(), StorageError> {
        check_key(key)?;
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.public_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    #[tokio::test]
    async fn test_local_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/media/");

        storage
            .put("profile_pics/a.png", "image/png", Bytes::from_static(b"png"))
            .await
            .unwrap();
        let stored = std::fs::read(dir.path().join("profile_pics/a.png")).unwrap();
        assert_eq!(stored, b"png");
        assert_eq!(storage.url("profile_pics/a.png"), "/media/profile_pics/a.png");

        storage.delete("profile_pics/a.png").await.unwrap();
        assert!(!dir.path().join("profile_pics/a.png").exists());
        // Deleting twice is fine
        storage.delete("profile_pics/a.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/media");

        for key in ["../evil.png", "/etc/passwd", "", "a/../../b"] {
            let result = storage.put(key, "image/png", Bytes::new()).await;
            assert!(
                matches!(result, Err(StorageError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new("http://cdn.test/media");
        storage
            .put("product_images/x.jpg", "image/jpeg", Bytes::from_static(b"jpg"))
            .await
            .unwrap();

        let object = storage.get("product_images/x.jpg").await.unwrap();
        assert_eq!(object.content_type, "image/jpeg");
        assert_eq!(object.bytes, Bytes::from_static(b"jpg"));
        assert_eq!(
            storage.url("product_images/x.jpg"),
            "http://cdn.test/media/product_images/x.jpg"
        );

        storage.delete("product_images/x.jpg").await.unwrap();
        assert!(storage.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_bucket_storage_writes_through_object_store() {
        let store = Arc::new(InMemory::new());
        let storage = BucketStorage::new(store.clone(), "https://cdn.test/media/");

        storage
            .put("profile_pics/a.png", "image/png", Bytes::from_static(b"png"))
            .await
            .unwrap();

        let stored = store
            .get(&ObjectPath::from("profile_pics/a.png"))
            .await
            .unwrap();
        assert_eq!(
            stored.attributes.get(&Attribute::ContentType).map(|v| v.as_ref()),
            Some("image/png")
        );
        assert_eq!(stored.bytes().await.unwrap(), Bytes::from_static(b"png"));
        assert_eq!(
            storage.url("profile_pics/a.png"),
            "https://cdn.test/media/profile_pics/a.png"
        );

        storage.delete("profile_pics/a.png").await.unwrap();
        assert!(store.head(&ObjectPath::from("profile_pics/a.png")).await.is_err());
        storage.delete("profile_pics/a.png").await.unwrap();

        assert!(matches!(
            storage.put("../a.png", "image/png", Bytes::new()).await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
