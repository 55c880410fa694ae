//! Media store trait and the in-memory backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// A stored media object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaObject {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Opaque media persistence: bytes in, stable locator out.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist bytes under a key, returning a stable locator.
    async fn save(&self, key: &str, bytes: Vec<u8>, mime_type: &str) -> StoreResult<String>;

    /// Fetch a previously saved object by locator.
    async fn get(&self, locator: &str) -> StoreResult<MediaObject>;

    /// Whether a locator currently resolves.
    async fn exists(&self, locator: &str) -> StoreResult<bool>;
}

/// In-memory media store for tests and ephemeral deployments.
#[derive(Default, Clone)]
pub struct MemoryMediaStore {
    objects: Arc<RwLock<HashMap<String, MediaObject>>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn save(&self, key: &str, bytes: Vec<u8>, mime_type: &str) -> StoreResult<String> {
        let locator = format!("mem://{}", key);
        debug!("Storing {} bytes at {}", bytes.len(), locator);
        self.objects.write().await.insert(
            locator.clone(),
            MediaObject {
                bytes,
                mime_type: mime_type.to_string(),
            },
        );
        Ok(locator)
    }

    async fn get(&self, locator: &str) -> StoreResult<MediaObject> {
        self.objects
            .read()
            .await
            .get(locator)
            .cloned()
            .ok_or_else(|| StoreError::not_found(locator))
    }

    async fn exists(&self, locator: &str) -> StoreResult<bool> {
        Ok(self.objects.read().await.contains_key(locator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_get_roundtrip() {
        let store = MemoryMediaStore::new();
        let locator = store
            .save("shots/shot-1", b"png-bytes".to_vec(), "image/png")
            .await
            .unwrap();

        let object = store.get(&locator).await.unwrap();
        assert_eq!(object.bytes, b"png-bytes");
        assert_eq!(object.mime_type, "image/png");
        assert!(store.exists(&locator).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_locator_is_not_found() {
        let store = MemoryMediaStore::new();
        let err = store.get("mem://missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.exists("mem://missing").await.unwrap());
    }
}
