//! Local-filesystem media store.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::store::{MediaObject, MediaStore};

/// Configuration for the local media store.
#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    /// Root directory all media lives under
    pub root: PathBuf,
}

impl LocalStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let root = std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string());
        Ok(Self { root: root.into() })
    }
}

/// Media store backed by a directory tree. The locator is the path relative
/// to the root; MIME type round-trips via the file extension.
pub struct LocalMediaStore {
    root: PathBuf,
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

fn mime_for_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
    .to_string()
}

impl LocalMediaStore {
    pub fn new(config: LocalStoreConfig) -> Self {
        Self { root: config.root }
    }

    pub fn from_env() -> StoreResult<Self> {
        Ok(Self::new(LocalStoreConfig::from_env()?))
    }

    /// Resolve a locator to an absolute path, rejecting traversal outside
    /// the root.
    fn resolve(&self, locator: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(locator);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(StoreError::invalid_locator(locator));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save(&self, key: &str, bytes: Vec<u8>, mime_type: &str) -> StoreResult<String> {
        let locator = format!("{}.{}", key, extension_for_mime(mime_type));
        let path = self.resolve(&locator)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!("Writing {} bytes to {}", bytes.len(), path.display());
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| StoreError::save_failed(format!("{}: {}", path.display(), e)))?;

        info!("Saved media object {}", locator);
        Ok(locator)
    }

    async fn get(&self, locator: &str) -> StoreResult<MediaObject> {
        let path = self.resolve(locator)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::not_found(locator));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(MediaObject {
            bytes,
            mime_type: mime_for_extension(&path),
        })
    }

    async fn exists(&self, locator: &str) -> StoreResult<bool> {
        let path = self.resolve(locator)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> LocalMediaStore {
        LocalMediaStore::new(LocalStoreConfig {
            root: dir.path().to_path_buf(),
        })
    }

    #[tokio::test]
    async fn test_save_then_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let locator = store
            .save("shots/seq-1/shot-2", b"jpeg-bytes".to_vec(), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(locator, "shots/seq-1/shot-2.jpg");

        let object = store.get(&locator).await.unwrap();
        assert_eq!(object.bytes, b"jpeg-bytes");
        assert_eq!(object.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let err = store.get("shots/nope.png").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_traversal_locators_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.get("/etc/passwd").await.is_err());
    }
}
