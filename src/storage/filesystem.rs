//! Filesystem-backed content-addressed blob store.
//!
//! ## Layout
//!
//! ```text
//! <root>/<first two hex chars>/sha256-<hex>
//! ```
//!
//! Writes go to a temporary file in the same directory and are renamed into
//! place, so a reader never observes a partially written blob. Reads verify
//! the content against its reference.

use super::traits::*;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Content-addressed files under a root directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a reference, or `InvalidReference` for anything that is not a
    /// well-formed `sha256-` reference (blocks path traversal).
    fn blob_path(&self, reference: &ContentReference) -> StoreResult<PathBuf> {
        let hex_part = reference
            .sha256_hex()
            .ok_or_else(|| StoreError::InvalidReference(reference.to_string()))?;
        Ok(self.root.join(&hex_part[..2]).join(reference.as_str()))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, data: &[u8]) -> StoreResult<ContentReference> {
        let reference = ContentReference::sha256_of(data);
        let path = self.blob_path(&reference)?;

        if fs::try_exists(&path).await? {
            tracing::debug!(reference = %reference, "blob already stored");
            return Ok(reference);
        }

        let dir = path
            .parent()
            .ok_or_else(|| StoreError::InvalidReference(reference.to_string()))?;
        fs::create_dir_all(dir).await?;

        let tmp_path = dir.join(format!(".{}.{}.tmp", reference, uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        tracing::debug!(reference = %reference, bytes = data.len(), "blob stored");
        Ok(reference)
    }

    async fn get(&self, reference: &ContentReference) -> StoreResult<Vec<u8>> {
        let path = self.blob_path(reference)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(reference.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        if &ContentReference::sha256_of(&data) != reference {
            return Err(StoreError::Corrupted(reference.clone()));
        }
        Ok(data)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_and_get() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        let reference = store.put(b"ciphertext bytes").await.unwrap();
        assert_eq!(store.get(&reference).await.unwrap(), b"ciphertext bytes");
        assert_eq!(store.durability(), Durability::Persistent);
    }

    #[tokio::test]
    async fn test_layout_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        let reference = store.put(b"abc").await.unwrap();
        let hex_part = reference.sha256_hex().unwrap();
        let expected = dir.path().join(&hex_part[..2]).join(reference.as_str());
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        let a = store.put(b"same").await.unwrap();
        let b = store.put(b"same").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        let result = store.get(&ContentReference::sha256_of(b"never stored")).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        let result = store.get(&ContentReference::new("../../etc/passwd")).await;
        assert!(matches!(result, Err(StoreError::InvalidReference(_))));
    }

    #[tokio::test]
    async fn test_detects_corrupted_blob() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        let reference = store.put(b"original").await.unwrap();
        let path = store.blob_path(&reference).unwrap();
        std::fs::write(&path, b"tampered").unwrap();

        let result = store.get(&reference).await;
        assert!(matches!(result, Err(StoreError::Corrupted(_))));
    }

    #[tokio::test]
    async fn test_survives_new_store_instance() {
        let dir = TempDir::new().unwrap();
        let reference = FsBlobStore::new(dir.path()).put(b"persisted").await.unwrap();

        let reopened = FsBlobStore::new(dir.path());
        assert_eq!(reopened.get(&reference).await.unwrap(), b"persisted");
    }
}
