//! Storage abstraction trait
//!
//! Every configured disk is one [`Storage`] implementation. Keys are relative to
//! the disk root; see the crate documentation for the format.

use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use medialib_core::{DiskDriver, MediaLibraryError};
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("There is no filesystem disk named `{0}`")]
    DiskNotConfigured(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

impl From<StorageError> for MediaLibraryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DiskNotConfigured(name) => MediaLibraryError::DiskDoesNotExist(name),
            other => MediaLibraryError::Storage(other.to_string()),
        }
    }
}

/// One disk.
///
/// Writes create intermediate directories as needed and overwrite existing keys.
/// Deleting a missing key is not an error.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` to `storage_key` and return its public URL.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Write everything `reader` yields to `storage_key` and return the byte count.
    async fn upload_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64>;

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Delete every key under `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> StorageResult<()>;

    /// Keys directly or transitively under `prefix`, sorted.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Get the size in bytes of an object, if it exists.
    async fn content_length(&self, storage_key: &str) -> StorageResult<u64>;

    /// Stored content type, falling back to a guess from the key's extension.
    async fn content_type(&self, storage_key: &str) -> StorageResult<String> {
        Ok(mime_guess::from_path(storage_key)
            .first_or_octet_stream()
            .essence_str()
            .to_string())
    }

    /// Copy a file from one key to another and return the new URL.
    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<String>;

    async fn rename(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        self.copy(from_key, to_key).await?;
        self.delete(from_key).await
    }

    /// Public URL of `storage_key`.
    fn url(&self, storage_key: &str) -> String;

    /// Absolute path on the local filesystem, for disks that have one.
    fn local_path(&self, _storage_key: &str) -> Option<PathBuf> {
        None
    }

    fn driver(&self) -> DiskDriver;
}

/// Reject keys that could escape a disk root.
pub(crate) fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.split('/').any(|segment| segment == "..") || storage_key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn join_url(base_url: &str, storage_key: &str) -> String {
    if base_url.is_empty() {
        return format!("/{}", storage_key);
    }
    format!("{}/{}", base_url.trim_end_matches('/'), storage_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_and_absolute_keys() {
        assert!(validate_key("a/b.jpg").is_ok());
        assert!(validate_key("a/..b.jpg").is_ok());
        assert!(matches!(validate_key("../etc/passwd"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(validate_key("/etc/passwd"), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn joins_urls() {
        assert_eq!(join_url("https://cdn.test/", "a/b.jpg"), "https://cdn.test/a/b.jpg");
        assert_eq!(join_url("", "a/b.jpg"), "/a/b.jpg");
    }

    #[test]
    fn missing_disk_maps_to_disk_error() {
        let err: MediaLibraryError = StorageError::DiskNotConfigured("s3".to_string()).into();
        assert!(matches!(err, MediaLibraryError::DiskDoesNotExist(name) if name == "s3"));

        let err: MediaLibraryError = StorageError::NotFound("x".to_string()).into();
        assert!(matches!(err, MediaLibraryError::Storage(_)));
    }
}
