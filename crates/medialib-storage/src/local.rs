use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use futures::StreamExt;
use medialib_core::DiskDriver;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::traits::{join_url, validate_key, ByteStream, Storage, StorageError, StorageResult};

/// Local filesystem disk
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory of the disk (e.g., "/var/lib/app/media")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:3000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;
        Ok(self.base_path.join(storage_key))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn path_to_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let segments: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(segments.join("/"))
    }

    async fn collect_files(&self, dir: PathBuf, keys: &mut Vec<String>) -> StorageResult<()> {
        let mut pending = vec![dir];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.path_to_key(&path) {
                    keys.push(key);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(self.url(storage_key))
    }

    async fn upload_stream(
        &self,
        storage_key: &str,
        _content_type: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write stream to file {}: {}",
                path.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream upload successful"
        );

        Ok(bytes_copied)
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let stream = tokio_util::io::ReaderStream::new(file).map(|result| {
            result.map_err(|e| StorageError::DownloadFailed(format!("Failed to read chunk: {}", e)))
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::debug!(key = %storage_key, "Local storage delete successful");
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> StorageResult<()> {
        let path = self.key_to_path(prefix.trim_end_matches('/'))?;
        if path == self.base_path {
            return Err(StorageError::InvalidKey(
                "Refusing to delete the disk root".to_string(),
            ));
        }

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path).await.map_err(|e| {
                StorageError::DeleteFailed(format!(
                    "Failed to delete directory {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Ok(_) => fs::remove_file(&path).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(prefix = %prefix, "Local storage prefix deleted");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let path = self.key_to_path(prefix.trim_end_matches('/'))?;
        let mut keys = Vec::new();
        self.collect_files(path, &mut keys).await?;
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        let path = self.key_to_path(storage_key)?;
        let meta = fs::metadata(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(storage_key.to_string()),
            _ => StorageError::BackendError(e.to_string()),
        })?;
        Ok(meta.len())
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<String> {
        let from_path = self.key_to_path(from_key)?;
        let to_path = self.key_to_path(to_key)?;

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(from_key.to_string()));
        }

        self.ensure_parent_dir(&to_path).await?;

        fs::copy(&from_path, &to_path).await.map_err(|e| {
            StorageError::BackendError(format!(
                "Failed to copy {} to {}: {}",
                from_path.display(),
                to_path.display(),
                e
            ))
        })?;

        tracing::debug!(from_key = %from_key, to_key = %to_key, "Local storage copy successful");

        Ok(self.url(to_key))
    }

    async fn rename(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        let from_path = self.key_to_path(from_key)?;
        let to_path = self.key_to_path(to_key)?;

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(from_key.to_string()));
        }

        self.ensure_parent_dir(&to_path).await?;
        fs::rename(&from_path, &to_path).await?;
        Ok(())
    }

    fn url(&self, storage_key: &str) -> String {
        join_url(&self.base_url, storage_key)
    }

    fn local_path(&self, storage_key: &str) -> Option<PathBuf> {
        self.key_to_path(storage_key).ok()
    }

    fn driver(&self) -> DiskDriver {
        DiskDriver::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::tempdir;

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "http://localhost:3000/media".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_storage_upload_download() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let data = b"test data".to_vec();
        let url = storage
            .upload_with_key("1/test.txt", data.clone(), "text/plain")
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:3000/media/1/test.txt");
        assert_eq!(storage.download("1/test.txt").await.unwrap(), data);
        assert_eq!(storage.content_length("1/test.txt").await.unwrap(), 9);
        assert_eq!(storage.content_type("1/test.txt").await.unwrap(), "text/plain");
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.download("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_local_storage_delete_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        assert!(storage.delete("nonexistent/file.txt").await.is_ok());
        assert!(storage.delete_prefix("nonexistent/").await.is_ok());
    }

    #[tokio::test]
    async fn test_local_storage_list_and_delete_prefix() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        for key in ["7/a.jpg", "7/conversions/a-thumb.jpg", "8/b.jpg"] {
            storage
                .upload_with_key(key, b"x".to_vec(), "image/jpeg")
                .await
                .unwrap();
        }

        assert_eq!(
            storage.list("7/").await.unwrap(),
            vec!["7/a.jpg".to_string(), "7/conversions/a-thumb.jpg".to_string()]
        );

        storage.delete_prefix("7/").await.unwrap();
        assert!(storage.list("7").await.unwrap().is_empty());
        assert!(storage.exists("8/b.jpg").await.unwrap());
        assert!(storage.delete_prefix("").await.is_err());
    }

    #[tokio::test]
    async fn test_local_storage_copy_and_rename() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let data = b"original content".to_vec();
        storage
            .upload_with_key("1/original.txt", data.clone(), "text/plain")
            .await
            .unwrap();

        let url = storage.copy("1/original.txt", "2/copied.txt").await.unwrap();
        assert!(url.ends_with("2/copied.txt"));
        assert_eq!(storage.download("2/copied.txt").await.unwrap(), data);

        storage.rename("2/copied.txt", "2/renamed.txt").await.unwrap();
        assert!(!storage.exists("2/copied.txt").await.unwrap());
        assert!(storage.exists("2/renamed.txt").await.unwrap());
        assert_eq!(
            storage.local_path("2/renamed.txt"),
            Some(dir.path().join("2/renamed.txt"))
        );
    }

    #[tokio::test]
    async fn test_local_storage_stream_round_trip() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let data = b"stream test data".to_vec();
        let reader = Box::pin(std::io::Cursor::new(data.clone()))
            as Pin<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;

        let written = storage
            .upload_stream("s/stream.txt", "text/plain", reader)
            .await
            .unwrap();
        assert_eq!(written, data.len() as u64);

        let mut stream = storage.download_stream("s/stream.txt").await.unwrap();
        let mut downloaded = Vec::new();
        while let Some(chunk) = stream.next().await {
            downloaded.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(data, downloaded);
    }
}
