use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use medialib_core::DiskDriver;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::RwLock;

use crate::traits::{join_url, validate_key, ByteStream, Storage, StorageError, StorageResult};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// In-process disk, mostly for tests and ephemeral scratch space.
///
/// Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    base_url: String,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            objects: Arc::default(),
            base_url: base_url.into(),
        }
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    async fn insert(&self, storage_key: &str, data: Bytes, content_type: &str) {
        self.objects.write().await.insert(
            storage_key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
    }

    async fn object(&self, storage_key: &str) -> StorageResult<StoredObject> {
        validate_key(storage_key)?;
        self.objects
            .read()
            .await
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }
}

fn prefix_matches(key: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    prefix.is_empty() || key == prefix || key.starts_with(&format!("{}/", prefix))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        let size = data.len();
        self.insert(storage_key, Bytes::from(data), content_type).await;
        tracing::debug!(key = %storage_key, size_bytes = size, "Memory storage upload successful");
        Ok(self.url(storage_key))
    }

    async fn upload_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        validate_key(storage_key)?;
        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to read stream: {}", e)))?;
        let size = buffer.len() as u64;
        self.insert(storage_key, Bytes::from(buffer), content_type).await;
        Ok(size)
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        Ok(self.object(storage_key).await?.data.to_vec())
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        let object = self.object(storage_key).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(object.data) })))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        self.objects.write().await.remove(storage_key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> StorageResult<()> {
        validate_key(prefix)?;
        if prefix.trim_end_matches('/').is_empty() {
            return Err(StorageError::InvalidKey(
                "Refusing to delete the disk root".to_string(),
            ));
        }
        self.objects
            .write()
            .await
            .retain(|key, _| !prefix_matches(key, prefix));
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        validate_key(prefix)?;
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|key| prefix_matches(key, prefix))
            .cloned()
            .collect())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        validate_key(storage_key)?;
        Ok(self.objects.read().await.contains_key(storage_key))
    }

    async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        Ok(self.object(storage_key).await?.data.len() as u64)
    }

    async fn content_type(&self, storage_key: &str) -> StorageResult<String> {
        Ok(self.object(storage_key).await?.content_type)
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<String> {
        validate_key(to_key)?;
        let object = self.object(from_key).await?;
        self.objects
            .write()
            .await
            .insert(to_key.to_string(), object);
        Ok(self.url(to_key))
    }

    fn url(&self, storage_key: &str) -> String {
        join_url(&self.base_url, storage_key)
    }

    fn driver(&self) -> DiskDriver {
        DiskDriver::Memory
    }
}
