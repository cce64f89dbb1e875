use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "storage-local")]
use crate::LocalStorage;
use crate::{MemoryStorage, Storage, StorageError, StorageResult};
use medialib_core::{DiskConfig, DiskDriver, MediaLibraryConfig};

/// Create a storage backend for one configured disk
pub async fn create_storage(name: &str, disk: &DiskConfig) -> StorageResult<Arc<dyn Storage>> {
    match disk.driver {
        #[cfg(feature = "storage-local")]
        DiskDriver::Local => {
            let root = disk.root.clone().ok_or_else(|| {
                StorageError::ConfigError(format!(
                    "MEDIA_DISK_{}_ROOT not configured",
                    name.to_uppercase()
                ))
            })?;
            let base_url = disk.url.clone().unwrap_or_default();

            let storage = LocalStorage::new(root, base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        DiskDriver::Local => Err(StorageError::ConfigError(format!(
            "Local storage backend not available for disk `{}` (storage-local feature not enabled)",
            name
        ))),

        DiskDriver::Memory => Ok(Arc::new(match &disk.url {
            Some(url) => MemoryStorage::with_base_url(url.clone()),
            None => MemoryStorage::new(),
        })),
    }
}

/// Every configured disk, resolved by name.
#[derive(Clone, Default)]
pub struct DiskManager {
    disks: HashMap<String, Arc<dyn Storage>>,
}

impl DiskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_config(config: &MediaLibraryConfig) -> StorageResult<Self> {
        let mut manager = Self::new();
        for (name, disk) in &config.disks {
            let storage = create_storage(name, disk).await?;
            tracing::debug!(disk = %name, driver = %disk.driver, "Disk initialised");
            manager.disks.insert(name.clone(), storage);
        }
        Ok(manager)
    }

    /// Register or replace a disk.
    pub fn with_disk(mut self, name: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        self.insert(name, storage);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, storage: Arc<dyn Storage>) {
        self.disks.insert(name.into(), storage);
    }

    pub fn disk(&self, name: &str) -> StorageResult<Arc<dyn Storage>> {
        self.disks
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::DiskNotConfigured(name.to_string()))
    }

    pub fn has_disk(&self, name: &str) -> bool {
        self.disks.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.disks.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for DiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskManager")
            .field("disks", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn builds_every_configured_disk() {
        let dir = tempdir().unwrap();
        let config = MediaLibraryConfig::default()
            .with_disk("local", DiskConfig::local(dir.path()).with_url("/media"));

        let manager = DiskManager::from_config(&config).await.unwrap();
        assert_eq!(manager.names(), vec!["local".to_string(), "public".to_string()]);
        assert_eq!(manager.disk("local").unwrap().driver(), DiskDriver::Local);
        assert_eq!(manager.disk("public").unwrap().driver(), DiskDriver::Memory);
        assert_eq!(manager.disk("local").unwrap().url("a/b.jpg"), "/media/a/b.jpg");
    }

    #[tokio::test]
    async fn unknown_disk_is_reported_by_name() {
        let manager = DiskManager::new();
        assert!(matches!(
            manager.disk("s3"),
            Err(StorageError::DiskNotConfigured(name)) if name == "s3"
        ));
    }

    #[tokio::test]
    async fn local_disk_requires_root() {
        let disk = DiskConfig {
            driver: DiskDriver::Local,
            root: None,
            url: None,
        };
        assert!(create_storage("broken", &disk).await.is_err());
    }
}
