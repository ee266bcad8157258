//! Storage for paired devices and their service credentials

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::types::{ServiceAdvertisement, ServiceConfig};

#[cfg(test)]
mod tests;

/// Persisted configuration of one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredService {
    /// Protocol id of the endpoint
    pub service_id: String,
    /// Saved configuration (auth token, pinned certificate)
    pub config: ServiceConfig,
}

/// What the store remembers about a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDevice {
    /// Device identifier
    pub id: String,
    /// Last known friendly name
    pub friendly_name: String,
    /// Last known address
    pub last_known_ip: IpAddr,
    /// Unix seconds of the last advertisement
    pub last_seen: u64,
    /// Saved endpoints
    pub services: Vec<StoredService>,
}

impl StoredDevice {
    /// Saved endpoint with a service UUID
    #[must_use]
    pub fn service(&self, uuid: &str) -> Option<&StoredService> {
        self.services.iter().find(|s| s.config.service_uuid == uuid)
    }
}

/// Abstract storage interface for previously paired devices
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Device owning a service UUID
    async fn lookup_by_uuid(&self, uuid: &str) -> Option<StoredDevice>;

    /// Saved config for the service an advertisement describes
    async fn lookup_service_config(&self, ad: &ServiceAdvertisement) -> Option<ServiceConfig>;

    /// Save (insert or replace) a device
    ///
    /// # Errors
    ///
    /// Returns error if storage fails
    async fn persist(&self, device: &StoredDevice) -> Result<(), StorageError>;

    /// Forget a device
    ///
    /// # Errors
    ///
    /// Returns error if removal fails
    async fn remove(&self, device_id: &str) -> Result<(), StorageError>;
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage not available")]
    NotAvailable,
}

fn find_by_uuid<'a>(
    devices: impl Iterator<Item = &'a StoredDevice>,
    uuid: &str,
) -> Option<&'a StoredDevice> {
    devices.into_iter().find(|d| d.service(uuid).is_some())
}

/// In-memory device store (non-persistent)
#[derive(Debug, Default)]
pub struct MemoryStore {
    devices: RwLock<HashMap<String, StoredDevice>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn lookup_by_uuid(&self, uuid: &str) -> Option<StoredDevice> {
        let devices = self.devices.read().await;
        find_by_uuid(devices.values(), uuid).cloned()
    }

    async fn lookup_service_config(&self, ad: &ServiceAdvertisement) -> Option<ServiceConfig> {
        let devices = self.devices.read().await;
        find_by_uuid(devices.values(), &ad.uuid)
            .and_then(|d| d.service(&ad.uuid))
            .map(|s| s.config.clone())
    }

    async fn persist(&self, device: &StoredDevice) -> Result<(), StorageError> {
        self.devices
            .write()
            .await
            .insert(device.id.clone(), device.clone());
        Ok(())
    }

    async fn remove(&self, device_id: &str) -> Result<(), StorageError> {
        self.devices.write().await.remove(device_id);
        Ok(())
    }
}

/// JSON file device store
pub struct FileStore {
    path: PathBuf,
    cache: RwLock<HashMap<String, StoredDevice>>,
}

impl FileStore {
    /// Create file storage at the given path
    ///
    /// # Errors
    ///
    /// Returns error if directory cannot be created or file loaded
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let cache = Self::load_all(&path).await?;

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    async fn load_all(path: &Path) -> Result<HashMap<String, StoredDevice>, StorageError> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(HashMap::new());
        }

        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Ok(HashMap::new());
        }

        tokio::task::spawn_blocking(move || serde_json::from_slice(&bytes))
            .await
            .map_err(|e| StorageError::Serialization(format!("Deserialization task failed: {e}")))?
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn save_all(&self, cache: HashMap<String, StoredDevice>) -> Result<(), StorageError> {
        let bytes = tokio::task::spawn_blocking(move || serde_json::to_vec_pretty(&cache))
            .await
            .map_err(|e| StorageError::Serialization(format!("Serialization task failed: {e}")))?
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceStore for FileStore {
    async fn lookup_by_uuid(&self, uuid: &str) -> Option<StoredDevice> {
        let cache = self.cache.read().await;
        find_by_uuid(cache.values(), uuid).cloned()
    }

    async fn lookup_service_config(&self, ad: &ServiceAdvertisement) -> Option<ServiceConfig> {
        let cache = self.cache.read().await;
        find_by_uuid(cache.values(), &ad.uuid)
            .and_then(|d| d.service(&ad.uuid))
            .map(|s| s.config.clone())
    }

    async fn persist(&self, device: &StoredDevice) -> Result<(), StorageError> {
        let snapshot = {
            let mut cache = self.cache.write().await;
            cache.insert(device.id.clone(), device.clone());
            cache.clone()
        };
        self.save_all(snapshot).await
    }

    async fn remove(&self, device_id: &str) -> Result<(), StorageError> {
        let snapshot = {
            let mut cache = self.cache.write().await;
            cache.remove(device_id);
            cache.clone()
        };
        self.save_all(snapshot).await
    }
}
