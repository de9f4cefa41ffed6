//! Storage driver contract and registry
//!
//! Each storage backend registers one [`StorageDriver`] when the process
//! starts. The built [`StorageDriverRegistry`] is immutable and shared by
//! reference, so lookups need no locking.

use crate::models::{Disk, Snapshot, Storage, StorageConf};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use stratus_cloud::{CloudError, Result, Task, TaskManager};

/// Storage creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageCreateInput {
    pub name: String,
    pub storage_type: String,

    #[serde(default)]
    pub rbd_mon_host: Option<String>,
    #[serde(default)]
    pub rbd_pool: Option<String>,
    #[serde(default)]
    pub rbd_key: Option<String>,
    #[serde(default)]
    pub rbd_rados_mon_op_timeout: Option<i64>,
    #[serde(default)]
    pub rbd_rados_osd_op_timeout: Option<i64>,
    #[serde(default)]
    pub rbd_client_mount_timeout: Option<i64>,

    /// Normalised by `validate_create_data`
    #[serde(default)]
    pub storage_conf: StorageConf,
}

/// Partial storage update; `None` leaves the stored value alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageUpdateInput {
    #[serde(default)]
    pub rbd_key: Option<String>,
    #[serde(default)]
    pub rbd_rados_mon_op_timeout: Option<i64>,
    #[serde(default)]
    pub rbd_rados_osd_op_timeout: Option<i64>,
    #[serde(default)]
    pub rbd_client_mount_timeout: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotCreateInput {
    pub name: String,
    pub disk_id: String,
}

/// Backend-specific storage behaviour
///
/// Only the type and create validation are mandatory; the remaining hooks
/// default to accepting and doing nothing.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    fn storage_type(&self) -> &str;

    /// Validate `input` and fill `input.storage_conf`; returns the conf
    async fn validate_create_data(&self, input: &mut StorageCreateInput) -> Result<StorageConf>;

    /// Merge `patch` into the stored conf; returns whether it was persisted
    async fn validate_update_data(&self, _storage: &Storage, _patch: &StorageUpdateInput) -> Result<bool> {
        Ok(false)
    }

    /// Best-effort linkage after the storage row exists; never fails
    async fn post_create(&self, _storage: &Storage, _input: &StorageCreateInput) {}

    async fn do_storage_update_task(&self, storage: &Storage, _task: &Task, _tasks: &TaskManager) -> Result<()> {
        Err(CloudError::UnsupportedOperation(format!(
            "storage update on {} storage {}",
            self.storage_type(),
            storage.id
        )))
    }

    async fn validate_create_snapshot_data(&self, _disk: &Disk, _input: &SnapshotCreateInput) -> Result<()> {
        Ok(())
    }

    async fn validate_snapshot_delete(&self, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }

    async fn request_create_snapshot(&self, snapshot: &Snapshot, _task: &Task) -> Result<()> {
        Err(CloudError::UnsupportedOperation(format!(
            "create snapshot {} on {} storage",
            snapshot.id,
            self.storage_type()
        )))
    }

    async fn request_delete_snapshot(&self, snapshot: &Snapshot, _task: &Task) -> Result<()> {
        Err(CloudError::UnsupportedOperation(format!(
            "delete snapshot {} on {} storage",
            snapshot.id,
            self.storage_type()
        )))
    }

    /// Whether snapshots live outside the disk's backing chain
    fn snapshot_is_out_of_chain(&self, _disk: &Disk) -> bool {
        false
    }

    async fn on_disk_reset(&self, _disk: &Disk, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }
}

/// Collects drivers before the registry is frozen
#[derive(Default)]
pub struct StorageDriverRegistryBuilder {
    drivers: HashMap<String, Arc<dyn StorageDriver>>,
}

impl StorageDriverRegistryBuilder {
    /// Fails with `DuplicateResource` when the type is already taken
    pub fn register(mut self, driver: Arc<dyn StorageDriver>) -> Result<Self> {
        let storage_type = driver.storage_type().to_string();
        if self.drivers.contains_key(&storage_type) {
            return Err(CloudError::DuplicateResource(format!(
                "storage driver {storage_type}"
            )));
        }

        tracing::debug!("Registered storage driver {}", storage_type);
        self.drivers.insert(storage_type, driver);
        Ok(self)
    }

    pub fn build(self) -> StorageDriverRegistry {
        StorageDriverRegistry {
            drivers: self.drivers,
        }
    }
}

/// Storage drivers by storage type
pub struct StorageDriverRegistry {
    drivers: HashMap<String, Arc<dyn StorageDriver>>,
}

impl StorageDriverRegistry {
    pub fn builder() -> StorageDriverRegistryBuilder {
        StorageDriverRegistryBuilder::default()
    }

    pub fn get(&self, storage_type: &str) -> Result<Arc<dyn StorageDriver>> {
        self.drivers
            .get(storage_type)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("storage driver {storage_type}")))
    }

    pub fn storage_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
