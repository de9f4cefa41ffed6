//! Compute-side storage and host wiring for Stratus
//!
//! - [`StorageDriverRegistry`] maps a storage type to its [`StorageDriver`]
//! - [`RbdStorageDriver`] validates Ceph RBD storages, links image caches and
//!   forwards snapshot operations to the host agent
//! - [`RbdStorageUpdateTask`] pushes a changed RBD conf to the master host
//! - [`HostwireManager`] guards host-to-wire attachments against removal
//!   while guest NICs still use them
//!
//! # Example
//!
//! ```ignore
//! use stratus_compute::{ComputeStores, HostAgentClient, default_registry};
//!
//! let stores = ComputeStores::in_memory();
//! let registry = default_registry(&stores, HostAgentClient::new())?;
//! let driver = registry.get("rbd")?;
//! let conf = driver.validate_create_data(&mut input).await?;
//! ```

pub mod error;
pub mod host_agent;
pub mod hostwire;
pub mod models;
pub mod rbd;
pub mod storage_driver;
pub mod update_task;

pub use error::{ComputeError, Result};
pub use host_agent::HostAgentClient;
pub use hostwire::{GuestNicUsage, HostwireManager};
pub use models::{
    ComputeStores, Disk, Guest, GuestNetwork, Host, Hostwire, Network, Snapshot, Storage, StorageCache, StorageConf,
};
pub use rbd::{RBD_STORAGE_UPDATE_TASK, RbdStorageDriver, STORAGE_RBD};
pub use storage_driver::{
    SnapshotCreateInput, StorageCreateInput, StorageDriver, StorageDriverRegistry, StorageDriverRegistryBuilder,
    StorageUpdateInput,
};
pub use update_task::RbdStorageUpdateTask;

use std::sync::Arc;
use stratus_cloud::TaskManagerBuilder;

/// Registry with every built-in storage driver
pub fn default_registry(stores: &ComputeStores, host_agent: HostAgentClient) -> stratus_cloud::Result<StorageDriverRegistry> {
    Ok(StorageDriverRegistry::builder()
        .register(Arc::new(RbdStorageDriver::new(stores.clone(), host_agent)))?
        .build())
}

/// Register the compute task handlers on `builder`
pub fn register_tasks(builder: TaskManagerBuilder, stores: &ComputeStores, host_agent: HostAgentClient) -> TaskManagerBuilder {
    builder.register(
        RBD_STORAGE_UPDATE_TASK,
        Arc::new(RbdStorageUpdateTask::new(stores.clone(), host_agent)),
    )
}
