//! Compute records persisted through `ObjectStore`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stratus_cloud::{JointModel, MemoryStore, ObjectStore, Record};

/// Backend-specific connection settings of a storage
pub type StorageConf = serde_json::Map<String, serde_json::Value>;

macro_rules! impl_record {
    ($ty:ty, $kind:literal) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub name: String,
    /// Base URL of the host agent
    pub manager_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub id: String,
    pub name: String,
    pub storage_type: String,
    #[serde(default)]
    pub storage_conf: StorageConf,
    /// Shared image cache, empty until linked
    #[serde(default)]
    pub storagecache_id: String,
    #[serde(default)]
    pub master_host_id: String,
}

impl Storage {
    /// String field of the storage conf, empty when absent
    pub fn conf_str(&self, key: &str) -> &str {
        self.storage_conf
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }
}

/// Image cache shared by storages with the same connection identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageCache {
    pub id: String,
    pub name: String,
    pub path: String,
}

/// Host-to-wire attachment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hostwire {
    pub id: String,
    pub host_id: String,
    pub wire_id: String,
    pub bridge: String,
    pub interface: String,
    #[serde(default)]
    pub is_master: bool,
    pub mac_addr: String,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Hostwire {
    pub fn new(host_id: impl Into<String>, wire_id: impl Into<String>, mac_addr: impl Into<String>) -> Self {
        Self {
            host_id: host_id.into(),
            wire_id: wire_id.into(),
            mac_addr: mac_addr.into(),
            ..Default::default()
        }
    }

    pub fn with_bridge(mut self, bridge: impl Into<String>, interface: impl Into<String>) -> Self {
        self.bridge = bridge.into();
        self.interface = interface.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guest {
    pub id: String,
    pub host_id: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub wire_id: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Guest NIC: a guest attached to a network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuestNetwork {
    pub id: String,
    pub guest_id: String,
    pub network_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub id: String,
    pub storage_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub disk_id: String,
    pub storage_id: String,
}

impl_record!(Host, "host");
impl_record!(Storage, "storage");
impl_record!(StorageCache, "storagecache");
impl_record!(Hostwire, "hostwire");
impl_record!(Guest, "guest");
impl_record!(Network, "network");
impl_record!(GuestNetwork, "guestnetwork");
impl_record!(Disk, "disk");
impl_record!(Snapshot, "snapshot");

impl JointModel for Hostwire {
    fn master_id(&self) -> &str {
        &self.host_id
    }

    fn slave_id(&self) -> &str {
        &self.wire_id
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
    }
}

/// Object stores of every compute record kind
#[derive(Clone)]
pub struct ComputeStores {
    pub hosts: Arc<dyn ObjectStore<Host>>,
    pub storages: Arc<dyn ObjectStore<Storage>>,
    pub storage_caches: Arc<dyn ObjectStore<StorageCache>>,
    pub hostwires: Arc<dyn ObjectStore<Hostwire>>,
    pub guests: Arc<dyn ObjectStore<Guest>>,
    pub networks: Arc<dyn ObjectStore<Network>>,
    pub guest_networks: Arc<dyn ObjectStore<GuestNetwork>>,
    pub disks: Arc<dyn ObjectStore<Disk>>,
    pub snapshots: Arc<dyn ObjectStore<Snapshot>>,
}

impl ComputeStores {
    /// Empty in-memory stores
    pub fn in_memory() -> Self {
        Self {
            hosts: Arc::new(MemoryStore::new()),
            storages: Arc::new(MemoryStore::new()),
            storage_caches: Arc::new(MemoryStore::new()),
            hostwires: Arc::new(MemoryStore::new()),
            guests: Arc::new(MemoryStore::new()),
            networks: Arc::new(MemoryStore::new()),
            guest_networks: Arc::new(MemoryStore::new()),
            disks: Arc::new(MemoryStore::new()),
            snapshots: Arc::new(MemoryStore::new()),
        }
    }
}
