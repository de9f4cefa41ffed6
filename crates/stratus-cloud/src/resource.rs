//! Canonical resource interfaces
//!
//! Every provider driver maps its native objects onto these traits so the
//! rest of the control plane can treat an AWS elastic IP and an Azure
//! classic network the same way.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Status of a canonical resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Resource is being created
    Creating,
    /// Resource is allocated and idle
    Ready,
    /// Resource can be consumed (networks)
    Available,
    /// Association in progress
    Associating,
    /// Dissociation in progress
    Dissociating,
    /// Resource is running/active
    Running,
    /// Resource is stopped
    Stopped,
    /// Resource is being deleted
    Deleting,
    /// Resource has been deleted
    Deleted,
    /// Resource is in error state
    Error,
    /// Status is unknown
    Unknown,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Ready => write!(f, "ready"),
            ResourceStatus::Available => write!(f, "available"),
            ResourceStatus::Associating => write!(f, "associating"),
            ResourceStatus::Dissociating => write!(f, "dissociating"),
            ResourceStatus::Running => write!(f, "running"),
            ResourceStatus::Stopped => write!(f, "stopped"),
            ResourceStatus::Deleting => write!(f, "deleting"),
            ResourceStatus::Deleted => write!(f, "deleted"),
            ResourceStatus::Error => write!(f, "error"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Fields shared by every canonical resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBase {
    /// Provider-local identifier
    pub id: String,

    /// Identifier unique within the provider account
    pub global_id: String,

    pub name: String,

    pub status: ResourceStatus,

    /// Cloud account (manager) the resource was fetched through
    pub manager_id: String,

    pub tags: HashMap<String, String>,
}

impl ResourceBase {
    pub fn new(id: impl Into<String>, manager_id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            global_id: id.clone(),
            id,
            name: String::new(),
            status: ResourceStatus::Unknown,
            manager_id: manager_id.into(),
            tags: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Contract every canonical resource driver satisfies
///
/// Getters read only already-fetched fields. `refresh` re-reads the remote
/// object and overwrites every local field, failing with `NotFound` when the
/// object is gone.
#[async_trait]
pub trait CloudResource: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn global_id(&self) -> &str;

    fn status(&self) -> ResourceStatus;

    fn manager_id(&self) -> &str;

    fn tags(&self) -> &HashMap<String, String>;

    /// Whether this resource is synthesized from another object's data
    /// rather than independently addressable at the provider
    fn is_emulated(&self) -> bool;

    async fn refresh(&mut self) -> Result<()>;

    async fn delete(&mut self) -> Result<()>;
}

/// How an elastic IP is attached to its instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EipMode {
    /// Instance public address projected as an EIP
    #[serde(rename = "public_ip")]
    InstancePublicip,
    /// Independently allocated address
    #[serde(rename = "elastic_ip")]
    StandaloneEip,
}

impl std::fmt::Display for EipMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EipMode::InstancePublicip => write!(f, "public_ip"),
            EipMode::StandaloneEip => write!(f, "elastic_ip"),
        }
    }
}

/// Canonical elastic IP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticIp {
    pub base: ResourceBase,
    pub allocation_id: String,
    /// Mbps, 0 when the provider does not expose it
    pub bandwidth: u32,
    /// Empty when unbound
    pub association_id: String,
    /// Bound instance, empty when unbound
    pub instance_id: String,
    pub domain: String,
    pub network_interface_id: String,
    pub network_interface_owner_id: String,
    pub private_ip: String,
    pub public_ip: String,
}

impl ElasticIp {
    pub fn is_associated(&self) -> bool {
        !self.association_id.is_empty()
    }
}

/// Elastic IP capabilities
#[async_trait]
pub trait CloudEip: CloudResource {
    fn ip_addr(&self) -> &str;

    fn mode(&self) -> EipMode;

    /// Kind of object the address is associated with
    fn association_type(&self) -> &str;

    fn association_external_id(&self) -> &str;

    fn bandwidth(&self) -> u32;

    fn internet_charge_type(&self) -> &str;

    async fn associate(&mut self, instance_id: &str) -> Result<()>;

    async fn dissociate(&mut self) -> Result<()>;

    async fn change_bandwidth(&mut self, bandwidth: u32) -> Result<()>;
}

/// Network segment capabilities; range fields are derived from the prefix
pub trait CloudNetwork: CloudResource {
    /// Non-owning reference to the parent wire
    fn wire_id(&self) -> &str;

    fn address_prefix(&self) -> &str;

    fn gateway(&self) -> Ipv4Addr;

    fn ip_start(&self) -> Ipv4Addr;

    fn ip_end(&self) -> Ipv4Addr;

    fn ip_mask(&self) -> u8;

    fn is_public(&self) -> bool;

    fn server_type(&self) -> &str;

    /// How long address allocation on this network may take
    fn alloc_timeout(&self) -> Duration;
}
