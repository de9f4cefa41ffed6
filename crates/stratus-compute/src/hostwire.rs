//! Host-to-wire attachments
//!
//! Hostwire rows join hosts (master) and wires (slave). A row may only be
//! removed once no live guest NIC on that host sits on a network of that wire.

use crate::models::{ComputeStores, Guest, GuestNetwork, Hostwire, Network};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use stratus_cloud::{CloudError, DependentUsage, JointManager, ObjectStore, Result, ResultExt};

/// Counts guest NICs bound through a hostwire
pub struct GuestNicUsage {
    guests: Arc<dyn ObjectStore<Guest>>,
    networks: Arc<dyn ObjectStore<Network>>,
    guest_networks: Arc<dyn ObjectStore<GuestNetwork>>,
}

impl GuestNicUsage {
    pub fn new(stores: &ComputeStores) -> Self {
        Self {
            guests: stores.guests.clone(),
            networks: stores.networks.clone(),
            guest_networks: stores.guest_networks.clone(),
        }
    }
}

#[async_trait]
impl DependentUsage<Hostwire> for GuestNicUsage {
    async fn count(&self, joint: &Hostwire) -> Result<usize> {
        let guests: HashSet<String> = self
            .guests
            .query(&|g: &Guest| !g.deleted && g.host_id == joint.host_id)
            .await
            .context("count guest nics", &joint.id)?
            .into_iter()
            .map(|g| g.id)
            .collect();
        if guests.is_empty() {
            return Ok(0);
        }

        let networks: HashSet<String> = self
            .networks
            .query(&|n: &Network| !n.deleted && n.wire_id == joint.wire_id)
            .await
            .context("count guest nics", &joint.id)?
            .into_iter()
            .map(|n| n.id)
            .collect();
        if networks.is_empty() {
            return Ok(0);
        }

        self.guest_networks
            .count(&|nic: &GuestNetwork| guests.contains(&nic.guest_id) && networks.contains(&nic.network_id))
            .await
            .context("count guest nics", &joint.id)
    }
}

/// Hostwire relation keyed by `host_id` and `wire_id`
pub struct HostwireManager {
    joints: JointManager<Hostwire>,
    usage: GuestNicUsage,
}

impl HostwireManager {
    pub fn new(stores: &ComputeStores) -> Self {
        Self {
            joints: JointManager::new(stores.hostwires.clone(), "host_id", "wire_id"),
            usage: GuestNicUsage::new(stores),
        }
    }

    pub fn joints(&self) -> &JointManager<Hostwire> {
        &self.joints
    }

    pub async fn attach(&self, hostwire: Hostwire) -> Result<Hostwire> {
        if hostwire.mac_addr.is_empty() {
            return Err(CloudError::MissingParameter("mac_addr".to_string()));
        }
        self.joints.attach(hostwire).await
    }

    pub async fn fetch_by_host_and_wire(&self, host_id: &str, wire_id: &str) -> Result<Hostwire> {
        self.joints.fetch_by_master_and_slave(host_id, wire_id).await
    }

    pub async fn filter_by_host(&self, host_id: &str) -> Result<Vec<Hostwire>> {
        self.joints.filter_by_master(host_id).await
    }

    pub async fn filter_by_wire(&self, wire_id: &str) -> Result<Vec<Hostwire>> {
        self.joints.filter_by_slave(wire_id).await
    }

    /// Live rows with `mac_addr`
    pub async fn filter_by_mac(&self, mac_addr: &str) -> Result<Vec<Hostwire>> {
        self.joints
            .store()
            .query(&|hw: &Hostwire| hw.deleted_at.is_none() && hw.mac_addr.eq_ignore_ascii_case(mac_addr))
            .await
    }

    pub async fn fetch_by_host_id_and_mac(&self, host_id: &str, mac_addr: &str) -> Result<Hostwire> {
        self.filter_by_mac(mac_addr)
            .await?
            .into_iter()
            .find(|hw| hw.host_id == host_id)
            .ok_or_else(|| CloudError::NotFound(format!("hostwire host_id={host_id} mac_addr={mac_addr}")))
    }

    /// Master interface of `host_id` on `wire_id`
    pub async fn fetch_master(&self, host_id: &str, wire_id: &str) -> Result<Hostwire> {
        self.joints
            .store()
            .query(&|hw: &Hostwire| {
                hw.deleted_at.is_none() && hw.is_master && hw.host_id == host_id && hw.wire_id == wire_id
            })
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CloudError::NotFound(format!("master hostwire host_id={host_id} wire_id={wire_id}")))
    }

    pub async fn validate_delete_condition(&self, hostwire: &Hostwire) -> Result<()> {
        self.joints.validate_delete_condition(hostwire, &self.usage).await
    }

    pub async fn delete(&self, hostwire: &Hostwire) -> Result<()> {
        self.joints.delete(hostwire, &self.usage).await
    }

    pub async fn detach(&self, hostwire: &Hostwire) -> Result<Hostwire> {
        self.joints.detach(hostwire).await
    }
}
