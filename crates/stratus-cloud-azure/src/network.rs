//! Classic wire and network drivers
//!
//! A classic virtual network is exposed as a wire; each of its subnets is a
//! [`ClassicNetwork`] whose address range is derived from `addressPrefix`.

use crate::error::{AzureError, Result as AzureResult};
use crate::vpc::{ClassicSubnet, ClassicVpc, ClassicVpcApi};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use stratus_cloud::{
    AddressPrefix, CloudError, CloudNetwork, CloudResource, ResourceBase, ResourceStatus, Result,
    ResultExt,
};

/// Address allocation on classic networks takes up to two minutes
pub const CLASSIC_ALLOC_TIMEOUT: Duration = Duration::from_secs(120);

pub const SERVER_TYPE_GUEST: &str = "guest";

/// A classic virtual network seen as a wire
#[derive(Clone)]
pub struct ClassicWire {
    api: Arc<dyn ClassicVpcApi>,
    vpc: ClassicVpc,
    manager_id: String,
}

impl ClassicWire {
    pub fn new(api: Arc<dyn ClassicVpcApi>, vpc: ClassicVpc, manager_id: impl Into<String>) -> Self {
        Self {
            api,
            vpc,
            manager_id: manager_id.into(),
        }
    }

    /// Fetch the virtual network `vpc_id` and wrap it
    pub async fn load(
        api: Arc<dyn ClassicVpcApi>,
        vpc_id: &str,
        manager_id: impl Into<String>,
    ) -> AzureResult<Self> {
        let vpc = api.get_classic_vpc(vpc_id).await?;
        Ok(Self::new(api, vpc, manager_id))
    }

    pub fn id(&self) -> String {
        self.vpc.id.to_lowercase()
    }

    pub fn vpc(&self) -> &ClassicVpc {
        &self.vpc
    }

    /// One network per subnet of the parent
    pub fn networks(&self) -> AzureResult<Vec<ClassicNetwork>> {
        self.vpc
            .properties
            .subnets
            .iter()
            .map(|subnet| ClassicNetwork::new(self.clone(), subnet))
            .collect()
    }

    pub fn get_network(&self, name: &str) -> AzureResult<ClassicNetwork> {
        let subnet = self
            .vpc
            .subnet(name)
            .ok_or_else(|| AzureError::NotFound(format!("subnet {} of {}", name, self.vpc.name)))?;
        ClassicNetwork::new(self.clone(), subnet)
    }
}

/// A subnet of a classic virtual network
pub struct ClassicNetwork {
    wire: ClassicWire,
    wire_id: String,
    base: ResourceBase,
    address_prefix: String,
    prefix: AddressPrefix,
}

impl ClassicNetwork {
    fn new(wire: ClassicWire, subnet: &ClassicSubnet) -> AzureResult<Self> {
        let id = format!("{}/subnets/{}", wire.vpc.id, subnet.name).to_lowercase();
        let prefix = AddressPrefix::parse(&subnet.address_prefix)
            .map_err(|e| AzureError::InvalidPrefix(id.clone(), e.to_string()))?;
        let base = ResourceBase::new(id, wire.manager_id.clone())
            .with_name(subnet.name.clone())
            .with_status(ResourceStatus::Available);

        Ok(Self {
            wire_id: wire.id(),
            wire,
            base,
            address_prefix: subnet.address_prefix.clone(),
            prefix,
        })
    }
}

#[async_trait]
impl CloudResource for ClassicNetwork {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn name(&self) -> &str {
        &self.base.name
    }

    fn global_id(&self) -> &str {
        &self.base.global_id
    }

    fn status(&self) -> ResourceStatus {
        ResourceStatus::Available
    }

    fn manager_id(&self) -> &str {
        &self.base.manager_id
    }

    fn tags(&self) -> &HashMap<String, String> {
        &self.base.tags
    }

    fn is_emulated(&self) -> bool {
        false
    }

    async fn refresh(&mut self) -> Result<()> {
        let vpc = self
            .wire
            .api
            .get_classic_vpc(&self.wire.vpc.id)
            .await
            .context("refresh", &self.base.id)?;

        let subnet = vpc
            .subnet(&self.base.name)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("classic network {}", self.base.id)))?;
        let prefix = AddressPrefix::parse(&subnet.address_prefix).context("refresh", &self.base.id)?;

        self.address_prefix = subnet.address_prefix;
        self.prefix = prefix;
        self.wire.vpc = vpc;
        Ok(())
    }

    async fn delete(&mut self) -> Result<()> {
        let mut vpc = self
            .wire
            .api
            .get_classic_vpc(&self.wire.vpc.id)
            .await
            .context("delete", &self.base.id)?;

        let before = vpc.properties.subnets.len();
        vpc.properties
            .subnets
            .retain(|s| !(s.name == self.base.name && s.address_prefix == self.address_prefix));
        if vpc.properties.subnets.len() == before {
            tracing::debug!("Classic network {} already removed", self.base.id);
            return Ok(());
        }

        self.wire
            .api
            .update_classic_vpc(&vpc)
            .await
            .context("delete", &self.base.id)?;
        tracing::info!("Deleted classic network {}", self.base.id);
        self.wire.vpc = vpc;
        Ok(())
    }
}

impl CloudNetwork for ClassicNetwork {
    fn wire_id(&self) -> &str {
        &self.wire_id
    }

    fn address_prefix(&self) -> &str {
        &self.address_prefix
    }

    fn gateway(&self) -> Ipv4Addr {
        self.prefix.gateway()
    }

    fn ip_start(&self) -> Ipv4Addr {
        self.prefix.ip_start()
    }

    fn ip_end(&self) -> Ipv4Addr {
        self.prefix.ip_end()
    }

    fn ip_mask(&self) -> u8 {
        self.prefix.mask_len()
    }

    fn is_public(&self) -> bool {
        true
    }

    fn server_type(&self) -> &str {
        SERVER_TYPE_GUEST
    }

    fn alloc_timeout(&self) -> Duration {
        CLASSIC_ALLOC_TIMEOUT
    }
}
