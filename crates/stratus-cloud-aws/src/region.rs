//! Region-level elastic IP primitives

use crate::ec2::{Ec2Address, Ec2Api};
use crate::eip::AwsEip;
use crate::error::{AwsError, Result};
use std::sync::Arc;
use stratus_cloud::{ElasticIp, PollConfig, ResourceBase, ResourceStatus};

/// Domain new addresses are allocated in
pub const DEFAULT_DOMAIN: &str = "vpc";

/// One AWS region of a cloud account
#[derive(Clone)]
pub struct AwsRegion {
    api: Arc<dyn Ec2Api>,
    region_id: String,
    manager_id: String,
    poll: PollConfig,
}

impl AwsRegion {
    pub fn new(api: Arc<dyn Ec2Api>, region_id: impl Into<String>, manager_id: impl Into<String>) -> Self {
        Self {
            api,
            region_id: region_id.into(),
            manager_id: manager_id.into(),
            poll: PollConfig::default(),
        }
    }

    /// Override how drivers of this region reconcile after a mutation
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn manager_id(&self) -> &str {
        &self.manager_id
    }

    pub fn poll(&self) -> PollConfig {
        self.poll
    }

    /// All addresses, or just `eip_id` when given
    pub async fn get_eips(&self, eip_id: Option<&str>) -> Result<Vec<ElasticIp>> {
        let addresses = self.api.describe_addresses(eip_id).await?;
        addresses
            .into_iter()
            .map(|addr| self.to_eip(addr))
            .collect()
    }

    /// The address with `eip_id`; anything but exactly one match is `NotFound`
    pub async fn get_eip(&self, eip_id: &str) -> Result<ElasticIp> {
        let mut eips = self.get_eips(Some(eip_id)).await?;
        if eips.len() != 1 {
            tracing::debug!("DescribeAddresses {} returned {} addresses", eip_id, eips.len());
            return Err(AwsError::EipNotFound(eip_id.to_string()));
        }
        Ok(eips.remove(0))
    }

    /// Driver for the address with `eip_id`
    pub async fn fetch_eip(&self, eip_id: &str) -> Result<AwsEip> {
        let eip = self.get_eip(eip_id).await?;
        Ok(AwsEip::new(self.clone(), eip))
    }

    pub async fn allocate_eip(&self, domain: &str) -> Result<AwsEip> {
        let allocation_id = self.api.allocate_address(domain).await.map_err(|e| {
            tracing::error!("AllocateAddress in {} failed: {}", self.region_id, e);
            e
        })?;
        tracing::info!("Allocated elastic IP {} in {}", allocation_id, self.region_id);
        self.fetch_eip(&allocation_id).await
    }

    /// AWS cannot honour a name, bandwidth or charge type on allocation
    pub async fn create_eip(&self, name: &str, bandwidth: u32, charge_type: &str) -> Result<AwsEip> {
        tracing::debug!(
            "CreateEip: aws ignores name={} bandwidth={} charge_type={}",
            name,
            bandwidth,
            charge_type
        );
        self.allocate_eip(DEFAULT_DOMAIN).await
    }

    pub async fn deallocate_eip(&self, eip_id: &str) -> Result<()> {
        self.api.release_address(eip_id).await?;
        tracing::info!("Released elastic IP {}", eip_id);
        Ok(())
    }

    pub async fn associate_eip(&self, eip_id: &str, instance_id: &str) -> Result<()> {
        let association_id = self.api.associate_address(eip_id, instance_id).await?;
        tracing::info!(
            "Associated elastic IP {} with {} ({})",
            eip_id,
            instance_id,
            association_id
        );
        Ok(())
    }

    /// Unbind `eip_id` from `instance_id` using the address's current state
    ///
    /// Succeeds without a provider call when the address is already unbound;
    /// refuses when it is bound to another instance.
    pub async fn dissociate_eip(&self, eip_id: &str, instance_id: &str) -> Result<()> {
        let eip = self.get_eip(eip_id).await?;
        if !eip.is_associated() {
            tracing::debug!("Elastic IP {} is already unbound", eip_id);
            return Ok(());
        }

        if eip.instance_id != instance_id {
            return Err(AwsError::AssociatedElsewhere {
                eip: eip_id.to_string(),
                instance: eip.instance_id,
            });
        }

        self.api.disassociate_address(&eip.association_id).await?;
        tracing::info!("Dissociated elastic IP {} from {}", eip_id, instance_id);
        Ok(())
    }

    pub async fn update_eip_bandwidth(&self, eip_id: &str, bandwidth: u32) -> Result<()> {
        Err(AwsError::Unsupported(format!(
            "changing bandwidth of {eip_id} to {bandwidth} Mbps"
        )))
    }

    fn to_eip(&self, addr: Ec2Address) -> Result<ElasticIp> {
        let allocation_id = addr
            .allocation_id
            .ok_or_else(|| AwsError::IncompleteAddress("<unknown>".to_string(), "allocation_id"))?;
        let public_ip = addr
            .public_ip
            .ok_or_else(|| AwsError::IncompleteAddress(allocation_id.clone(), "public_ip"))?;

        let base = ResourceBase::new(allocation_id.clone(), self.manager_id.clone())
            .with_name(public_ip.clone())
            .with_status(ResourceStatus::Ready)
            .with_tags(addr.tags);

        Ok(ElasticIp {
            base,
            allocation_id,
            bandwidth: 0,
            association_id: addr.association_id.unwrap_or_default(),
            instance_id: addr.instance_id.unwrap_or_default(),
            domain: addr.domain.unwrap_or_default(),
            network_interface_id: addr.network_interface_id.unwrap_or_default(),
            network_interface_owner_id: addr.network_interface_owner_id.unwrap_or_default(),
            private_ip: addr.private_ip_address.unwrap_or_default(),
            public_ip,
        })
    }
}
