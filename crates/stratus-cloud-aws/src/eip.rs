//! Elastic IP driver

use crate::region::AwsRegion;
use async_trait::async_trait;
use std::collections::HashMap;
use stratus_cloud::reconcile::wait_until;
use stratus_cloud::{
    CloudEip, CloudError, CloudResource, EipMode, ElasticIp, ResourceStatus, Result, ResultExt,
};

/// Kind of object AWS addresses are associated with
pub const ASSOCIATION_TYPE_SERVER: &str = "server";

/// AWS bills elastic IP traffic only
pub const CHARGE_TYPE_BY_TRAFFIC: &str = "traffic";

/// An AWS elastic IP mapped onto [`CloudEip`]
pub struct AwsEip {
    region: AwsRegion,
    eip: ElasticIp,
}

impl AwsEip {
    pub fn new(region: AwsRegion, eip: ElasticIp) -> Self {
        Self { region, eip }
    }

    /// Canonical fields as last fetched
    pub fn elastic_ip(&self) -> &ElasticIp {
        &self.eip
    }

    pub fn allocation_id(&self) -> &str {
        &self.eip.allocation_id
    }

    pub fn instance_id(&self) -> &str {
        &self.eip.instance_id
    }

    pub fn association_id(&self) -> &str {
        &self.eip.association_id
    }

    fn reject_emulated(&self, operation: &str) -> Result<()> {
        if self.is_emulated() {
            return Err(CloudError::UnsupportedOperation(format!(
                "{} on emulated elastic IP {}",
                operation, self.eip.allocation_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CloudResource for AwsEip {
    fn id(&self) -> &str {
        &self.eip.allocation_id
    }

    fn name(&self) -> &str {
        &self.eip.public_ip
    }

    fn global_id(&self) -> &str {
        &self.eip.allocation_id
    }

    fn status(&self) -> ResourceStatus {
        self.eip.base.status
    }

    fn manager_id(&self) -> &str {
        self.region.manager_id()
    }

    fn tags(&self) -> &HashMap<String, String> {
        &self.eip.base.tags
    }

    /// An instance's own public address shares its id with the instance
    fn is_emulated(&self) -> bool {
        self.eip.allocation_id == self.eip.instance_id
    }

    async fn refresh(&mut self) -> Result<()> {
        if self.is_emulated() {
            return Ok(());
        }
        let fresh = self
            .region
            .get_eip(&self.eip.allocation_id)
            .await
            .context("refresh", &self.eip.allocation_id)?;
        self.eip = fresh;
        Ok(())
    }

    async fn delete(&mut self) -> Result<()> {
        self.reject_emulated("delete")?;
        self.region
            .deallocate_eip(&self.eip.allocation_id)
            .await
            .context("delete", &self.eip.allocation_id)
    }
}

#[async_trait]
impl CloudEip for AwsEip {
    fn ip_addr(&self) -> &str {
        &self.eip.public_ip
    }

    fn mode(&self) -> EipMode {
        if self.is_emulated() {
            EipMode::InstancePublicip
        } else {
            EipMode::StandaloneEip
        }
    }

    fn association_type(&self) -> &str {
        ASSOCIATION_TYPE_SERVER
    }

    fn association_external_id(&self) -> &str {
        &self.eip.instance_id
    }

    fn bandwidth(&self) -> u32 {
        self.eip.bandwidth
    }

    fn internet_charge_type(&self) -> &str {
        CHARGE_TYPE_BY_TRAFFIC
    }

    async fn associate(&mut self, instance_id: &str) -> Result<()> {
        self.reject_emulated("associate")?;
        let eip_id = self.eip.allocation_id.clone();

        self.region
            .associate_eip(&eip_id, instance_id)
            .await
            .context("associate", &eip_id)?;

        let target = instance_id.to_string();
        let poll = self.region.poll();
        wait_until(self, poll, None, |eip| eip.eip.instance_id == target)
            .await
            .context("associate", &eip_id)
    }

    async fn dissociate(&mut self) -> Result<()> {
        self.reject_emulated("dissociate")?;
        if !self.eip.is_associated() {
            tracing::debug!("Elastic IP {} has no association", self.eip.allocation_id);
            return Ok(());
        }

        let eip_id = self.eip.allocation_id.clone();
        self.region
            .dissociate_eip(&eip_id, &self.eip.instance_id)
            .await
            .context("dissociate", &eip_id)?;

        let poll = self.region.poll();
        wait_until(self, poll, None, |eip| !eip.eip.is_associated())
            .await
            .context("dissociate", &eip_id)
    }

    async fn change_bandwidth(&mut self, bandwidth: u32) -> Result<()> {
        self.reject_emulated("change_bandwidth")?;
        self.region
            .update_eip_bandwidth(&self.eip.allocation_id, bandwidth)
            .await
            .context("change_bandwidth", &self.eip.allocation_id)
    }
}
