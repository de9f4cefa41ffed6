//! EC2 address primitives
//!
//! [`Ec2Api`] is the narrow slice of the EC2 API the elastic IP driver needs.
//! [`SdkEc2`] implements it with `aws-sdk-ec2`.

use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ec2::types::{Address, DomainType};
use std::collections::HashMap;

/// Error code EC2 returns for an unknown allocation id
const ALLOCATION_NOT_FOUND: &str = "InvalidAllocationID.NotFound";

/// An address as returned by `DescribeAddresses`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ec2Address {
    pub allocation_id: Option<String>,
    pub association_id: Option<String>,
    pub domain: Option<String>,
    pub instance_id: Option<String>,
    pub network_interface_id: Option<String>,
    pub network_interface_owner_id: Option<String>,
    pub private_ip_address: Option<String>,
    pub public_ip: Option<String>,
    pub tags: HashMap<String, String>,
}

impl From<&Address> for Ec2Address {
    fn from(addr: &Address) -> Self {
        let tags = addr
            .tags()
            .iter()
            .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
            .collect();

        Self {
            allocation_id: addr.allocation_id().map(str::to_string),
            association_id: addr.association_id().map(str::to_string),
            domain: addr.domain().map(|d| d.as_str().to_string()),
            instance_id: addr.instance_id().map(str::to_string),
            network_interface_id: addr.network_interface_id().map(str::to_string),
            network_interface_owner_id: addr.network_interface_owner_id().map(str::to_string),
            private_ip_address: addr.private_ip_address().map(str::to_string),
            public_ip: addr.public_ip().map(str::to_string),
            tags,
        }
    }
}

/// EC2 address operations
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// All addresses of the region, or only `allocation_id` when given
    async fn describe_addresses(&self, allocation_id: Option<&str>) -> Result<Vec<Ec2Address>>;

    /// Returns the new allocation id
    async fn allocate_address(&self, domain: &str) -> Result<String>;

    async fn release_address(&self, allocation_id: &str) -> Result<()>;

    /// Returns the association id
    async fn associate_address(&self, allocation_id: &str, instance_id: &str) -> Result<String>;

    async fn disassociate_address(&self, association_id: &str) -> Result<()>;
}

/// [`Ec2Api`] backed by the AWS SDK
pub struct SdkEc2 {
    client: aws_sdk_ec2::Client,
}

impl SdkEc2 {
    pub fn new(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }

    /// Load credentials from the environment for `region`
    pub async fn from_env(region: &str) -> Self {
        let config = aws_config::from_env()
            .region(aws_sdk_ec2::config::Region::new(region.to_string()))
            .load()
            .await;
        Self::new(aws_sdk_ec2::Client::new(&config))
    }
}

fn api_error<E>(operation: &str, err: E) -> AwsError
where
    E: std::error::Error,
{
    AwsError::Api {
        operation: operation.to_string(),
        message: DisplayErrorContext(&err).to_string(),
    }
}

#[async_trait]
impl Ec2Api for SdkEc2 {
    async fn describe_addresses(&self, allocation_id: Option<&str>) -> Result<Vec<Ec2Address>> {
        tracing::debug!("DescribeAddresses allocation_id={:?}", allocation_id);

        let mut request = self.client.describe_addresses();
        if let Some(id) = allocation_id {
            request = request.allocation_ids(id);
        }

        match request.send().await {
            Ok(output) => Ok(output.addresses().iter().map(Ec2Address::from).collect()),
            Err(e) if e.code() == Some(ALLOCATION_NOT_FOUND) => Err(AwsError::EipNotFound(
                allocation_id.unwrap_or_default().to_string(),
            )),
            Err(e) => {
                tracing::error!("DescribeAddresses failed: {}", DisplayErrorContext(&e));
                Err(api_error("DescribeAddresses", e))
            }
        }
    }

    async fn allocate_address(&self, domain: &str) -> Result<String> {
        tracing::debug!("AllocateAddress domain={}", domain);

        let output = self
            .client
            .allocate_address()
            .domain(DomainType::from(domain))
            .send()
            .await
            .map_err(|e| api_error("AllocateAddress", e))?;

        output
            .allocation_id()
            .map(str::to_string)
            .ok_or_else(|| AwsError::IncompleteAddress("<new>".to_string(), "allocation_id"))
    }

    async fn release_address(&self, allocation_id: &str) -> Result<()> {
        tracing::debug!("ReleaseAddress allocation_id={}", allocation_id);

        self.client
            .release_address()
            .allocation_id(allocation_id)
            .send()
            .await
            .map_err(|e| api_error("ReleaseAddress", e))?;
        Ok(())
    }

    async fn associate_address(&self, allocation_id: &str, instance_id: &str) -> Result<String> {
        tracing::debug!(
            "AssociateAddress allocation_id={} instance_id={}",
            allocation_id,
            instance_id
        );

        let output = self
            .client
            .associate_address()
            .allocation_id(allocation_id)
            .instance_id(instance_id)
            .send()
            .await
            .map_err(|e| api_error("AssociateAddress", e))?;
        Ok(output.association_id().unwrap_or_default().to_string())
    }

    async fn disassociate_address(&self, association_id: &str) -> Result<()> {
        tracing::debug!("DisassociateAddress association_id={}", association_id);

        self.client
            .disassociate_address()
            .association_id(association_id)
            .send()
            .await
            .map_err(|e| api_error("DisassociateAddress", e))?;
        Ok(())
    }
}
