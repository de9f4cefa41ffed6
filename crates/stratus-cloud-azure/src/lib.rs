//! Stratus Azure Provider
//!
//! Classic (ASM) virtual network support for Stratus. A classic virtual
//! network is exposed as a [`ClassicWire`], each of its subnets as a
//! [`ClassicNetwork`] implementing `CloudNetwork`.
//!
//! # Requirements
//!
//! - `AZURE_ACCESS_TOKEN`: ARM bearer token
//! - `AZURE_MANAGEMENT_ENDPOINT` (optional): defaults to `https://management.azure.com`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stratus_cloud_azure::{AzureClient, AzureConfig, ClassicWire};
//!
//! let client = Arc::new(AzureClient::new(AzureConfig::from_env()?));
//! let wire = ClassicWire::load(client, vpc_id, "azure-account").await?;
//! for network in wire.networks()? {
//!     println!("{} {}", network.name(), network.address_prefix());
//! }
//! ```

pub mod client;
pub mod error;
pub mod network;
pub mod vpc;

pub use client::{AzureClient, AzureConfig};
pub use error::{AzureError, Result};
pub use network::{ClassicNetwork, ClassicWire};
pub use vpc::{ClassicSubnet, ClassicVpc, ClassicVpcApi};
