//! Classic virtual network model

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Subnet entry of a classic virtual network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassicSubnet {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address_prefix: String,
}

impl ClassicSubnet {
    pub fn new(name: impl Into<String>, address_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address_prefix: address_prefix.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassicVpcProperties {
    #[serde(default)]
    pub subnets: Vec<ClassicSubnet>,

    /// Everything else ARM returned, written back untouched on update
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `Microsoft.ClassicNetwork/virtualNetworks` resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassicVpc {
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default)]
    pub properties: ClassicVpcProperties,
}

impl ClassicVpc {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: None,
            properties: ClassicVpcProperties::default(),
        }
    }

    pub fn subnet(&self, name: &str) -> Option<&ClassicSubnet> {
        self.properties.subnets.iter().find(|s| s.name == name)
    }
}

/// Classic virtual network primitives
#[async_trait]
pub trait ClassicVpcApi: Send + Sync {
    async fn get_classic_vpc(&self, vpc_id: &str) -> Result<ClassicVpc>;

    /// Replace the network definition, subnets included
    async fn update_classic_vpc(&self, vpc: &ClassicVpc) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_properties_survive_round_trip() {
        let raw = serde_json::json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.ClassicNetwork/virtualNetworks/v",
            "name": "v",
            "properties": {
                "addressSpace": { "addressPrefixes": ["10.0.0.0/16"] },
                "subnets": [{ "name": "default", "addressPrefix": "10.0.0.0/24" }]
            }
        });

        let vpc: ClassicVpc = serde_json::from_value(raw.clone()).unwrap();
        assert!(vpc.properties.extra.contains_key("addressSpace"));
        assert_eq!(vpc.subnet("default").unwrap().address_prefix, "10.0.0.0/24");
        assert_eq!(serde_json::to_value(&vpc).unwrap(), raw);
    }
}
