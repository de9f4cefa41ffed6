//! Azure Resource Manager REST client
//!
//! Bearer-token client for the classic virtual network endpoints the network
//! driver needs.

use crate::error::{AzureError, Result};
use crate::vpc::{ClassicVpc, ClassicVpcApi};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

const AZURE_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// API version of `Microsoft.ClassicNetwork/virtualNetworks`
pub const CLASSIC_NETWORK_API_VERSION: &str = "2016-04-01";

/// Connection settings for the ARM API
#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub access_token: String,
    pub endpoint: String,
}

impl AzureConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            endpoint: AZURE_MANAGEMENT_ENDPOINT.to_string(),
        }
    }

    /// Read `AZURE_ACCESS_TOKEN` and optionally `AZURE_MANAGEMENT_ENDPOINT`
    pub fn from_env() -> Result<Self> {
        let access_token = std::env::var("AZURE_ACCESS_TOKEN")
            .map_err(|_| AzureError::MissingEnvVar("AZURE_ACCESS_TOKEN".to_string()))?;
        let endpoint = std::env::var("AZURE_MANAGEMENT_ENDPOINT")
            .unwrap_or_else(|_| AZURE_MANAGEMENT_ENDPOINT.to_string());

        Ok(Self {
            access_token,
            endpoint,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// ARM client
pub struct AzureClient {
    client: reqwest::Client,
    config: AzureConfig,
}

impl AzureClient {
    pub fn new(config: AzureConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, resource_id: &str, api_version: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            resource_id.trim_start_matches('/'),
            api_version
        )
    }

    /// GET a resource by its ARM id
    pub async fn get<T: DeserializeOwned>(&self, resource_id: &str, api_version: &str) -> Result<T> {
        tracing::debug!("GET {}", resource_id);

        let response = self
            .client
            .get(self.url(resource_id, api_version))
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;

        let body = check_status(resource_id, response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// PUT (create or replace) a resource by its ARM id
    pub async fn put<B: Serialize + Sync>(&self, resource_id: &str, api_version: &str, body: &B) -> Result<()> {
        tracing::debug!("PUT {}", resource_id);

        let response = self
            .client
            .put(self.url(resource_id, api_version))
            .bearer_auth(&self.config.access_token)
            .json(body)
            .send()
            .await?;

        check_status(resource_id, response).await?;
        Ok(())
    }
}

async fn check_status(resource_id: &str, response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(AzureError::NotFound(resource_id.to_string()));
    }
    if !status.is_success() {
        return Err(AzureError::ApiError {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    Ok(body)
}

/// ARM wraps failures as `{"error": {"code", "message"}}`
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl ClassicVpcApi for AzureClient {
    async fn get_classic_vpc(&self, vpc_id: &str) -> Result<ClassicVpc> {
        self.get(vpc_id, CLASSIC_NETWORK_API_VERSION).await
    }

    async fn update_classic_vpc(&self, vpc: &ClassicVpc) -> Result<()> {
        self.put(&vpc.id, CLASSIC_NETWORK_API_VERSION, vpc).await
    }
}
