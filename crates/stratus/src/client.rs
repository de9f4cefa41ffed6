//! Instance group REST client

use anyhow::{Context, bail};
use serde::Serialize;
use serde_json::Value;
use stratus_config::ClientConfig;

const KEYWORD: &str = "instancegroup";
const KEYWORD_PLURAL: &str = "instancegroups";

#[derive(Debug, Default, Serialize)]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Serialize)]
pub struct CreateParams {
    pub name: String,
    pub zone_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sched_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<u32>,
}

#[derive(Debug)]
pub struct ListResult {
    pub items: Vec<Value>,
    pub total: u64,
}

pub struct InstanceGroupClient {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl InstanceGroupClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.endpoint, path);
        tracing::debug!("{} {}", method, url);

        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> anyhow::Result<Value> {
        let response = request.send().await.context("request failed")?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("details").and_then(|d| d.as_str()).map(str::to_string))
                .unwrap_or(text);
            bail!("{}: {}", status, message);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).context("response is not JSON")
    }

    /// Unwrap `{"instancegroup": {...}}`, passing other shapes through
    fn unwrap_object(mut value: Value) -> Value {
        match value.get_mut(KEYWORD) {
            Some(inner) => inner.take(),
            None => value,
        }
    }

    pub async fn list(&self, query: &ListQuery) -> anyhow::Result<ListResult> {
        let body = self
            .send(self.request(reqwest::Method::GET, KEYWORD_PLURAL).query(query))
            .await?;

        let items = match body.get(KEYWORD_PLURAL) {
            Some(Value::Array(items)) => items.clone(),
            _ => bail!("response has no `{}` list", KEYWORD_PLURAL),
        };
        let total = body
            .get("total")
            .and_then(Value::as_u64)
            .unwrap_or(items.len() as u64);
        Ok(ListResult { items, total })
    }

    pub async fn show(&self, id: &str) -> anyhow::Result<Value> {
        let path = format!("{KEYWORD_PLURAL}/{id}");
        let body = self.send(self.request(reqwest::Method::GET, &path)).await?;
        Ok(Self::unwrap_object(body))
    }

    pub async fn create(&self, params: &CreateParams) -> anyhow::Result<Value> {
        let mut body = serde_json::Map::new();
        body.insert(KEYWORD.to_string(), serde_json::to_value(params)?);
        let body = self
            .send(self.request(reqwest::Method::POST, KEYWORD_PLURAL).json(&body))
            .await?;
        Ok(Self::unwrap_object(body))
    }

    pub async fn delete(&self, id: &str) -> anyhow::Result<Value> {
        let path = format!("{KEYWORD_PLURAL}/{id}");
        let body = self.send(self.request(reqwest::Method::DELETE, &path)).await?;
        Ok(Self::unwrap_object(body))
    }
}
