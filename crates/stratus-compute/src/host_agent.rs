//! Host agent HTTP client
//!
//! Out-of-band calls to the agent running on a compute host. Requests carry
//! the authorization headers of the task that issued them.

use crate::error::{ComputeError, Result};
use serde::Serialize;
use std::time::Duration;
use stratus_cloud::Task;

/// Upper bound on a single host agent request
pub const HOST_AGENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for `{manager_uri}/...` host agent endpoints
#[derive(Clone)]
pub struct HostAgentClient {
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SnapshotRequest<'a> {
    snapshot_id: &'a str,
}

#[derive(Debug, Serialize)]
struct StorageUpdateRequest<'a> {
    storage_id: &'a str,
    storage_conf: &'a serde_json::Map<String, serde_json::Value>,
}

impl Default for HostAgentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HostAgentClient {
    pub fn new() -> Self {
        Self::with_timeout(HOST_AGENT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Building host agent client failed, using defaults: {}", e);
                reqwest::Client::default()
            });
        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// `POST {manager_uri}/disks/{disk_id}/{operation}/{snapshot_id}`
    pub async fn snapshot_operation(
        &self,
        manager_uri: &str,
        disk_id: &str,
        operation: &str,
        snapshot_id: &str,
        task: &Task,
    ) -> Result<serde_json::Value> {
        let url = format!(
            "{}/disks/{}/{}/{}",
            manager_uri.trim_end_matches('/'),
            disk_id,
            operation,
            snapshot_id
        );
        self.post_json(&url, task, &SnapshotRequest { snapshot_id })
            .await
    }

    /// Push a storage's conf to its host
    pub async fn update_storage(
        &self,
        manager_uri: &str,
        storage_id: &str,
        storage_conf: &serde_json::Map<String, serde_json::Value>,
        task: &Task,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/storages/update", manager_uri.trim_end_matches('/'));
        self.post_json(
            &url,
            task,
            &StorageUpdateRequest {
                storage_id,
                storage_conf,
            },
        )
        .await
    }

    async fn post_json<B: Serialize + Sync>(&self, url: &str, task: &Task, body: &B) -> Result<serde_json::Value> {
        tracing::debug!("POST {} (task {})", url, task.id);

        let mut request = self.client.post(url).json(body);
        for (name, value) in task.request_headers() {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ComputeError::HostAgent {
                status: status.as_u16(),
                message: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ComputeError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stratus_cloud::{Credential, ObjectRef, TaskStage};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn task() -> Task {
        let now = Utc::now();
        Task {
            id: "task-1".to_string(),
            task_type: "SnapshotCreateTask".to_string(),
            parent_task_id: None,
            params: serde_json::Value::Null,
            stage: TaskStage::Running,
            target: ObjectRef::new("snapshot", "snap-1"),
            credential: Credential::new("u", "p", "secret"),
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_slow_agent_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/disks/disk-1/snapshot/snap-1"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = HostAgentClient::with_timeout(Duration::from_millis(100))
            .snapshot_operation(&server.uri(), "disk-1", "snapshot", "snap-1", &task())
            .await
            .unwrap_err();
        match err {
            ComputeError::Http(e) => assert!(e.is_timeout()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_snapshot_operation_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/disks/disk-1/snapshot/snap-1"))
            .and(header("authorization", "Bearer secret"))
            .and(header("x-task-id", "task-1"))
            .and(body_json(serde_json::json!({ "snapshot_id": "snap-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let value = HostAgentClient::new()
            .snapshot_operation(&server.uri(), "disk-1", "snapshot", "snap-1", &task())
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("rbd busy"))
            .mount(&server)
            .await;

        let err = HostAgentClient::new()
            .snapshot_operation(&server.uri(), "disk-1", "delete-snapshot", "snap-1", &task())
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::HostAgent { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_unparsable_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = HostAgentClient::new()
            .snapshot_operation(&server.uri(), "disk-1", "snapshot", "snap-1", &task())
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::InvalidResponse(_)));
    }
}
