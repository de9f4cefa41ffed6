//! Storage reconfiguration task

use crate::host_agent::HostAgentClient;
use crate::models::ComputeStores;
use crate::rbd::fetch_master_host;
use async_trait::async_trait;
use stratus_cloud::{Result, ResultExt, Task, TaskHandler};

/// Pushes the current conf of the target storage to its master host
pub struct RbdStorageUpdateTask {
    stores: ComputeStores,
    host_agent: HostAgentClient,
}

impl RbdStorageUpdateTask {
    pub fn new(stores: ComputeStores, host_agent: HostAgentClient) -> Self {
        Self { stores, host_agent }
    }
}

#[async_trait]
impl TaskHandler for RbdStorageUpdateTask {
    async fn run(&self, task: &Task) -> Result<serde_json::Value> {
        let storage_id = &task.target.id;
        let storage = self.stores.storages.fetch_by_id(storage_id).await?;
        let host = fetch_master_host(&self.stores, &storage)
            .await
            .context("storage update get host", storage_id)?;

        tracing::info!(
            "Pushing conf of storage {} to host {} ({})",
            storage.id,
            host.name,
            host.manager_uri
        );
        self.host_agent
            .update_storage(&host.manager_uri, &storage.id, &storage.storage_conf, task)
            .await
            .context("storage update", storage_id)
    }
}
