//! Ceph RBD storage driver

use crate::error::ComputeError;
use crate::host_agent::HostAgentClient;
use crate::models::{ComputeStores, Disk, Host, Snapshot, Storage, StorageCache, StorageConf};
use crate::storage_driver::{StorageCreateInput, StorageDriver, StorageUpdateInput};
use async_trait::async_trait;
use serde::Serialize;
use stratus_cloud::{CloudError, ObjectRef, Result, ResultExt, Task, TaskManager};

pub const STORAGE_RBD: &str = "rbd";

/// Task type pushing an updated RBD conf to the master host
pub const RBD_STORAGE_UPDATE_TASK: &str = "RbdStorageUpdateTask";

/// Seconds
pub const RBD_DEFAULT_MON_TIMEOUT: i64 = 5;
pub const RBD_DEFAULT_OSD_TIMEOUT: i64 = 1200;
pub const RBD_DEFAULT_MOUNT_TIMEOUT: i64 = 120;

#[derive(Debug, Clone, Serialize)]
struct RbdStorageConf {
    mon_host: String,
    pool: String,
    key: String,
    rados_mon_op_timeout: i64,
    rados_osd_op_timeout: i64,
    client_mount_timeout: i64,
}

impl RbdStorageConf {
    fn into_conf(self) -> Result<StorageConf> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(CloudError::InternalError(format!(
                "rbd conf serialised to {other}"
            ))),
        }
    }
}

fn timeout_or_default(value: Option<i64>, default: i64) -> i64 {
    value.filter(|t| *t > 0).unwrap_or(default)
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(CloudError::MissingParameter(name.to_string())),
    }
}

/// Master host of `storage`
pub(crate) async fn fetch_master_host(stores: &ComputeStores, storage: &Storage) -> Result<Host> {
    if storage.master_host_id.is_empty() {
        return Err(ComputeError::NoMasterHost(storage.id.clone()).into());
    }
    stores.hosts.fetch_by_id(&storage.master_host_id).await
}

/// RBD driver
pub struct RbdStorageDriver {
    stores: ComputeStores,
    host_agent: HostAgentClient,
}

impl RbdStorageDriver {
    pub fn new(stores: ComputeStores, host_agent: HostAgentClient) -> Self {
        Self { stores, host_agent }
    }

    async fn rbd_storages(&self) -> Result<Vec<Storage>> {
        self.stores
            .storages
            .query(&|s: &Storage| s.storage_type == STORAGE_RBD)
            .await
    }

    async fn link_storage_cache(&self, storage: &Storage, input: &StorageCreateInput) -> Result<()> {
        // identity comes from the normalised conf, not the raw request
        let conf = if input.storage_conf.is_empty() {
            &storage.storage_conf
        } else {
            &input.storage_conf
        };
        let conf_str = |field: &str| conf.get(field).and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let mon_host = conf_str("mon_host");
        let key = conf_str("key");
        let pool = conf_str("pool");

        let shared = self
            .rbd_storages()
            .await
            .context("fetch storages", &storage.id)?
            .into_iter()
            .find(|s| {
                s.id != storage.id
                    && !s.storagecache_id.is_empty()
                    && s.conf_str("mon_host") == mon_host
                    && s.conf_str("key") == key
            });

        let cache_id = match shared {
            Some(other) => {
                tracing::debug!(
                    "Storage {} shares image cache {} with {}",
                    storage.id,
                    other.storagecache_id,
                    other.id
                );
                other.storagecache_id
            }
            None => {
                let cache = StorageCache {
                    id: String::new(),
                    name: format!("imagecache-{}", storage.id),
                    path: format!("rbd:{pool}"),
                };
                let cache = self
                    .stores
                    .storage_caches
                    .insert(cache)
                    .await
                    .context("insert storagecache", &storage.id)?;
                tracing::info!("Created image cache {} for storage {}", cache.name, storage.id);
                cache.id
            }
        };

        self.stores
            .storages
            .update(
                &storage.id,
                Box::new(move |s: &mut Storage| s.storagecache_id = cache_id),
            )
            .await
            .context("update storagecache_id", &storage.id)?;
        Ok(())
    }

    async fn snapshot_host(&self, snapshot: &Snapshot) -> Result<Host> {
        let storage = self.stores.storages.fetch_by_id(&snapshot.storage_id).await?;
        fetch_master_host(&self.stores, &storage).await
    }
}

#[async_trait]
impl StorageDriver for RbdStorageDriver {
    fn storage_type(&self) -> &str {
        STORAGE_RBD
    }

    async fn validate_create_data(&self, input: &mut StorageCreateInput) -> Result<StorageConf> {
        let mon_host = required(&input.rbd_mon_host, "rbd_mon_host")?;
        let pool = required(&input.rbd_pool, "rbd_pool")?;

        let conf = RbdStorageConf {
            key: input.rbd_key.clone().unwrap_or_default(),
            rados_mon_op_timeout: timeout_or_default(input.rbd_rados_mon_op_timeout, RBD_DEFAULT_MON_TIMEOUT),
            rados_osd_op_timeout: timeout_or_default(input.rbd_rados_osd_op_timeout, RBD_DEFAULT_OSD_TIMEOUT),
            client_mount_timeout: timeout_or_default(input.rbd_client_mount_timeout, RBD_DEFAULT_MOUNT_TIMEOUT),
            mon_host,
            pool,
        };

        let existing = self
            .rbd_storages()
            .await?
            .into_iter()
            .find(|s| s.conf_str("mon_host") == conf.mon_host && s.conf_str("pool") == conf.pool);
        if let Some(existing) = existing {
            return Err(CloudError::DuplicateResource(format!(
                "RBD storage {}/{} already exists",
                existing.name, conf.pool
            )));
        }

        let conf = conf.into_conf()?;
        input.storage_conf = conf.clone();
        Ok(conf)
    }

    async fn validate_update_data(&self, storage: &Storage, patch: &StorageUpdateInput) -> Result<bool> {
        let mut changes: Vec<(&'static str, serde_json::Value)> = [
            ("rados_mon_op_timeout", patch.rbd_rados_mon_op_timeout),
            ("rados_osd_op_timeout", patch.rbd_rados_osd_op_timeout),
            ("client_mount_timeout", patch.rbd_client_mount_timeout),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.filter(|t| *t > 0).map(|t| (field, serde_json::Value::from(t))))
        .collect();

        if let Some(key) = patch.rbd_key.as_deref().filter(|k| !k.is_empty()) {
            changes.push(("key", serde_json::Value::from(key)));
        }

        if changes.is_empty() {
            return Ok(false);
        }

        self.stores
            .storages
            .update(
                &storage.id,
                Box::new(move |s: &mut Storage| {
                    for (field, value) in changes {
                        s.storage_conf.insert(field.to_string(), value);
                    }
                }),
            )
            .await
            .context("update storage conf", &storage.id)?;
        tracing::info!("Updated conf of storage {}", storage.id);
        Ok(true)
    }

    async fn post_create(&self, storage: &Storage, input: &StorageCreateInput) {
        if let Err(e) = self.link_storage_cache(storage, input).await {
            tracing::error!("Linking image cache of storage {} failed: {}", storage.name, e);
        }
    }

    async fn do_storage_update_task(&self, storage: &Storage, task: &Task, tasks: &TaskManager) -> Result<()> {
        let subtask = tasks
            .new_subtask(task, RBD_STORAGE_UPDATE_TASK, ObjectRef::new("storage", &storage.id))
            .await?;
        tasks.schedule_run(&subtask.id).await?;
        tracing::info!(
            "Scheduled {} {} for storage {} (parent {})",
            RBD_STORAGE_UPDATE_TASK,
            subtask.id,
            storage.id,
            task.id
        );
        Ok(())
    }

    async fn request_create_snapshot(&self, snapshot: &Snapshot, task: &Task) -> Result<()> {
        let disk = self
            .stores
            .disks
            .fetch_by_id(&snapshot.disk_id)
            .await
            .context("snapshot get disk", &snapshot.id)?;
        let host = self
            .snapshot_host(snapshot)
            .await
            .context("snapshot get host", &snapshot.id)?;

        self.host_agent
            .snapshot_operation(&host.manager_uri, &disk.id, "snapshot", &snapshot.id, task)
            .await
            .context("request create snapshot", &snapshot.id)?;
        Ok(())
    }

    async fn request_delete_snapshot(&self, snapshot: &Snapshot, task: &Task) -> Result<()> {
        let host = self
            .snapshot_host(snapshot)
            .await
            .context("snapshot get host", &snapshot.id)?;

        self.host_agent
            .snapshot_operation(
                &host.manager_uri,
                &snapshot.disk_id,
                "delete-snapshot",
                &snapshot.id,
                task,
            )
            .await
            .context("request delete snapshot", &snapshot.id)?;
        Ok(())
    }

    fn snapshot_is_out_of_chain(&self, _disk: &Disk) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update_task::RbdStorageUpdateTask;
    use std::sync::Arc;
    use stratus_cloud::{Credential, ErrorKind, MemoryStore, TaskHandler, TaskStage};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn driver(stores: &ComputeStores) -> RbdStorageDriver {
        RbdStorageDriver::new(stores.clone(), HostAgentClient::new())
    }

    fn create_input(mon_host: &str, pool: &str) -> StorageCreateInput {
        StorageCreateInput {
            name: format!("rbd-{pool}"),
            storage_type: STORAGE_RBD.to_string(),
            rbd_mon_host: Some(mon_host.to_string()),
            rbd_pool: Some(pool.to_string()),
            rbd_key: Some("AQBkey==".to_string()),
            ..Default::default()
        }
    }

    /// Run validation and persist the storage the way the API layer does
    async fn create_storage(stores: &ComputeStores, input: &mut StorageCreateInput) -> Result<Storage> {
        let conf = driver(stores).validate_create_data(input).await?;
        stores
            .storages
            .insert(Storage {
                name: input.name.clone(),
                storage_type: STORAGE_RBD.to_string(),
                storage_conf: conf,
                ..Default::default()
            })
            .await
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let stores = ComputeStores::in_memory();
        let mut input = create_input("", "pool");
        let err = driver(&stores).validate_create_data(&mut input).await.unwrap_err();
        assert!(matches!(err, CloudError::MissingParameter(ref p) if p == "rbd_mon_host"));

        let mut input = create_input("10.0.0.1", "pool");
        input.rbd_pool = None;
        let err = driver(&stores).validate_create_data(&mut input).await.unwrap_err();
        assert!(matches!(err, CloudError::MissingParameter(ref p) if p == "rbd_pool"));
    }

    #[tokio::test]
    async fn test_defaults_are_applied() {
        let stores = ComputeStores::in_memory();
        let mut input = create_input("10.0.0.1", "rbd");
        input.rbd_rados_osd_op_timeout = Some(-1);
        input.rbd_client_mount_timeout = Some(30);

        let conf = driver(&stores).validate_create_data(&mut input).await.unwrap();
        assert_eq!(conf["mon_host"], "10.0.0.1");
        assert_eq!(conf["pool"], "rbd");
        assert_eq!(conf["key"], "AQBkey==");
        assert_eq!(conf["rados_mon_op_timeout"], RBD_DEFAULT_MON_TIMEOUT);
        assert_eq!(conf["rados_osd_op_timeout"], RBD_DEFAULT_OSD_TIMEOUT);
        assert_eq!(conf["client_mount_timeout"], 30);
        assert_eq!(input.storage_conf, conf);
    }

    #[tokio::test]
    async fn test_duplicate_mon_host_and_pool() {
        let stores = ComputeStores::in_memory();
        create_storage(&stores, &mut create_input("10.0.0.1", "rbd")).await.unwrap();

        let err = create_storage(&stores, &mut create_input("10.0.0.1", "rbd"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateResource);

        create_storage(&stores, &mut create_input("10.0.0.1", "ssd")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_key_only_keeps_timeouts() {
        let stores = ComputeStores::in_memory();
        let mut input = create_input("10.0.0.1", "rbd");
        input.rbd_rados_osd_op_timeout = Some(600);
        let storage = create_storage(&stores, &mut input).await.unwrap();
        let driver = driver(&stores);

        let patch = StorageUpdateInput {
            rbd_key: Some("AQBnew==".to_string()),
            ..Default::default()
        };
        assert!(driver.validate_update_data(&storage, &patch).await.unwrap());

        let stored = stores.storages.fetch_by_id(&storage.id).await.unwrap();
        assert_eq!(stored.conf_str("key"), "AQBnew==");
        assert_eq!(stored.storage_conf["rados_osd_op_timeout"], 600);
        assert_eq!(stored.storage_conf["rados_mon_op_timeout"], RBD_DEFAULT_MON_TIMEOUT);

        let noop = StorageUpdateInput {
            rbd_rados_mon_op_timeout: Some(0),
            rbd_key: Some(String::new()),
            ..Default::default()
        };
        assert!(!driver.validate_update_data(&storage, &noop).await.unwrap());
    }

    #[tokio::test]
    async fn test_post_create_links_cache() {
        let stores = ComputeStores::in_memory();
        let driver = driver(&stores);

        let mut first_input = create_input("10.0.0.1", "rbd");
        let first = create_storage(&stores, &mut first_input).await.unwrap();
        driver.post_create(&first, &first_input).await;

        let first = stores.storages.fetch_by_id(&first.id).await.unwrap();
        let cache = stores
            .storage_caches
            .fetch_by_id(&first.storagecache_id)
            .await
            .unwrap();
        assert_eq!(cache.name, format!("imagecache-{}", first.id));
        assert_eq!(cache.path, "rbd:rbd");

        // same monitor and key: the cache is shared
        let mut second_input = create_input("10.0.0.1", "ssd");
        let second = create_storage(&stores, &mut second_input).await.unwrap();
        driver.post_create(&second, &second_input).await;

        let second = stores.storages.fetch_by_id(&second.id).await.unwrap();
        assert_eq!(second.storagecache_id, first.storagecache_id);
        assert_eq!(stores.storage_caches.count(&|_: &StorageCache| true).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_post_create_matches_trimmed_mon_host() {
        let stores = ComputeStores::in_memory();
        let driver = driver(&stores);

        let mut cache_ids = Vec::new();
        for pool in ["a", "b"] {
            let mut input = create_input(" 10.0.0.1 ", pool);
            let storage = create_storage(&stores, &mut input).await.unwrap();
            assert_eq!(storage.conf_str("mon_host"), "10.0.0.1");
            driver.post_create(&storage, &input).await;

            let storage = stores.storages.fetch_by_id(&storage.id).await.unwrap();
            cache_ids.push(storage.storagecache_id);
        }

        assert_eq!(cache_ids[0], cache_ids[1]);
        assert_eq!(stores.storage_caches.count(&|_: &StorageCache| true).await.unwrap(), 1);
        let cache = stores.storage_caches.fetch_by_id(&cache_ids[0]).await.unwrap();
        assert_eq!(cache.path, "rbd:a");
    }

    #[tokio::test]
    async fn test_post_create_never_fails() {
        let stores = ComputeStores::in_memory();
        let input = create_input("10.0.0.1", "rbd");
        // storage row was never persisted; linking fails and is only logged
        let ghost = Storage {
            id: "ghost".to_string(),
            ..Default::default()
        };
        driver(&stores).post_create(&ghost, &input).await;
    }

    struct Noop;

    #[async_trait]
    impl TaskHandler for Noop {
        async fn run(&self, _task: &Task) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    #[tokio::test]
    async fn test_storage_update_spawns_subtask() {
        let stores = ComputeStores::in_memory();
        let storage = create_storage(&stores, &mut create_input("10.0.0.1", "rbd"))
            .await
            .unwrap();
        let (tasks, _worker) = TaskManager::builder(Arc::new(MemoryStore::new()))
            .register("StorageUpdateTask", Arc::new(Noop))
            .register(
                RBD_STORAGE_UPDATE_TASK,
                Arc::new(RbdStorageUpdateTask::new(stores.clone(), HostAgentClient::new())),
            )
            .build();

        let parent = tasks
            .new_task(
                "StorageUpdateTask",
                ObjectRef::new("storage", &storage.id),
                Credential::new("admin", "system", "tok"),
                serde_json::json!({ "rbd_key": "AQBnew==" }),
                None,
            )
            .await
            .unwrap();

        driver(&stores)
            .do_storage_update_task(&storage, &parent, &tasks)
            .await
            .unwrap();

        let children = tasks.children(&parent.id).await.unwrap();
        assert_eq!(children.len(), 1);
        let child = &children[0];
        assert_eq!(child.task_type, RBD_STORAGE_UPDATE_TASK);
        assert_eq!(child.stage, TaskStage::Scheduled);
        assert_eq!(child.credential, parent.credential);
        assert_eq!(child.params, parent.params);
        assert_eq!(child.target.id, storage.id);
    }

    async fn snapshot_fixture(stores: &ComputeStores, manager_uri: &str) -> Snapshot {
        let host = stores
            .hosts
            .insert(Host {
                name: "host-1".to_string(),
                manager_uri: manager_uri.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let storage = stores
            .storages
            .insert(Storage {
                name: "rbd".to_string(),
                storage_type: STORAGE_RBD.to_string(),
                master_host_id: host.id,
                ..Default::default()
            })
            .await
            .unwrap();
        let disk = stores
            .disks
            .insert(Disk {
                id: "disk-1".to_string(),
                storage_id: storage.id.clone(),
            })
            .await
            .unwrap();
        stores
            .snapshots
            .insert(Snapshot {
                id: "snap-1".to_string(),
                disk_id: disk.id,
                storage_id: storage.id,
            })
            .await
            .unwrap()
    }

    fn running_task() -> Task {
        let now = chrono::Utc::now();
        Task {
            id: "task-9".to_string(),
            task_type: "SnapshotCreateTask".to_string(),
            parent_task_id: None,
            params: serde_json::Value::Null,
            stage: TaskStage::Running,
            target: ObjectRef::new("snapshot", "snap-1"),
            credential: Credential::new("admin", "system", "tok"),
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_request_snapshot_operations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/disks/disk-1/snapshot/snap-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/disks/disk-1/delete-snapshot/snap-1"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let stores = ComputeStores::in_memory();
        let snapshot = snapshot_fixture(&stores, &server.uri()).await;
        let driver = driver(&stores);
        let task = running_task();

        driver.request_create_snapshot(&snapshot, &task).await.unwrap();

        let err = driver.request_delete_snapshot(&snapshot, &task).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert!(err.to_string().contains("request delete snapshot"));
    }

    #[tokio::test]
    async fn test_snapshot_on_missing_disk() {
        let stores = ComputeStores::in_memory();
        let snapshot = Snapshot {
            id: "snap-1".to_string(),
            disk_id: "nope".to_string(),
            storage_id: "nope".to_string(),
        };

        let err = driver(&stores)
            .request_create_snapshot(&snapshot, &running_task())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("snapshot get disk"));
    }

    #[test]
    fn test_rbd_snapshots_are_out_of_chain() {
        let stores = ComputeStores::in_memory();
        assert!(driver(&stores).snapshot_is_out_of_chain(&Disk::default()));
    }
}
