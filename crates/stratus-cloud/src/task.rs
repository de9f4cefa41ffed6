//! Asynchronous task delegation
//!
//! Long-running work is described by a persisted [`Task`] and executed by a
//! [`TaskWorker`] on its own tokio task. Scheduling only enqueues a
//! descriptor; handler failures are recorded on the task record and never
//! reach the caller that scheduled it.

use crate::error::{CloudError, Result};
use crate::store::{ObjectStore, Record};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Lifecycle stage of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStage {
    Created,
    Scheduled,
    Running,
    Succeeded,
    Failed,
}

impl TaskStage {
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskStage::Succeeded | TaskStage::Failed)
    }
}

impl std::fmt::Display for TaskStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStage::Created => write!(f, "created"),
            TaskStage::Scheduled => write!(f, "scheduled"),
            TaskStage::Running => write!(f, "running"),
            TaskStage::Succeeded => write!(f, "succeeded"),
            TaskStage::Failed => write!(f, "failed"),
        }
    }
}

/// Reference to the object a task operates on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Object kind (e.g. "storage")
    pub kind: String,
    pub id: String,
}

impl ObjectRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Authorization context of the original requester
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: String,
    pub project_id: String,
    pub token: String,
}

impl Credential {
    pub fn new(
        user_id: impl Into<String>,
        project_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: project_id.into(),
            token: token.into(),
        }
    }
}

/// Persisted unit of asynchronous work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,

    pub task_type: String,

    /// Non-owning link to the task that spawned this one
    pub parent_task_id: Option<String>,

    pub params: serde_json::Value,

    pub stage: TaskStage,

    pub target: ObjectRef,

    pub credential: Credential,

    /// Error message when the handler failed
    pub error: Option<String>,

    /// Handler output when it succeeded
    pub result: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Headers attributing remote calls to the original requester
    pub fn request_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(2);
        if !self.credential.token.is_empty() {
            headers.push(("Authorization", format!("Bearer {}", self.credential.token)));
        }
        headers.push(("X-Task-Id", self.id.clone()));
        headers
    }

    fn set_stage(&mut self, stage: TaskStage) {
        self.stage = stage;
        self.updated_at = Utc::now();
    }
}

impl Record for Task {
    const KIND: &'static str = "task";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Logic executed for one task type
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, task: &Task) -> Result<serde_json::Value>;
}

/// Queue entry handed from [`TaskManager::schedule_run`] to the worker
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub task_id: String,
    pub task_type: String,
}

type HandlerMap = Arc<HashMap<String, Arc<dyn TaskHandler>>>;

/// Registers task handlers before the manager is built
pub struct TaskManagerBuilder {
    store: Arc<dyn ObjectStore<Task>>,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskManagerBuilder {
    pub fn register(mut self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        let task_type = task_type.into();
        if self.handlers.insert(task_type.clone(), handler).is_some() {
            tracing::warn!("Task handler {} registered twice, keeping the last one", task_type);
        }
        self
    }

    pub fn build(self) -> (TaskManager, TaskWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handlers: HandlerMap = Arc::new(self.handlers);

        let manager = TaskManager {
            store: self.store.clone(),
            handlers: handlers.clone(),
            queue: tx,
        };
        let worker = TaskWorker {
            store: self.store,
            handlers,
            queue: rx,
        };
        (manager, worker)
    }
}

/// Creates and schedules tasks
#[derive(Clone)]
pub struct TaskManager {
    store: Arc<dyn ObjectStore<Task>>,
    handlers: HandlerMap,
    queue: mpsc::UnboundedSender<TaskDescriptor>,
}

impl TaskManager {
    pub fn builder(store: Arc<dyn ObjectStore<Task>>) -> TaskManagerBuilder {
        TaskManagerBuilder {
            store,
            handlers: HashMap::new(),
        }
    }

    pub fn is_registered(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// Persist a new task in the `Created` stage
    pub async fn new_task(
        &self,
        task_type: &str,
        target: ObjectRef,
        credential: Credential,
        params: serde_json::Value,
        parent_task_id: Option<&str>,
    ) -> Result<Task> {
        if !self.is_registered(task_type) {
            return Err(CloudError::NotFound(format!("task type {task_type}")));
        }

        let now = Utc::now();
        let task = Task {
            id: String::new(),
            task_type: task_type.to_string(),
            parent_task_id: parent_task_id.map(str::to_string),
            params,
            stage: TaskStage::Created,
            target,
            credential,
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        };

        let task = self.store.insert(task).await?;
        tracing::debug!(
            "Created task {} ({}) for {} {}",
            task.id,
            task.task_type,
            task.target.kind,
            task.target.id
        );
        Ok(task)
    }

    /// Create a child of `parent` carrying its credential and params
    pub async fn new_subtask(&self, parent: &Task, task_type: &str, target: ObjectRef) -> Result<Task> {
        self.new_task(
            task_type,
            target,
            parent.credential.clone(),
            parent.params.clone(),
            Some(&parent.id),
        )
        .await
    }

    /// Move a `Created` task to `Scheduled` and enqueue it for the worker
    pub async fn schedule_run(&self, task_id: &str) -> Result<()> {
        let mut previous = None;
        let task = self
            .store
            .update(
                task_id,
                Box::new(|task: &mut Task| {
                    previous = Some(task.stage);
                    if task.stage == TaskStage::Created {
                        task.set_stage(TaskStage::Scheduled);
                    }
                }),
            )
            .await?;

        if previous != Some(TaskStage::Created) {
            return Err(CloudError::Conflict(format!(
                "task {} is {}, only created tasks can be scheduled",
                task_id, task.stage
            )));
        }

        let descriptor = TaskDescriptor {
            task_id: task.id.clone(),
            task_type: task.task_type.clone(),
        };
        if self.queue.send(descriptor).is_err() {
            tracing::error!("Task worker is gone, task {} cannot run", task.id);
            record_outcome(
                self.store.as_ref(),
                &task.id,
                Err(CloudError::InternalError("task worker is not running".to_string())),
            )
            .await;
            return Ok(());
        }

        tracing::info!("Scheduled task {} ({})", task.id, task.task_type);
        Ok(())
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.store.fetch_by_id(task_id).await
    }

    /// Subtasks spawned by `parent_id`
    pub async fn children(&self, parent_id: &str) -> Result<Vec<Task>> {
        self.store
            .query(&|task: &Task| task.parent_task_id.as_deref() == Some(parent_id))
            .await
    }
}

/// Consumes scheduled tasks and runs their handlers
pub struct TaskWorker {
    store: Arc<dyn ObjectStore<Task>>,
    handlers: HandlerMap,
    queue: mpsc::UnboundedReceiver<TaskDescriptor>,
}

impl TaskWorker {
    /// Run until every [`TaskManager`] clone is dropped; each task executes
    /// on its own tokio task
    pub async fn run(mut self) {
        tracing::info!("Task worker started");
        while let Some(descriptor) = self.queue.recv().await {
            let store = self.store.clone();
            let handler = self.handlers.get(&descriptor.task_type).cloned();
            tokio::spawn(async move {
                execute(store, handler, descriptor).await;
            });
        }
        tracing::info!("Task worker stopped");
    }

    /// Execute the next queued task inline; returns false once the queue is
    /// closed and drained
    pub async fn run_next(&mut self) -> bool {
        match self.queue.recv().await {
            Some(descriptor) => {
                let handler = self.handlers.get(&descriptor.task_type).cloned();
                execute(self.store.clone(), handler, descriptor).await;
                true
            }
            None => false,
        }
    }
}

async fn execute(
    store: Arc<dyn ObjectStore<Task>>,
    handler: Option<Arc<dyn TaskHandler>>,
    descriptor: TaskDescriptor,
) {
    let mut claimed = false;
    let task = match store
        .update(
            &descriptor.task_id,
            Box::new(|task: &mut Task| {
                if task.stage == TaskStage::Scheduled {
                    task.set_stage(TaskStage::Running);
                    claimed = true;
                }
            }),
        )
        .await
    {
        Ok(task) => task,
        Err(e) => {
            tracing::error!("Cannot claim task {}: {}", descriptor.task_id, e);
            return;
        }
    };

    if !claimed {
        tracing::warn!("Task {} is {}, skipping", task.id, task.stage);
        return;
    }

    let outcome = match handler {
        Some(handler) => {
            tracing::debug!("Running task {} ({})", task.id, task.task_type);
            handler.run(&task).await
        }
        None => Err(CloudError::NotFound(format!("task type {}", task.task_type))),
    };

    record_outcome(store.as_ref(), &task.id, outcome).await;
}

async fn record_outcome(
    store: &dyn ObjectStore<Task>,
    task_id: &str,
    outcome: Result<serde_json::Value>,
) {
    let (stage, result, error) = match outcome {
        Ok(value) => (TaskStage::Succeeded, Some(value), None),
        Err(e) => {
            tracing::warn!("Task {} failed: {}", task_id, e);
            (TaskStage::Failed, None, Some(e.to_string()))
        }
    };

    let update = store
        .update(
            task_id,
            Box::new(move |task: &mut Task| {
                task.set_stage(stage);
                task.result = result;
                task.error = error;
            }),
        )
        .await;

    match update {
        Ok(task) => tracing::info!("Task {} {}", task.id, task.stage),
        Err(e) => tracing::error!("Cannot record outcome of task {}: {}", task_id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TaskHandler for CountingHandler {
        async fn run(&self, task: &Task) -> Result<serde_json::Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CloudError::InternalError("host agent unreachable".to_string()));
            }
            Ok(serde_json::json!({ "target": task.target.id }))
        }
    }

    fn handler(fail: bool) -> Arc<CountingHandler> {
        Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn credential() -> Credential {
        Credential::new("user-1", "project-1", "token-abc")
    }

    #[tokio::test]
    async fn test_unregistered_type() {
        let (manager, _worker) = TaskManager::builder(Arc::new(MemoryStore::new())).build();

        let err = manager
            .new_task(
                "Unknown",
                ObjectRef::new("storage", "s1"),
                credential(),
                serde_json::json!({}),
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_schedule_and_run_once() {
        let h = handler(false);
        let (manager, mut worker) = TaskManager::builder(Arc::new(MemoryStore::new()))
            .register("UpdateTask", h.clone())
            .build();

        let task = manager
            .new_task(
                "UpdateTask",
                ObjectRef::new("storage", "s1"),
                credential(),
                serde_json::json!({ "key": "v" }),
                None,
            )
            .await
            .unwrap();
        assert_eq!(task.stage, TaskStage::Created);

        manager.schedule_run(&task.id).await.unwrap();
        // scheduling never runs handler logic
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            manager.get_task(&task.id).await.unwrap().stage,
            TaskStage::Scheduled
        );

        assert!(worker.run_next().await);
        let done = manager.get_task(&task.id).await.unwrap();
        assert_eq!(done.stage, TaskStage::Succeeded);
        assert_eq!(done.result, Some(serde_json::json!({ "target": "s1" })));
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);

        let err = manager.schedule_run(&task.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_failure_is_recorded() {
        let h = handler(true);
        let (manager, mut worker) = TaskManager::builder(Arc::new(MemoryStore::new()))
            .register("UpdateTask", h.clone())
            .build();

        let task = manager
            .new_task(
                "UpdateTask",
                ObjectRef::new("storage", "s1"),
                credential(),
                serde_json::Value::Null,
                None,
            )
            .await
            .unwrap();
        manager.schedule_run(&task.id).await.unwrap();
        worker.run_next().await;

        let failed = manager.get_task(&task.id).await.unwrap();
        assert_eq!(failed.stage, TaskStage::Failed);
        assert!(failed.error.unwrap().contains("host agent unreachable"));
    }

    #[tokio::test]
    async fn test_subtask_inherits_credential() {
        let (manager, _worker) = TaskManager::builder(Arc::new(MemoryStore::new()))
            .register("ParentTask", handler(false))
            .register("ChildTask", handler(false))
            .build();

        let parent = manager
            .new_task(
                "ParentTask",
                ObjectRef::new("storage", "s1"),
                credential(),
                serde_json::json!({ "rbd_key": "k" }),
                None,
            )
            .await
            .unwrap();
        let child = manager
            .new_subtask(&parent, "ChildTask", ObjectRef::new("storage", "s1"))
            .await
            .unwrap();

        assert_eq!(child.parent_task_id.as_deref(), Some(parent.id.as_str()));
        assert_eq!(child.credential, parent.credential);
        assert_eq!(child.params, parent.params);

        let children = manager.children(&parent.id).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child.id);
    }

    #[tokio::test]
    async fn test_worker_gone_marks_failed() {
        let (manager, worker) = TaskManager::builder(Arc::new(MemoryStore::new()))
            .register("UpdateTask", handler(false))
            .build();
        drop(worker);

        let task = manager
            .new_task(
                "UpdateTask",
                ObjectRef::new("storage", "s1"),
                credential(),
                serde_json::Value::Null,
                None,
            )
            .await
            .unwrap();
        manager.schedule_run(&task.id).await.unwrap();

        let task = manager.get_task(&task.id).await.unwrap();
        assert_eq!(task.stage, TaskStage::Failed);
    }

    #[tokio::test]
    async fn test_spawned_worker_runs_tasks() {
        let h = handler(false);
        let (manager, worker) = TaskManager::builder(Arc::new(MemoryStore::new()))
            .register("UpdateTask", h.clone())
            .build();
        let running = tokio::spawn(worker.run());

        let task = manager
            .new_task(
                "UpdateTask",
                ObjectRef::new("storage", "s1"),
                credential(),
                serde_json::Value::Null,
                None,
            )
            .await
            .unwrap();
        manager.schedule_run(&task.id).await.unwrap();

        for _ in 0..100 {
            if manager.get_task(&task.id).await.unwrap().stage.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(
            manager.get_task(&task.id).await.unwrap().stage,
            TaskStage::Succeeded
        );

        drop(manager);
        running.await.unwrap();
    }

    #[test]
    fn test_request_headers() {
        let now = Utc::now();
        let task = Task {
            id: "t1".to_string(),
            task_type: "UpdateTask".to_string(),
            parent_task_id: None,
            params: serde_json::Value::Null,
            stage: TaskStage::Created,
            target: ObjectRef::new("storage", "s1"),
            credential: credential(),
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        };

        let headers = task.request_headers();
        assert_eq!(
            headers,
            vec![
                ("Authorization", "Bearer token-abc".to_string()),
                ("X-Task-Id", "t1".to_string()),
            ]
        );
    }
}
