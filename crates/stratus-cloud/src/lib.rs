//! Stratus Cloud Core
//!
//! Canonical resource model shared by every Stratus provider driver,
//! together with the machinery drivers lean on: status reconciliation,
//! asynchronous task delegation and joint relations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  control plane                   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 stratus-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait CloudResource / CloudEip / ...     │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌────────────┐ ┌─────────────┐ ┌───────────┐   │
//! │  │ reconcile  │ │ TaskManager │ │  joints   │   │
//! │  └────────────┘ └─────────────┘ └───────────┘   │
//! └───────┬─────────────────┬───────────────┬───────┘
//!         │                 │               │
//! ┌───────▼───────┐ ┌───────▼───────┐ ┌─────▼─────────┐
//! │   aws (EIP)   │ │ azure classic │ │ compute (RBD) │
//! └───────────────┘ └───────────────┘ └───────────────┘
//! ```

pub mod error;
pub mod joint;
pub mod network;
pub mod reconcile;
pub mod resource;
pub mod store;
pub mod task;

// Re-exports
pub use error::{CloudError, ErrorKind, Result, ResultExt};
pub use joint::{DependentUsage, JointManager, JointModel};
pub use network::AddressPrefix;
pub use reconcile::{PollConfig, wait_deleted, wait_status, wait_status_until, wait_until};
pub use resource::{
    CloudEip, CloudNetwork, CloudResource, EipMode, ElasticIp, ResourceBase, ResourceStatus,
};
pub use store::{MemoryStore, ObjectStore, Record};
pub use task::{
    Credential, ObjectRef, Task, TaskDescriptor, TaskHandler, TaskManager, TaskManagerBuilder,
    TaskStage, TaskWorker,
};
