//! Joint (many-to-many) relations
//!
//! A joint row links a master record to a slave record and carries the
//! relation's own attributes. Rows are soft-deleted on detach and may only be
//! removed once nothing depends on them any more.

use crate::error::{CloudError, Result};
use crate::store::{ObjectStore, Record};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A row of a joint relation
pub trait JointModel: Record {
    fn master_id(&self) -> &str;

    fn slave_id(&self) -> &str;

    fn is_deleted(&self) -> bool;

    fn mark_deleted(&mut self, at: DateTime<Utc>);
}

/// Counts records that still rely on a joint row
#[async_trait]
pub trait DependentUsage<T: JointModel>: Send + Sync {
    async fn count(&self, joint: &T) -> Result<usize>;
}

/// Manages rows of one joint relation
pub struct JointManager<T: JointModel> {
    store: Arc<dyn ObjectStore<T>>,
    master_field_name: &'static str,
    slave_field_name: &'static str,
}

impl<T: JointModel> JointManager<T> {
    pub fn new(
        store: Arc<dyn ObjectStore<T>>,
        master_field_name: &'static str,
        slave_field_name: &'static str,
    ) -> Self {
        Self {
            store,
            master_field_name,
            slave_field_name,
        }
    }

    pub fn master_field_name(&self) -> &'static str {
        self.master_field_name
    }

    pub fn slave_field_name(&self) -> &'static str {
        self.slave_field_name
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore<T>> {
        &self.store
    }

    /// Persist a new row linking its master and slave
    pub async fn attach(&self, joint: T) -> Result<T> {
        if joint.master_id().is_empty() {
            return Err(CloudError::MissingParameter(self.master_field_name.to_string()));
        }
        if joint.slave_id().is_empty() {
            return Err(CloudError::MissingParameter(self.slave_field_name.to_string()));
        }

        let joint = self.store.insert(joint).await?;
        tracing::debug!(
            "Attached {} {}={} {}={}",
            T::KIND,
            self.master_field_name,
            joint.master_id(),
            self.slave_field_name,
            joint.slave_id()
        );
        Ok(joint)
    }

    /// First live row linking `master_id` and `slave_id`
    pub async fn fetch_by_master_and_slave(&self, master_id: &str, slave_id: &str) -> Result<T> {
        self.store
            .query(&|row: &T| !row.is_deleted() && row.master_id() == master_id && row.slave_id() == slave_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                CloudError::NotFound(format!(
                    "{} {}={} {}={}",
                    T::KIND,
                    self.master_field_name,
                    master_id,
                    self.slave_field_name,
                    slave_id
                ))
            })
    }

    /// Live rows of `master_id`
    pub async fn filter_by_master(&self, master_id: &str) -> Result<Vec<T>> {
        self.store
            .query(&|row: &T| !row.is_deleted() && row.master_id() == master_id)
            .await
    }

    /// Live rows of `slave_id`
    pub async fn filter_by_slave(&self, slave_id: &str) -> Result<Vec<T>> {
        self.store
            .query(&|row: &T| !row.is_deleted() && row.slave_id() == slave_id)
            .await
    }

    /// Fails with `NotEmpty` while dependents remain, then with `NotFound`
    /// when the row is already deleted
    pub async fn validate_delete_condition(&self, joint: &T, usage: &dyn DependentUsage<T>) -> Result<()> {
        let dependents = usage.count(joint).await?;
        if dependents > 0 {
            return Err(CloudError::NotEmpty(format!(
                "{} {} is used by {} dependents",
                T::KIND,
                joint.id(),
                dependents
            )));
        }

        if joint.is_deleted() {
            return Err(CloudError::NotFound(format!("{} {} already deleted", T::KIND, joint.id())));
        }
        Ok(())
    }

    /// Validate, then remove the row
    pub async fn delete(&self, joint: &T, usage: &dyn DependentUsage<T>) -> Result<()> {
        self.validate_delete_condition(joint, usage).await?;
        self.store.delete(joint.id()).await?;
        tracing::info!("Deleted {} {}", T::KIND, joint.id());
        Ok(())
    }

    /// Soft-delete only the row; master and slave records are untouched
    pub async fn detach(&self, joint: &T) -> Result<T> {
        let now = Utc::now();
        let mut was_deleted = false;
        let row = self
            .store
            .update(
                joint.id(),
                Box::new(|row: &mut T| {
                    was_deleted = row.is_deleted();
                    if !was_deleted {
                        row.mark_deleted(now);
                    }
                }),
            )
            .await?;

        if was_deleted {
            return Err(CloudError::NotFound(format!("{} {} already deleted", T::KIND, joint.id())));
        }
        tracing::debug!("Detached {} {}", T::KIND, row.id());
        Ok(row)
    }
}
