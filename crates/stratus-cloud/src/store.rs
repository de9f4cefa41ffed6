//! Persistence abstraction
//!
//! The control plane persists canonical records through [`ObjectStore`];
//! the production backend lives outside this crate. [`MemoryStore`] backs
//! tests and single-process deployments.

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A persisted record addressable by id
pub trait Record: Clone + Send + Sync + 'static {
    /// Kind name used in error messages (e.g. "storage")
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);
}

/// Predicate used by [`ObjectStore::query`] and [`ObjectStore::count`]
pub type Filter<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

/// Mutation applied by [`ObjectStore::update`]
pub type Mutator<'a, T> = Box<dyn FnOnce(&mut T) + Send + 'a>;

/// Abstract object store
#[async_trait]
pub trait ObjectStore<T: Record>: Send + Sync {
    /// All records matching `filter`
    async fn query(&self, filter: Filter<'_, T>) -> Result<Vec<T>>;

    /// Fails with `NotFound` when absent
    async fn fetch_by_id(&self, id: &str) -> Result<T>;

    /// Persist a new record, assigning an id when empty
    async fn insert(&self, record: T) -> Result<T>;

    /// Snapshot the record, apply `mutator`, replace it; returns the new value
    async fn update(&self, id: &str, mutator: Mutator<'_, T>) -> Result<T>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn count(&self, filter: Filter<'_, T>) -> Result<usize>;
}

/// Generate a new record id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// In-memory [`ObjectStore`]
pub struct MemoryStore<T: Record> {
    records: RwLock<HashMap<String, T>>,
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Build a store pre-populated with `records`
    pub fn with_records(records: impl IntoIterator<Item = T>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.id().to_string(), r))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> ObjectStore<T> for MemoryStore<T> {
    async fn query(&self, filter: Filter<'_, T>) -> Result<Vec<T>> {
        let records = self.records.read().await;
        Ok(records.values().filter(|&r| filter(r)).cloned().collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<T> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("{} {}", T::KIND, id)))
    }

    async fn insert(&self, mut record: T) -> Result<T> {
        if record.id().is_empty() {
            record.set_id(new_id());
        }

        let mut records = self.records.write().await;
        if records.contains_key(record.id()) {
            return Err(CloudError::DuplicateResource(format!(
                "{} {}",
                T::KIND,
                record.id()
            )));
        }

        tracing::debug!("Inserted {} {}", T::KIND, record.id());
        records.insert(record.id().to_string(), record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, mutator: Mutator<'_, T>) -> Result<T> {
        let mut records = self.records.write().await;
        let current = records
            .get(id)
            .ok_or_else(|| CloudError::NotFound(format!("{} {}", T::KIND, id)))?;

        let mut next = current.clone();
        mutator(&mut next);
        if next.id() != id {
            return Err(CloudError::InternalError(format!(
                "update of {} {} changed its id",
                T::KIND,
                id
            )));
        }

        records.insert(id.to_string(), next.clone());
        Ok(next)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| tracing::debug!("Deleted {} {}", T::KIND, id))
            .ok_or_else(|| CloudError::NotFound(format!("{} {}", T::KIND, id)))
    }

    async fn count(&self, filter: Filter<'_, T>) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records.values().filter(|&r| filter(r)).count())
    }
}
