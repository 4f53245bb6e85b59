//! Collection use-case service.
//!
//! # Responsibility
//! - Provide namespace-bound CRUD and listing entry points.
//! - Provide the cascade clear used when a parent object goes away.
//!
//! # Invariants
//! - Service APIs never bypass the storage contract.
//! - Every call targets the same `(collection_id, parent_id)`.

use crate::model::query::{Filter, ListQuery, ListResult};
use crate::model::timestamp::Timestamp;
use crate::model::Object;
use crate::storage::{RecordStorage, StorageResult};

/// Records of one collection under one parent.
pub struct CollectionService<S: RecordStorage> {
    storage: S,
    collection_id: String,
    parent_id: String,
}

impl<S: RecordStorage> CollectionService<S> {
    pub fn new(storage: S, collection_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            storage,
            collection_id: collection_id.into(),
            parent_id: parent_id.into(),
        }
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn create(&self, record: Object) -> StorageResult<Object> {
        self.storage
            .create(&self.collection_id, &self.parent_id, record)
    }

    pub fn get(&self, id: &str) -> StorageResult<Object> {
        self.storage.get(&self.collection_id, &self.parent_id, id)
    }

    /// Creates the record when `id` is unknown.
    pub fn update(&self, id: &str, record: Object) -> StorageResult<Object> {
        self.storage
            .update(&self.collection_id, &self.parent_id, id, record)
    }

    /// Deletes and leaves a tombstone for sync clients.
    pub fn delete(&self, id: &str) -> StorageResult<Object> {
        self.storage
            .delete(&self.collection_id, &self.parent_id, id, true)
    }

    pub fn list(&self, query: &ListQuery) -> StorageResult<ListResult> {
        self.storage
            .get_all(&self.collection_id, &self.parent_id, query)
    }

    pub fn delete_matching(&self, filters: &[Filter]) -> StorageResult<Vec<Object>> {
        self.storage
            .delete_all(&self.collection_id, &self.parent_id, filters, true)
    }

    pub fn timestamp(&self) -> StorageResult<Timestamp> {
        self.storage
            .collection_timestamp(&self.collection_id, &self.parent_id)
    }

    /// Removes every record of the namespace without tombstones, then purges
    /// the tombstones left by earlier deletions.
    ///
    /// Returns the number of records deleted.
    pub fn clear(&self) -> StorageResult<usize> {
        let deleted = self
            .storage
            .delete_all(&self.collection_id, &self.parent_id, &[], false)?;
        let purged = self
            .storage
            .purge_deleted(&self.collection_id, &self.parent_id, None)?;
        log::info!(
            "event=namespace_clear module=service status=ok collection={} records={} tombstones={}",
            self.collection_id,
            deleted.len(),
            purged
        );
        Ok(deleted.len())
    }
}
