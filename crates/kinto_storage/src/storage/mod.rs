//! Record storage contracts and the SQLite engine.
//!
//! # Responsibility
//! - Define the record lifecycle contract (`RecordStorage`).
//! - Keep ledger, tombstone, translation and classification details behind
//!   that contract.
//!
//! # Invariants
//! - Every operation is scoped by `(collection_id, parent_id)`; records never
//!   leak across namespaces.
//! - Deleted records are excluded from reads unless explicitly requested.

pub mod engine;
pub mod error;
pub mod id_generator;
pub mod integrity;
pub mod ledger;
pub mod query;
pub mod tombstone;

use crate::model::query::{Filter, ListQuery, ListResult};
use crate::model::timestamp::Timestamp;
use crate::model::Object;

pub use engine::{Storage, StorageScope};
pub use error::{StorageError, StorageResult};
pub use id_generator::{IdGenerator, IntegerId, UuidId};
pub use integrity::{ClassifierKey, IntegrityClassifier, RawIntegrityError};

/// Record lifecycle operations of one storage backend.
pub trait RecordStorage {
    /// Inserts a new live record. Absent ids are generated.
    fn create(&self, collection_id: &str, parent_id: &str, record: Object) -> StorageResult<Object>;

    /// Returns a live record or `RecordNotFound`.
    fn get(&self, collection_id: &str, parent_id: &str, id: &str) -> StorageResult<Object>;

    /// Merges `record` into the live record, creating it when absent.
    fn update(
        &self,
        collection_id: &str,
        parent_id: &str,
        id: &str,
        record: Object,
    ) -> StorageResult<Object>;

    /// Soft-deletes a live record and returns its minimal representation.
    fn delete(
        &self,
        collection_id: &str,
        parent_id: &str,
        id: &str,
        with_deleted: bool,
    ) -> StorageResult<Object>;

    fn delete_all(
        &self,
        collection_id: &str,
        parent_id: &str,
        filters: &[Filter],
        with_deleted: bool,
    ) -> StorageResult<Vec<Object>>;

    /// Removes tombstones older than `before` (all when `None`).
    fn purge_deleted(
        &self,
        collection_id: &str,
        parent_id: &str,
        before: Option<Timestamp>,
    ) -> StorageResult<usize>;

    fn get_all(
        &self,
        collection_id: &str,
        parent_id: &str,
        query: &ListQuery,
    ) -> StorageResult<ListResult>;

    /// Highest modification timestamp of the namespace, seeded on first read.
    fn collection_timestamp(&self, collection_id: &str, parent_id: &str) -> StorageResult<Timestamp>;
}

/// Lets services borrow a shared engine.
impl<S: RecordStorage> RecordStorage for &S {
    fn create(&self, collection_id: &str, parent_id: &str, record: Object) -> StorageResult<Object> {
        (**self).create(collection_id, parent_id, record)
    }

    fn get(&self, collection_id: &str, parent_id: &str, id: &str) -> StorageResult<Object> {
        (**self).get(collection_id, parent_id, id)
    }

    fn update(
        &self,
        collection_id: &str,
        parent_id: &str,
        id: &str,
        record: Object,
    ) -> StorageResult<Object> {
        (**self).update(collection_id, parent_id, id, record)
    }

    fn delete(
        &self,
        collection_id: &str,
        parent_id: &str,
        id: &str,
        with_deleted: bool,
    ) -> StorageResult<Object> {
        (**self).delete(collection_id, parent_id, id, with_deleted)
    }

    fn delete_all(
        &self,
        collection_id: &str,
        parent_id: &str,
        filters: &[Filter],
        with_deleted: bool,
    ) -> StorageResult<Vec<Object>> {
        (**self).delete_all(collection_id, parent_id, filters, with_deleted)
    }

    fn purge_deleted(
        &self,
        collection_id: &str,
        parent_id: &str,
        before: Option<Timestamp>,
    ) -> StorageResult<usize> {
        (**self).purge_deleted(collection_id, parent_id, before)
    }

    fn get_all(
        &self,
        collection_id: &str,
        parent_id: &str,
        query: &ListQuery,
    ) -> StorageResult<ListResult> {
        (**self).get_all(collection_id, parent_id, query)
    }

    fn collection_timestamp(&self, collection_id: &str, parent_id: &str) -> StorageResult<Timestamp> {
        (**self).collection_timestamp(collection_id, parent_id)
    }
}
