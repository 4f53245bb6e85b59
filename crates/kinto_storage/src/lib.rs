//! SQLite storage backend for collection records.
//! Maps collections onto tables and owns record lifecycle, filtering,
//! timestamps and tombstones.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod schema;
pub mod service;
pub mod storage;

pub use config::{ConfigError, StorageSettings};
pub use logging::{init_logging, logging_status, LogConfig, LogLevel, LoggingError};
pub use model::query::{
    Comparison, Filter, ListQuery, ListResult, PaginationRule, Sort, SortDirection,
};
pub use model::timestamp::Timestamp;
pub use model::tombstone::Tombstone;
pub use model::Object;
pub use schema::{
    CollectionBinding, CollectionRegistry, ColumnDef, ColumnType, MetaFields, RecordShape,
    SchemaError, TableDef,
};
pub use service::collection_service::CollectionService;
pub use storage::{
    IdGenerator, IntegerId, IntegrityClassifier, RecordStorage, Storage, StorageError,
    StorageResult, StorageScope, UuidId,
};

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
