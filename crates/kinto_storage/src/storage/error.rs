//! Typed storage failures.
//!
//! Callers branch on the variant: `RecordNotFound` and `Unicity` are
//! recoverable, `Backend` is fatal to the current operation.

use crate::db::DbError;
use crate::model::query::QueryModelError;
use crate::model::Object;
use crate::schema::SchemaError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug)]
pub enum StorageError {
    /// Target record does not exist or is already deleted.
    RecordNotFound { collection_id: String, id: String },
    /// `record` violates the uniqueness of `field` within its namespace.
    Unicity { field: String, record: Object },
    /// Any other persistence failure, including missing collection bindings.
    Backend {
        message: String,
        source: Option<DbError>,
    },
    /// Payload rejected by the collection's record shape.
    InvalidRecord {
        field: Option<String>,
        reason: String,
    },
    /// Malformed list query: unknown field, operator/value mismatch.
    InvalidQuery(String),
}

impl StorageError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found(collection_id: &str, id: &str) -> Self {
        Self::RecordNotFound {
            collection_id: collection_id.to_string(),
            id: id.to_string(),
        }
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RecordNotFound { collection_id, id } => {
                write!(f, "record not found: {collection_id}/{id}")
            }
            Self::Unicity { field, .. } => write!(f, "unicity constraint violated on `{field}`"),
            Self::Backend {
                message,
                source: Some(source),
            } => write!(f, "{message}: {source}"),
            Self::Backend {
                message,
                source: None,
            } => write!(f, "{message}"),
            Self::InvalidRecord {
                field: Some(field),
                reason,
            } => write!(f, "invalid record field `{field}`: {reason}"),
            Self::InvalidRecord {
                field: None,
                reason,
            } => write!(f, "invalid record: {reason}"),
            Self::InvalidQuery(message) => write!(f, "invalid query: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backend {
                source: Some(source),
                ..
            } => Some(source),
            _ => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Backend {
            message: "storage backend failure".to_string(),
            source: Some(value),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}

impl From<SchemaError> for StorageError {
    fn from(value: SchemaError) -> Self {
        Self::InvalidRecord {
            field: value.field().map(str::to_string),
            reason: value.to_string(),
        }
    }
}

impl From<QueryModelError> for StorageError {
    fn from(value: QueryModelError) -> Self {
        Self::InvalidQuery(value.to_string())
    }
}
