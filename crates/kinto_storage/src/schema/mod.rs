//! Collection schema binding.
//!
//! # Responsibility
//! - Describe how a collection maps onto a relational table (`TableDef`).
//! - Describe how payloads are prepared and validated (`RecordShape`).
//! - Compose both per collection at registration time (`CollectionRegistry`).
//!
//! # Invariants
//! - Table and column names are plain SQL identifiers, checked on register.
//! - Collection columns never shadow `parent_id` or the table's meta fields.
//! - Preparers are attached explicitly; nothing is resolved by name at runtime.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod registry;
pub mod shape;
pub mod table;

pub use registry::{CollectionBinding, CollectionRegistry};
pub use shape::{PreparedFields, RecordShape, ShapeMode};
pub use table::{ColumnDef, ColumnType, MetaFields, TableDef};

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Registration and payload-shaping errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Name is not usable as a SQL identifier.
    InvalidIdentifier(String),
    /// Collection id registered twice.
    DuplicateCollection(String),
    /// Table already owned by another collection or by the shared schema.
    DuplicateTable(String),
    /// Column name collides with `parent_id`, a meta field or another column.
    ReservedColumn {
        table: String,
        column: String,
    },
    /// Payload or query references a field the table does not declare.
    UnknownField(String),
    /// Value does not fit the declared column type.
    TypeMismatch {
        field: String,
        expected: ColumnType,
    },
    /// Required column is absent or null.
    MissingField(String),
    /// A preparer rejected the payload.
    Preparer {
        field: Option<String>,
        reason: String,
    },
}

impl SchemaError {
    /// Field the error is about, when it concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::UnknownField(field) | Self::MissingField(field) => Some(field),
            Self::TypeMismatch { field, .. } => Some(field),
            Self::ReservedColumn { column, .. } => Some(column),
            Self::Preparer { field, .. } => field.as_deref(),
            Self::InvalidIdentifier(_)
            | Self::DuplicateCollection(_)
            | Self::DuplicateTable(_) => None,
        }
    }
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(name) => write!(f, "`{name}` is not a valid SQL identifier"),
            Self::DuplicateCollection(id) => write!(f, "collection already registered: {id}"),
            Self::DuplicateTable(name) => write!(f, "table already in use: {name}"),
            Self::ReservedColumn { table, column } => {
                write!(f, "column `{column}` of table `{table}` is reserved or duplicated")
            }
            Self::UnknownField(field) => write!(f, "unknown field `{field}`"),
            Self::TypeMismatch { field, expected } => {
                write!(f, "field `{field}` must be of type {}", expected.as_str())
            }
            Self::MissingField(field) => write!(f, "field `{field}` is required"),
            Self::Preparer {
                field: Some(field),
                reason,
            } => write!(f, "preparer for `{field}` failed: {reason}"),
            Self::Preparer {
                field: None,
                reason,
            } => write!(f, "global preparer failed: {reason}"),
        }
    }
}

impl Error for SchemaError {}
