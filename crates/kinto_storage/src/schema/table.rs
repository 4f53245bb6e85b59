//! Persistence mapping: how one collection is laid out in a table.
//!
//! # Responsibility
//! - Declare collection columns and their storage classes.
//! - Render the DDL for the collection table.
//! - Convert JSON values to and from SQLite values per column type.
//!
//! # Invariants
//! - Every record table has `parent_id`, the id column, the modification
//!   column and the deletion flag, keyed by `(parent_id, id)`.
//! - Unique columns are unique per `parent_id`, never globally.

use super::{SchemaError, SchemaResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column holding the owning namespace. Never exposed in payloads.
pub const PARENT_ID_COLUMN: &str = "parent_id";

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid identifier regex"));

/// Returns whether `name` can be used as a table or column name.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Quotes an identifier that already passed `is_valid_identifier`.
pub(crate) fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

/// Storage class of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    /// Stored as `0`/`1`.
    Boolean,
    /// Arbitrary JSON, stored as serialized text.
    Json,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Json => "json",
        }
    }

    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Real => "REAL",
            Self::Text | Self::Json => "TEXT",
        }
    }

    /// Converts a JSON value into the bound SQL value.
    ///
    /// Returns `None` when the value does not fit this column type.
    pub fn to_sql(self, value: &Value) -> Option<SqlValue> {
        if value.is_null() {
            return Some(SqlValue::Null);
        }
        match self {
            Self::Integer => value.as_i64().map(SqlValue::Integer),
            Self::Real => value.as_f64().map(SqlValue::Real),
            Self::Text => value.as_str().map(|text| SqlValue::Text(text.to_string())),
            Self::Boolean => value
                .as_bool()
                .map(|flag| SqlValue::Integer(i64::from(flag))),
            Self::Json => serde_json::to_string(value).ok().map(SqlValue::Text),
        }
    }

    /// Converts a stored SQL value back into JSON.
    pub fn from_sql(self, value: ValueRef<'_>) -> Result<Value, String> {
        match (self, value) {
            (_, ValueRef::Null) => Ok(Value::Null),
            (Self::Integer, ValueRef::Integer(number)) => Ok(Value::from(number)),
            (Self::Real, ValueRef::Real(number)) => serde_json::Number::from_f64(number)
                .map(Value::Number)
                .ok_or_else(|| format!("non-finite real `{number}`")),
            (Self::Real, ValueRef::Integer(number)) => Ok(Value::from(number as f64)),
            (Self::Boolean, ValueRef::Integer(0)) => Ok(Value::Bool(false)),
            (Self::Boolean, ValueRef::Integer(1)) => Ok(Value::Bool(true)),
            (Self::Text, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
                .map(|text| Value::String(text.to_string()))
                .map_err(|err| err.to_string()),
            (Self::Json, ValueRef::Text(bytes)) => {
                serde_json::from_slice(bytes).map_err(|err| err.to_string())
            }
            (kind, other) => Err(format!(
                "{:?} value stored in {} column",
                other.data_type(),
                kind.as_str()
            )),
        }
    }
}

/// One collection-specific column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnType,
    pub nullable: bool,
    pub unique: bool,
}

impl ColumnDef {
    /// Nullable, non-unique column.
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            unique: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Unique within one `parent_id`.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Names of the columns holding the identifier, the modification timestamp
/// and the deletion flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFields {
    pub id: String,
    pub last_modified: String,
    pub deleted: String,
}

impl Default for MetaFields {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            last_modified: "last_modified".to_string(),
            deleted: "deleted".to_string(),
        }
    }
}

/// Table layout of one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    name: String,
    columns: Vec<ColumnDef>,
    meta: MetaFields,
    track_timestamps: bool,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            meta: MetaFields::default(),
            track_timestamps: true,
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn meta_fields(mut self, meta: MetaFields) -> Self {
        self.meta = meta;
        self
    }

    /// Opts the collection out of (or back into) the timestamp ledger.
    pub fn track_timestamps(mut self, enabled: bool) -> Self {
        self.track_timestamps = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn meta(&self) -> &MetaFields {
        &self.meta
    }

    pub fn is_timestamp_trackable(&self) -> bool {
        self.track_timestamps
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Resolves a queryable field to its column type.
    ///
    /// `parent_id` is not queryable; the namespace is always applied by the
    /// engine itself.
    pub fn field_type(&self, field: &str, id_type: ColumnType) -> Option<ColumnType> {
        if field == self.meta.id {
            Some(id_type)
        } else if field == self.meta.last_modified {
            Some(ColumnType::Integer)
        } else if field == self.meta.deleted {
            Some(ColumnType::Boolean)
        } else {
            self.find_column(field).map(|column| column.kind)
        }
    }

    /// Checks identifiers and name collisions.
    pub fn validate(&self) -> SchemaResult<()> {
        let meta_names = [
            self.meta.id.as_str(),
            self.meta.last_modified.as_str(),
            self.meta.deleted.as_str(),
        ];
        for name in std::iter::once(self.name.as_str()).chain(meta_names) {
            if !is_valid_identifier(name) {
                return Err(SchemaError::InvalidIdentifier(name.to_string()));
            }
        }

        let mut seen: Vec<&str> = vec![PARENT_ID_COLUMN];
        for name in meta_names.into_iter().chain(self.columns.iter().map(|c| c.name.as_str())) {
            if !is_valid_identifier(name) {
                return Err(SchemaError::InvalidIdentifier(name.to_string()));
            }
            if seen.contains(&name) {
                return Err(SchemaError::ReservedColumn {
                    table: self.name.clone(),
                    column: name.to_string(),
                });
            }
            seen.push(name);
        }
        Ok(())
    }

    /// DDL creating the table and its namespace index.
    pub fn create_statements(&self, id_type: ColumnType) -> Vec<String> {
        let table = quote(&self.name);
        let mut definitions = vec![
            format!("{} {} NOT NULL", quote(&self.meta.id), id_type.sql_type()),
            format!("{} TEXT NOT NULL", quote(PARENT_ID_COLUMN)),
            format!("{} INTEGER NOT NULL", quote(&self.meta.last_modified)),
            format!("{} INTEGER NOT NULL DEFAULT 0", quote(&self.meta.deleted)),
        ];
        for column in &self.columns {
            let null_clause = if column.nullable { "" } else { " NOT NULL" };
            definitions.push(format!(
                "{} {}{null_clause}",
                quote(&column.name),
                column.kind.sql_type()
            ));
        }
        definitions.push(format!(
            "PRIMARY KEY ({}, {})",
            quote(PARENT_ID_COLUMN),
            quote(&self.meta.id)
        ));
        for column in self.columns.iter().filter(|column| column.unique) {
            definitions.push(format!(
                "UNIQUE ({}, {})",
                quote(PARENT_ID_COLUMN),
                quote(&column.name)
            ));
        }

        vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {table} (\n    {}\n);",
                definitions.join(",\n    ")
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {table} ({}, {});",
                quote(&format!("idx_{}_namespace_modified", self.name)),
                quote(PARENT_ID_COLUMN),
                quote(&self.meta.last_modified)
            ),
        ]
    }

    pub fn drop_statement(&self) -> String {
        format!("DROP TABLE IF EXISTS {};", quote(&self.name))
    }
}
