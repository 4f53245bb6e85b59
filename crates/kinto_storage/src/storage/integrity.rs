//! Integrity-error classification.
//!
//! # Responsibility
//! - Turn engine-specific constraint violations into `Unicity` errors that
//!   name the offending field.
//!
//! # Invariants
//! - Lookup tries `(engine, code)` first, then the engine-only strategy.
//! - A violation no strategy understands becomes `Backend`; classification
//!   never panics.
//! - `parent_id` is never reported as the offending field.

use super::error::StorageError;
use crate::model::Object;
use crate::schema::table::PARENT_ID_COLUMN;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::ErrorCode;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub const SQLITE_ENGINE: &str = "sqlite";
pub const POSTGRESQL_ENGINE: &str = "postgresql";

/// `SQLITE_CONSTRAINT_UNIQUE`.
pub const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
/// `SQLITE_CONSTRAINT_PRIMARYKEY`.
pub const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
/// `unique_violation` SQLSTATE.
pub const POSTGRESQL_UNIQUE_VIOLATION: &str = "23505";

static SQLITE_COLUMNS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"constraint failed: (.+)$").expect("valid sqlite constraint regex"));
static POSTGRESQL_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((.*?)\)").expect("valid postgresql key regex"));

/// Engine-neutral description of one constraint violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIntegrityError {
    pub engine: String,
    pub code: Option<String>,
    pub message: String,
}

impl RawIntegrityError {
    pub fn new(engine: impl Into<String>, code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Extracts a constraint violation from a SQLite failure.
    ///
    /// Returns `None` for every other kind of error.
    pub fn from_sqlite(err: &rusqlite::Error) -> Option<Self> {
        let rusqlite::Error::SqliteFailure(failure, message) = err else {
            return None;
        };
        if failure.code != ErrorCode::ConstraintViolation {
            return None;
        }
        Some(Self {
            engine: SQLITE_ENGINE.to_string(),
            code: Some(failure.extended_code.to_string()),
            message: message.clone().unwrap_or_default(),
        })
    }
}

/// Registry key: an engine plus an optional error code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassifierKey {
    pub engine: String,
    pub code: Option<String>,
}

impl ClassifierKey {
    pub fn new(engine: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            engine: engine.into(),
            code: code.map(str::to_string),
        }
    }
}

/// Extracts the offending field from a violation, `None` when unparseable.
pub type ClassifierStrategy = Arc<dyn Fn(&RawIntegrityError) -> Option<String> + Send + Sync>;

#[derive(Clone)]
pub struct IntegrityClassifier {
    strategies: BTreeMap<ClassifierKey, ClassifierStrategy>,
}

impl Debug for IntegrityClassifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityClassifier")
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for IntegrityClassifier {
    /// Classifier with the SQLite and PostgreSQL strategies registered.
    fn default() -> Self {
        let mut classifier = Self::empty();
        classifier.register(
            ClassifierKey::new(SQLITE_ENGINE, Some(SQLITE_CONSTRAINT_UNIQUE)),
            sqlite_constraint_field,
        );
        classifier.register(
            ClassifierKey::new(SQLITE_ENGINE, Some(SQLITE_CONSTRAINT_PRIMARYKEY)),
            sqlite_constraint_field,
        );
        classifier.register(ClassifierKey::new(SQLITE_ENGINE, None), |raw| {
            if raw.message.starts_with("UNIQUE constraint failed") {
                sqlite_constraint_field(raw)
            } else {
                None
            }
        });
        classifier.register(
            ClassifierKey::new(POSTGRESQL_ENGINE, Some(POSTGRESQL_UNIQUE_VIOLATION)),
            postgresql_key_field,
        );
        classifier
    }
}

impl IntegrityClassifier {
    /// Classifier without any strategy.
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// Registers or replaces the strategy for `key`.
    pub fn register<F>(&mut self, key: ClassifierKey, strategy: F)
    where
        F: Fn(&RawIntegrityError) -> Option<String> + Send + Sync + 'static,
    {
        self.strategies.insert(key, Arc::new(strategy));
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    fn lookup(&self, raw: &RawIntegrityError) -> Option<&ClassifierStrategy> {
        let exact = raw.code.as_ref().and_then(|code| {
            self.strategies.get(&ClassifierKey {
                engine: raw.engine.clone(),
                code: Some(code.clone()),
            })
        });
        exact.or_else(|| {
            self.strategies.get(&ClassifierKey {
                engine: raw.engine.clone(),
                code: None,
            })
        })
    }

    /// Maps a violation raised while writing `record` to a storage error.
    pub fn classify(
        &self,
        raw: &RawIntegrityError,
        collection_id: &str,
        record: Object,
    ) -> StorageError {
        match self.lookup(raw).and_then(|strategy| strategy(raw)) {
            Some(field) => StorageError::Unicity { field, record },
            None => {
                log::warn!(
                    "event=integrity_fallback module=storage status=error collection={} engine={} code={}",
                    collection_id,
                    raw.engine,
                    raw.code.as_deref().unwrap_or("-")
                );
                StorageError::backend(format!(
                    "unclassified integrity error on `{collection_id}`: {}",
                    raw.message
                ))
            }
        }
    }
}

/// `UNIQUE constraint failed: table.parent_id, table.column` → `column`.
fn sqlite_constraint_field(raw: &RawIntegrityError) -> Option<String> {
    let columns = SQLITE_COLUMNS_RE.captures(&raw.message)?.get(1)?.as_str();
    last_reported_column(columns.split(", ").map(|qualified| {
        qualified
            .rsplit_once('.')
            .map_or(qualified, |(_, column)| column)
    }))
}

/// `Key (parent_id, column)=(p, v) already exists.` → `column`.
fn postgresql_key_field(raw: &RawIntegrityError) -> Option<String> {
    let columns = POSTGRESQL_KEY_RE.captures(&raw.message)?.get(1)?.as_str();
    last_reported_column(columns.split(',').map(str::trim))
}

fn last_reported_column<'a>(columns: impl Iterator<Item = &'a str>) -> Option<String> {
    columns
        .map(|column| column.trim_matches('"'))
        .filter(|column| !column.is_empty() && *column != PARENT_ID_COLUMN)
        .last()
        .map(str::to_string)
}
