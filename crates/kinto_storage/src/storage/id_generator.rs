//! Pluggable identifier strategies for new records.

use crate::schema::table::ColumnType;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Debug;
use uuid::Uuid;

static INTEGER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("valid integer id regex"));
static UUID_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid uuid id regex")
});

/// Produces and validates record identifiers.
///
/// Implementations are stateless per call; the engine only relies on this
/// trait, so strategies can be swapped per collection.
pub trait IdGenerator: Debug + Send + Sync {
    /// Returns a fresh identifier.
    fn generate(&self) -> String;

    /// Shape every identifier of this strategy must match.
    fn pattern(&self) -> &Regex;

    /// Storage class of the id column.
    fn column_type(&self) -> ColumnType;

    /// Returns whether a caller-supplied identifier is acceptable.
    fn validate(&self, candidate: &str) -> bool {
        self.pattern().is_match(candidate)
    }
}

/// Positive integer identifiers for `INTEGER` id columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerId;

impl IdGenerator for IntegerId {
    fn generate(&self) -> String {
        // The top 63 bits of a v4 uuid always fit a positive i64.
        let value = (Uuid::new_v4().as_u128() >> 65) as i64;
        value.max(1).to_string()
    }

    fn pattern(&self) -> &Regex {
        &INTEGER_ID_RE
    }

    fn column_type(&self) -> ColumnType {
        ColumnType::Integer
    }

    fn validate(&self, candidate: &str) -> bool {
        self.pattern().is_match(candidate) && candidate.parse::<i64>().is_ok()
    }
}

/// Lowercase hyphenated v4 UUID identifiers for `TEXT` id columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidId;

impl IdGenerator for UuidId {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }

    fn pattern(&self) -> &Regex {
        &UUID_ID_RE
    }

    fn column_type(&self) -> ColumnType {
        ColumnType::Text
    }
}
