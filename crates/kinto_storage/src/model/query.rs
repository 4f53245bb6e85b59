//! Abstract list-query description: filters, sorts and pagination rules.
//!
//! # Invariants
//! - Filters in one list are combined with AND.
//! - Pagination rules are combined with OR; each rule is an AND of filters.
//! - Sort entries are cumulative; the first entry is the primary key.

use super::Object;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Comparison operator of one filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Membership in a list value.
    In,
    /// Non-membership in a list value.
    Exclude,
    Like,
    /// `true` matches non-null values, `false` matches nulls.
    Has,
}

impl Comparison {
    /// Querystring prefix used by the resource layer.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "not",
            Self::Lt => "lt",
            Self::Lte => "max",
            Self::Gt => "gt",
            Self::Gte => "min",
            Self::In => "in",
            Self::Exclude => "exclude",
            Self::Like => "like",
            Self::Has => "has",
        }
    }

    /// Whether the operator expects a list value.
    pub fn is_list(self) -> bool {
        matches!(self, Self::In | Self::Exclude)
    }
}

impl FromStr for Comparison {
    type Err = QueryModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "eq" => Ok(Self::Eq),
            "not" => Ok(Self::Neq),
            "lt" => Ok(Self::Lt),
            "max" => Ok(Self::Lte),
            "gt" => Ok(Self::Gt),
            "min" => Ok(Self::Gte),
            "in" => Ok(Self::In),
            "exclude" => Ok(Self::Exclude),
            "like" => Ok(Self::Like),
            "has" => Ok(Self::Has),
            other => Err(QueryModelError::UnknownComparison(other.to_string())),
        }
    }
}

/// One `(field, operator, value)` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: Comparison,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: Comparison, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Sort direction of one sort entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Accepts the resource layer's signed direction (`1` / `-1`).
impl TryFrom<i8> for SortDirection {
    type Error = QueryModelError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Ascending),
            -1 => Ok(Self::Descending),
            other => Err(QueryModelError::UnknownSortDirection(other)),
        }
    }
}

/// One `(field, direction)` ordering entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Ascending)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Descending)
    }
}

/// Conjunction of filters selecting records after a pagination cursor.
pub type PaginationRule = Vec<Filter>;

/// Parameters of `get_all`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sorting: Vec<Sort>,
    pub pagination_rules: Vec<PaginationRule>,
    /// `None` or `Some(0)` means the configured `max_fetch_size`.
    pub limit: Option<usize>,
    pub include_deleted: bool,
}

/// One page of records plus the count of every matching record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListResult {
    pub records: Vec<Object>,
    /// Matches namespace, deleted policy and filters; ignores pagination
    /// rules and limit.
    pub total_records: usize,
}

/// Errors raised while building a query description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryModelError {
    UnknownComparison(String),
    UnknownSortDirection(i8),
}

impl Display for QueryModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownComparison(value) => write!(f, "unknown comparison operator `{value}`"),
            Self::UnknownSortDirection(value) => {
                write!(f, "unknown sort direction `{value}`; expected 1 or -1")
            }
        }
    }
}

impl Error for QueryModelError {}
