//! Storage-facing data model.
//!
//! # Responsibility
//! - Define the shapes exchanged between callers and the storage engine.
//! - Keep query descriptions (filters, sorts, pagination) engine-agnostic.
//!
//! # Invariants
//! - Records cross the API boundary as JSON objects; `parent_id` never appears
//!   in them.
//! - Timestamps are epoch milliseconds and strictly increase per namespace.

pub mod query;
pub mod timestamp;
pub mod tombstone;

/// External representation of one record.
pub type Object = serde_json::Map<String, serde_json::Value>;
