//! Residue of a deleted record, kept for sync clients.

use super::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// One deletion marker. Written once per delete and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub id: String,
    pub parent_id: String,
    pub collection_id: String,
    /// Time of deletion.
    pub last_modified: Timestamp,
}
