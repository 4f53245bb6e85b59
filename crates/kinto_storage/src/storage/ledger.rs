//! Per-namespace collection timestamp ledger.
//!
//! # Responsibility
//! - Track the highest modification timestamp of each
//!   `(parent_id, collection_id)` namespace, deletions included.
//! - Seed a namespace lazily so readers always observe a timestamp.
//!
//! # Invariants
//! - Exactly one row per namespace; writes are upserts taking the max.
//! - Seeding never fails on a concurrent seed of the same namespace.

use crate::db::DbResult;
use crate::model::timestamp::Timestamp;
use rusqlite::{params, Connection, OptionalExtension};

/// Reads the ledger value without seeding it.
pub fn current(
    conn: &Connection,
    parent_id: &str,
    collection_id: &str,
) -> DbResult<Option<Timestamp>> {
    let value = conn
        .query_row(
            "SELECT last_modified
             FROM timestamps
             WHERE parent_id = ?1 AND collection_id = ?2;",
            params![parent_id, collection_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(value.map(Timestamp::from_millis))
}

/// Returns the collection timestamp, seeding it with "now" when missing.
pub fn get_collection_timestamp(
    conn: &Connection,
    parent_id: &str,
    collection_id: &str,
) -> DbResult<Timestamp> {
    if let Some(existing) = current(conn, parent_id, collection_id)? {
        return Ok(existing);
    }

    conn.execute(
        "INSERT INTO timestamps (parent_id, collection_id, last_modified)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (parent_id, collection_id) DO NOTHING;",
        params![parent_id, collection_id, Timestamp::now().as_millis()],
    )?;

    let seeded: i64 = conn.query_row(
        "SELECT last_modified
         FROM timestamps
         WHERE parent_id = ?1 AND collection_id = ?2;",
        params![parent_id, collection_id],
        |row| row.get(0),
    )?;
    Ok(Timestamp::from_millis(seeded))
}

/// Raises the namespace timestamp to at least `when`.
pub fn touch(
    conn: &Connection,
    parent_id: &str,
    collection_id: &str,
    when: Timestamp,
) -> DbResult<()> {
    conn.execute(
        "INSERT INTO timestamps (parent_id, collection_id, last_modified)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (parent_id, collection_id)
         DO UPDATE SET last_modified = MAX(last_modified, excluded.last_modified);",
        params![parent_id, collection_id, when.as_millis()],
    )?;
    Ok(())
}
