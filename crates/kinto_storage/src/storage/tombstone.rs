//! Tombstone store: identifiers and deletion times of deleted records.

use crate::db::DbResult;
use crate::model::timestamp::Timestamp;
use crate::model::tombstone::Tombstone;
use rusqlite::{params, Connection};

/// Inserts one tombstone.
pub fn record_deletion(conn: &Connection, tombstone: &Tombstone) -> DbResult<()> {
    conn.execute(
        "INSERT INTO deleted (id, parent_id, collection_id, last_modified)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            tombstone.id,
            tombstone.parent_id,
            tombstone.collection_id,
            tombstone.last_modified.as_millis(),
        ],
    )?;
    Ok(())
}

/// Deletes the namespace's tombstones, optionally only those older than
/// `before` (exclusive). Returns the number removed.
pub fn purge(
    conn: &Connection,
    parent_id: &str,
    collection_id: &str,
    before: Option<Timestamp>,
) -> DbResult<usize> {
    let removed = match before {
        Some(before) => conn.execute(
            "DELETE FROM deleted
             WHERE parent_id = ?1
               AND collection_id = ?2
               AND last_modified < ?3;",
            params![parent_id, collection_id, before.as_millis()],
        )?,
        None => conn.execute(
            "DELETE FROM deleted
             WHERE parent_id = ?1
               AND collection_id = ?2;",
            params![parent_id, collection_id],
        )?,
    };
    Ok(removed)
}

/// Lists the namespace's tombstones, oldest first.
pub fn list(conn: &Connection, parent_id: &str, collection_id: &str) -> DbResult<Vec<Tombstone>> {
    let mut stmt = conn.prepare(
        "SELECT id, parent_id, collection_id, last_modified
         FROM deleted
         WHERE parent_id = ?1
           AND collection_id = ?2
         ORDER BY last_modified ASC, id ASC;",
    )?;
    let mut rows = stmt.query(params![parent_id, collection_id])?;
    let mut tombstones = Vec::new();
    while let Some(row) = rows.next()? {
        tombstones.push(Tombstone {
            id: row.get("id")?,
            parent_id: row.get("parent_id")?,
            collection_id: row.get("collection_id")?,
            last_modified: Timestamp::from_millis(row.get("last_modified")?),
        });
    }
    Ok(tombstones)
}

#[cfg(test)]
mod tests {
    use super::{list, purge, record_deletion};
    use crate::db::{open_db_in_memory, DEFAULT_BUSY_TIMEOUT};
    use crate::model::timestamp::Timestamp;
    use crate::model::tombstone::Tombstone;

    fn tombstone(id: &str, millis: i64) -> Tombstone {
        Tombstone {
            id: id.to_string(),
            parent_id: "alice".to_string(),
            collection_id: "article".to_string(),
            last_modified: Timestamp::from_millis(millis),
        }
    }

    #[test]
    fn purge_before_is_exclusive() {
        let conn = open_db_in_memory(DEFAULT_BUSY_TIMEOUT).unwrap();
        record_deletion(&conn, &tombstone("1", 10)).unwrap();
        record_deletion(&conn, &tombstone("2", 20)).unwrap();

        let removed = purge(&conn, "alice", "article", Some(Timestamp::from_millis(20))).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(list(&conn, "alice", "article").unwrap(), vec![tombstone("2", 20)]);
    }

    #[test]
    fn purge_is_scoped_and_idempotent() {
        let conn = open_db_in_memory(DEFAULT_BUSY_TIMEOUT).unwrap();
        record_deletion(&conn, &tombstone("1", 10)).unwrap();
        let mut other = tombstone("1", 10);
        other.parent_id = "bob".to_string();
        record_deletion(&conn, &other).unwrap();

        assert_eq!(purge(&conn, "alice", "article", None).unwrap(), 1);
        assert_eq!(purge(&conn, "alice", "article", None).unwrap(), 0);
        assert_eq!(list(&conn, "bob", "article").unwrap().len(), 1);
    }
}
