//! SQLite storage engine for collection records.
//!
//! # Responsibility
//! - Own the connection, collection registry and integrity classifier.
//! - Run every record operation inside one explicit transaction scope.
//! - Keep SQL details, ledger updates and tombstones inside this boundary.
//!
//! # Invariants
//! - Record state only moves `nonexistent -> live -> deleted`; a deleted id
//!   is never reused in its namespace.
//! - Every write stamps `max(now, previous + 1)` so timestamps strictly
//!   increase per `(parent_id, collection_id)`.
//! - `get_all` ordering is total: the id is always the last sort key.

use super::error::{StorageError, StorageResult};
use super::integrity::{IntegrityClassifier, RawIntegrityError};
use super::query::{SqlFragment, Translator};
use super::{ledger, tombstone, RecordStorage};
use crate::config::StorageSettings;
use crate::db::migrations::{recreate_shared_tables, SHARED_TABLES};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::query::{Filter, ListQuery, ListResult};
use crate::model::timestamp::Timestamp;
use crate::model::tombstone::Tombstone;
use crate::model::Object;
use crate::schema::shape::{deleted_stub, id_to_string, StoredRecord};
use crate::schema::table::{quote, ColumnType, TableDef, PARENT_ID_COLUMN};
use crate::schema::{CollectionBinding, CollectionRegistry, PreparedFields, ShapeMode};
use log::{debug, error, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use serde_json::Value;
use std::time::Instant;

/// Storage engine bound to one SQLite connection.
#[derive(Debug)]
pub struct Storage {
    conn: Connection,
    registry: CollectionRegistry,
    classifier: IntegrityClassifier,
    settings: StorageSettings,
}

impl Storage {
    /// Opens the database named by `settings` (in-memory when no url is set).
    ///
    /// Record tables are not created here; call `initialize_schema`.
    pub fn open(settings: StorageSettings, registry: CollectionRegistry) -> StorageResult<Self> {
        settings
            .validate()
            .map_err(|err| StorageError::backend(err.to_string()))?;
        let conn = match &settings.url {
            Some(path) => open_db(path, settings.busy_timeout())?,
            None => open_db_in_memory(settings.busy_timeout())?,
        };
        Ok(Self::from_connection(conn, settings, registry))
    }

    /// Wraps a connection that already went through `db::open_db*`.
    pub fn from_connection(
        conn: Connection,
        settings: StorageSettings,
        registry: CollectionRegistry,
    ) -> Self {
        Self {
            conn,
            registry,
            classifier: IntegrityClassifier::default(),
            settings,
        }
    }

    pub fn with_classifier(mut self, classifier: IntegrityClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs `work` in one IMMEDIATE transaction.
    ///
    /// Commits when `work` returns `Ok`; any error rolls every write back.
    pub fn transaction<T>(
        &self,
        work: impl FnOnce(&StorageScope<'_>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        self.run(TransactionBehavior::Immediate, work)
    }

    /// Runs read-only `work` in a DEFERRED transaction, so readers do not
    /// take the write lock.
    pub fn read<T>(
        &self,
        work: impl FnOnce(&StorageScope<'_>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        self.run(TransactionBehavior::Deferred, work)
    }

    fn run<T>(
        &self,
        behavior: TransactionBehavior,
        work: impl FnOnce(&StorageScope<'_>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let tx = Transaction::new_unchecked(&self.conn, behavior)?;
        let scope = StorageScope {
            conn: &tx,
            registry: &self.registry,
            classifier: &self.classifier,
            max_fetch_size: self.settings.max_fetch_size,
        };
        let value = work(&scope)?;
        tx.commit()?;
        Ok(value)
    }

    /// Creates the record table of every registered collection.
    ///
    /// Existing tables are left untouched. With `dry_run`, only logs and
    /// returns the statements.
    pub fn initialize_schema(&self, dry_run: bool) -> StorageResult<Vec<String>> {
        let statements: Vec<String> = self
            .registry
            .iter()
            .flat_map(|binding| binding.table().create_statements(binding.id_type()))
            .collect();

        if dry_run {
            for statement in &statements {
                info!("event=schema_init module=storage status=dry_run statement={statement:?}");
            }
            return Ok(statements);
        }

        let started_at = Instant::now();
        self.transaction(|scope| {
            for statement in &statements {
                scope.conn.execute_batch(statement)?;
            }
            Ok(())
        })?;
        info!(
            "event=schema_init module=storage status=ok collections={} duration_ms={}",
            self.registry.len(),
            started_at.elapsed().as_millis()
        );
        Ok(statements)
    }

    /// Drops every record table and the shared tables, then recreates them
    /// empty.
    pub fn flush(&self) -> StorageResult<()> {
        self.transaction(|scope| {
            for binding in self.registry.iter() {
                scope.conn.execute_batch(&binding.table().drop_statement())?;
            }
            for table in SHARED_TABLES {
                scope
                    .conn
                    .execute_batch(&format!("DROP TABLE IF EXISTS {};", quote(table)))?;
            }
            recreate_shared_tables(scope.conn)?;
            for binding in self.registry.iter() {
                for statement in binding.table().create_statements(binding.id_type()) {
                    scope.conn.execute_batch(&statement)?;
                }
            }
            Ok(())
        })?;
        info!(
            "event=flush module=storage status=ok collections={}",
            self.registry.len()
        );
        Ok(())
    }

    /// Tombstones of one namespace, oldest first.
    pub fn tombstones(&self, collection_id: &str, parent_id: &str) -> StorageResult<Vec<Tombstone>> {
        self.read(|scope| scope.tombstones(collection_id, parent_id))
    }
}

impl RecordStorage for Storage {
    fn create(&self, collection_id: &str, parent_id: &str, record: Object) -> StorageResult<Object> {
        self.transaction(|scope| scope.create(collection_id, parent_id, record))
    }

    fn get(&self, collection_id: &str, parent_id: &str, id: &str) -> StorageResult<Object> {
        self.read(|scope| scope.get(collection_id, parent_id, id))
    }

    fn update(
        &self,
        collection_id: &str,
        parent_id: &str,
        id: &str,
        record: Object,
    ) -> StorageResult<Object> {
        self.transaction(|scope| scope.update(collection_id, parent_id, id, record))
    }

    fn delete(
        &self,
        collection_id: &str,
        parent_id: &str,
        id: &str,
        with_deleted: bool,
    ) -> StorageResult<Object> {
        self.transaction(|scope| scope.delete(collection_id, parent_id, id, with_deleted))
    }

    fn delete_all(
        &self,
        collection_id: &str,
        parent_id: &str,
        filters: &[Filter],
        with_deleted: bool,
    ) -> StorageResult<Vec<Object>> {
        self.transaction(|scope| scope.delete_all(collection_id, parent_id, filters, with_deleted))
    }

    fn purge_deleted(
        &self,
        collection_id: &str,
        parent_id: &str,
        before: Option<Timestamp>,
    ) -> StorageResult<usize> {
        self.transaction(|scope| scope.purge_deleted(collection_id, parent_id, before))
    }

    fn get_all(
        &self,
        collection_id: &str,
        parent_id: &str,
        query: &ListQuery,
    ) -> StorageResult<ListResult> {
        self.read(|scope| scope.get_all(collection_id, parent_id, query))
    }

    fn collection_timestamp(&self, collection_id: &str, parent_id: &str) -> StorageResult<Timestamp> {
        self.transaction(|scope| scope.collection_timestamp(collection_id, parent_id))
    }
}

/// Record operations bound to one open transaction.
pub struct StorageScope<'a> {
    conn: &'a Connection,
    registry: &'a CollectionRegistry,
    classifier: &'a IntegrityClassifier,
    max_fetch_size: usize,
}

impl<'a> StorageScope<'a> {
    pub fn connection(&self) -> &Connection {
        self.conn
    }

    pub fn tombstones(&self, collection_id: &str, parent_id: &str) -> StorageResult<Vec<Tombstone>> {
        self.binding(collection_id)?;
        Ok(tombstone::list(self.conn, parent_id, collection_id)?)
    }

    fn binding(&self, collection_id: &str) -> StorageResult<&'a CollectionBinding> {
        self.registry.get(collection_id).ok_or_else(|| {
            error!(
                "event=binding_missing module=storage status=error collection={collection_id}"
            );
            StorageError::backend(format!("no storage binding for collection `{collection_id}`"))
        })
    }

    /// Highest timestamp already handed out in the namespace.
    fn previous_timestamp(
        &self,
        binding: &CollectionBinding,
        parent_id: &str,
    ) -> StorageResult<Option<Timestamp>> {
        let table = binding.table();
        if table.is_timestamp_trackable() {
            return Ok(ledger::current(self.conn, parent_id, binding.collection_id())?);
        }
        let sql = format!(
            "SELECT MAX({}) FROM {} WHERE {} = ?;",
            quote(&table.meta().last_modified),
            quote(table.name()),
            quote(PARENT_ID_COLUMN)
        );
        let value: Option<i64> = self.conn.query_row(&sql, params![parent_id], |row| row.get(0))?;
        Ok(value.map(Timestamp::from_millis))
    }

    fn touch(&self, binding: &CollectionBinding, parent_id: &str, when: Timestamp) -> StorageResult<()> {
        if binding.table().is_timestamp_trackable() {
            ledger::touch(self.conn, parent_id, binding.collection_id(), when)?;
        }
        Ok(())
    }

    fn effective_limit(&self, requested: Option<usize>) -> usize {
        match requested {
            None | Some(0) => self.max_fetch_size,
            Some(limit) => limit.min(self.max_fetch_size),
        }
    }

    fn load(
        &self,
        binding: &CollectionBinding,
        parent_id: &str,
        id: &str,
        include_deleted: bool,
    ) -> StorageResult<Option<StoredRecord>> {
        let Some(id_value) = id_sql_value(binding.id_type(), id) else {
            return Ok(None);
        };
        let table = binding.table();
        let deleted_clause = if include_deleted {
            String::new()
        } else {
            format!(" AND {} = 0", quote(&table.meta().deleted))
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ? AND {} = ?{deleted_clause};",
            select_list(table),
            quote(table.name()),
            quote(PARENT_ID_COLUMN),
            quote(&table.meta().id)
        );
        self.conn
            .query_row(&sql, params![parent_id, id_value], |row| {
                Ok(parse_row(binding, row))
            })
            .optional()?
            .transpose()
    }

    fn load_live(
        &self,
        binding: &CollectionBinding,
        parent_id: &str,
        id: &str,
    ) -> StorageResult<Object> {
        let record = self
            .load(binding, parent_id, id, false)?
            .ok_or_else(|| StorageError::not_found(binding.collection_id(), id))?;
        Ok(binding.shape().deserialize(binding.table(), record))
    }

    fn insert_record(
        &self,
        binding: &CollectionBinding,
        parent_id: &str,
        mut payload: Object,
        forced_id: Option<&str>,
    ) -> StorageResult<Object> {
        let table = binding.table();
        let meta = table.meta();

        let id = match forced_id {
            Some(id) => id.to_string(),
            None => match payload.get(&meta.id) {
                Some(value) => id_to_string(binding.id_type(), value)
                    .ok_or_else(|| invalid_id(table, &value.to_string()))?,
                None => binding.id_generator().generate(),
            },
        };
        let id = canonical_id(binding.id_type(), &id).unwrap_or(id);
        if !binding.id_generator().validate(&id) {
            return Err(invalid_id(table, &id));
        }
        let id_value = id_sql_value(binding.id_type(), &id).ok_or_else(|| invalid_id(table, &id))?;
        payload.insert(meta.id.clone(), Value::String(id.clone()));

        if self.load(binding, parent_id, &id, true)?.is_some_and(|existing| existing.deleted) {
            return Err(StorageError::Unicity {
                field: meta.id.clone(),
                record: payload,
            });
        }

        let prepared = binding
            .shape()
            .serialize(table, payload.clone(), ShapeMode::Full)?;
        let last_modified = Timestamp::next_after(self.previous_timestamp(binding, parent_id)?);

        let mut columns = vec![
            quote(&meta.id),
            quote(PARENT_ID_COLUMN),
            quote(&meta.last_modified),
            quote(&meta.deleted),
        ];
        let mut values = vec![
            id_value,
            SqlValue::Text(parent_id.to_string()),
            SqlValue::Integer(last_modified.as_millis()),
            SqlValue::Integer(0),
        ];
        for (column, value) in prepared.values {
            columns.push(quote(&column));
            values.push(value);
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            quote(table.name()),
            columns.join(", "),
            vec!["?"; values.len()].join(", ")
        );
        self.conn
            .execute(&sql, params_from_iter(values))
            .map_err(|err| self.integrity_error(err, binding, payload))?;

        self.touch(binding, parent_id, last_modified)?;
        debug!(
            "event=record_create module=storage status=ok collection={} last_modified={last_modified}",
            binding.collection_id()
        );
        self.load_live(binding, parent_id, &id)
    }

    fn update_live(
        &self,
        binding: &CollectionBinding,
        parent_id: &str,
        id: &str,
        mut payload: Object,
    ) -> StorageResult<Object> {
        let table = binding.table();
        let meta = table.meta();
        let PreparedFields { values: prepared } =
            binding
                .shape()
                .serialize(table, payload.clone(), ShapeMode::Partial)?;
        let last_modified = Timestamp::next_after(self.previous_timestamp(binding, parent_id)?);

        let mut assignments = vec![format!("{} = ?", quote(&meta.last_modified))];
        let mut values = vec![SqlValue::Integer(last_modified.as_millis())];
        for (column, value) in prepared {
            assignments.push(format!("{} = ?", quote(&column)));
            values.push(value);
        }
        values.push(SqlValue::Text(parent_id.to_string()));
        values.push(id_sql_value(binding.id_type(), id).ok_or_else(|| invalid_id(table, id))?);

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ? AND {} = ?;",
            quote(table.name()),
            assignments.join(", "),
            quote(PARENT_ID_COLUMN),
            quote(&meta.id)
        );
        payload.insert(meta.id.clone(), Value::String(id.to_string()));
        self.conn
            .execute(&sql, params_from_iter(values))
            .map_err(|err| self.integrity_error(err, binding, payload))?;

        self.touch(binding, parent_id, last_modified)?;
        self.load_live(binding, parent_id, id)
    }

    /// Marks one live record deleted at `when`.
    fn mark_deleted(
        &self,
        binding: &CollectionBinding,
        parent_id: &str,
        id: &str,
        when: Timestamp,
        with_deleted: bool,
    ) -> StorageResult<Object> {
        let table = binding.table();
        let meta = table.meta();
        let id_value = id_sql_value(binding.id_type(), id).ok_or_else(|| invalid_id(table, id))?;
        let sql = format!(
            "UPDATE {} SET {} = 1, {} = ? WHERE {} = ? AND {} = ?;",
            quote(table.name()),
            quote(&meta.deleted),
            quote(&meta.last_modified),
            quote(PARENT_ID_COLUMN),
            quote(&meta.id)
        );
        self.conn
            .execute(&sql, params![when.as_millis(), parent_id, id_value])?;

        if with_deleted {
            tombstone::record_deletion(
                self.conn,
                &Tombstone {
                    id: id.to_string(),
                    parent_id: parent_id.to_string(),
                    collection_id: binding.collection_id().to_string(),
                    last_modified: when,
                },
            )?;
        }
        debug!(
            "event=record_delete module=storage status=ok collection={} tombstone={with_deleted} last_modified={when}",
            binding.collection_id()
        );
        Ok(deleted_stub(table, id, when))
    }

    fn integrity_error(
        &self,
        err: rusqlite::Error,
        binding: &CollectionBinding,
        record: Object,
    ) -> StorageError {
        let Some(raw) = RawIntegrityError::from_sqlite(&err) else {
            return err.into();
        };
        match self.classifier.classify(&raw, binding.collection_id(), record) {
            StorageError::Backend {
                message,
                source: None,
            } => StorageError::Backend {
                message,
                source: Some(DbError::Sqlite(err)),
            },
            classified => classified,
        }
    }

    /// `WHERE` predicate selecting the namespace and deleted policy.
    fn namespace_clause(table: &TableDef, parent_id: &str, include_deleted: bool) -> SqlFragment {
        let mut sql = format!("{} = ?", quote(PARENT_ID_COLUMN));
        if !include_deleted {
            sql.push_str(&format!(" AND {} = 0", quote(&table.meta().deleted)));
        }
        SqlFragment {
            sql,
            params: vec![SqlValue::Text(parent_id.to_string())],
        }
    }
}

impl RecordStorage for StorageScope<'_> {
    fn create(&self, collection_id: &str, parent_id: &str, record: Object) -> StorageResult<Object> {
        let binding = self.binding(collection_id)?;
        self.insert_record(binding, parent_id, record, None)
    }

    fn get(&self, collection_id: &str, parent_id: &str, id: &str) -> StorageResult<Object> {
        let binding = self.binding(collection_id)?;
        let id = canonical_id(binding.id_type(), id).unwrap_or_else(|| id.to_string());
        self.load_live(binding, parent_id, &id)
    }

    fn update(
        &self,
        collection_id: &str,
        parent_id: &str,
        id: &str,
        record: Object,
    ) -> StorageResult<Object> {
        let binding = self.binding(collection_id)?;
        let id = canonical_id(binding.id_type(), id).unwrap_or_else(|| id.to_string());
        let id = id.as_str();
        match self.load(binding, parent_id, id, true)? {
            None => self.insert_record(binding, parent_id, record, Some(id)),
            Some(existing) if existing.deleted => {
                let mut record = record;
                let id_field = binding.table().meta().id.clone();
                record.insert(id_field.clone(), Value::String(id.to_string()));
                Err(StorageError::Unicity {
                    field: id_field,
                    record,
                })
            }
            Some(_) => self.update_live(binding, parent_id, id, record),
        }
    }

    fn delete(
        &self,
        collection_id: &str,
        parent_id: &str,
        id: &str,
        with_deleted: bool,
    ) -> StorageResult<Object> {
        let binding = self.binding(collection_id)?;
        let id = canonical_id(binding.id_type(), id).unwrap_or_else(|| id.to_string());
        let id = id.as_str();
        if self.load(binding, parent_id, id, false)?.is_none() {
            return Err(StorageError::not_found(collection_id, id));
        }
        let when = Timestamp::next_after(self.previous_timestamp(binding, parent_id)?);
        let stub = self.mark_deleted(binding, parent_id, id, when, with_deleted)?;
        self.touch(binding, parent_id, when)?;
        Ok(stub)
    }

    fn delete_all(
        &self,
        collection_id: &str,
        parent_id: &str,
        filters: &[Filter],
        with_deleted: bool,
    ) -> StorageResult<Vec<Object>> {
        let binding = self.binding(collection_id)?;
        let table = binding.table();
        let meta = table.meta();
        let translator = Translator::new(table, binding.id_type());

        let mut predicate = Self::namespace_clause(table, parent_id, false);
        if let Some(fragment) = translator.conjunction(filters)? {
            predicate.sql = format!("{} AND {}", predicate.sql, fragment.sql);
            predicate.params.extend(fragment.params);
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} ASC, {} ASC;",
            quote(&meta.id),
            quote(table.name()),
            predicate.sql,
            quote(&meta.last_modified),
            quote(&meta.id)
        );
        let mut ids = Vec::new();
        {
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(predicate.params))?;
            while let Some(row) = rows.next()? {
                let raw = binding
                    .id_type()
                    .from_sql(row.get_ref(0)?)
                    .map_err(|reason| corrupt_row(table, &reason))?;
                let id = id_to_string(binding.id_type(), &raw)
                    .ok_or_else(|| corrupt_row(table, "unreadable identifier"))?;
                ids.push(id);
            }
        }

        let mut previous = self.previous_timestamp(binding, parent_id)?;
        let mut deleted = Vec::with_capacity(ids.len());
        for id in &ids {
            let when = Timestamp::next_after(previous);
            deleted.push(self.mark_deleted(binding, parent_id, id, when, with_deleted)?);
            previous = Some(when);
        }
        if let Some(last) = previous.filter(|_| !ids.is_empty()) {
            self.touch(binding, parent_id, last)?;
        }
        Ok(deleted)
    }

    fn purge_deleted(
        &self,
        collection_id: &str,
        parent_id: &str,
        before: Option<Timestamp>,
    ) -> StorageResult<usize> {
        self.binding(collection_id)?;
        Ok(tombstone::purge(self.conn, parent_id, collection_id, before)?)
    }

    fn get_all(
        &self,
        collection_id: &str,
        parent_id: &str,
        query: &ListQuery,
    ) -> StorageResult<ListResult> {
        let binding = self.binding(collection_id)?;
        let table = binding.table();
        let translator = Translator::new(table, binding.id_type());

        let mut predicate = Self::namespace_clause(table, parent_id, query.include_deleted);
        if let Some(filters) = translator.conjunction(&query.filters)? {
            predicate.sql = format!("{} AND {}", predicate.sql, filters.sql);
            predicate.params.extend(filters.params);
        }

        let count_sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {};",
            quote(table.name()),
            predicate.sql
        );
        let total: i64 = self.conn.query_row(
            &count_sql,
            params_from_iter(predicate.params.iter()),
            |row| row.get(0),
        )?;

        if let Some(pagination) = translator.pagination(&query.pagination_rules)? {
            predicate.sql = format!("{} AND ({})", predicate.sql, pagination.sql);
            predicate.params.extend(pagination.params);
        }
        let limit = self.effective_limit(query.limit);
        predicate
            .params
            .push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

        let sql = format!(
            "SELECT {} FROM {} WHERE {} {} LIMIT ?;",
            select_list(table),
            quote(table.name()),
            predicate.sql,
            translator.ordering(&query.sorting)?
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(predicate.params))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let stored = parse_row(binding, row)?;
            records.push(binding.shape().deserialize(table, stored));
        }

        Ok(ListResult {
            records,
            total_records: usize::try_from(total).unwrap_or_default(),
        })
    }

    fn collection_timestamp(&self, collection_id: &str, parent_id: &str) -> StorageResult<Timestamp> {
        let binding = self.binding(collection_id)?;
        if binding.table().is_timestamp_trackable() {
            return Ok(ledger::get_collection_timestamp(
                self.conn,
                parent_id,
                collection_id,
            )?);
        }
        Ok(self
            .previous_timestamp(binding, parent_id)?
            .unwrap_or(Timestamp::EPOCH))
    }
}

/// Meta columns first, then collection columns in declaration order.
fn select_list(table: &TableDef) -> String {
    let meta = table.meta();
    [&meta.id, &meta.last_modified, &meta.deleted]
        .into_iter()
        .chain(table.columns().iter().map(|column| &column.name))
        .map(|name| quote(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses one row selected with `select_list`. Null columns are omitted.
fn parse_row(binding: &CollectionBinding, row: &Row<'_>) -> StorageResult<StoredRecord> {
    let table = binding.table();
    let raw_id = binding
        .id_type()
        .from_sql(row.get_ref(0)?)
        .map_err(|reason| corrupt_row(table, &reason))?;
    let id = id_to_string(binding.id_type(), &raw_id)
        .ok_or_else(|| corrupt_row(table, "unreadable identifier"))?;

    let mut fields = Vec::with_capacity(table.columns().len());
    for (offset, column) in table.columns().iter().enumerate() {
        let value = column
            .kind
            .from_sql(row.get_ref(offset + 3)?)
            .map_err(|reason| corrupt_row(table, &format!("column `{}`: {reason}", column.name)))?;
        if !value.is_null() {
            fields.push((column.name.clone(), value));
        }
    }

    Ok(StoredRecord {
        id,
        last_modified: Timestamp::from_millis(row.get(1)?),
        deleted: row.get(2)?,
        fields,
    })
}

/// Text form of an identifier as the id column stores it; integer ids drop
/// leading zeros so rows, stubs and tombstones name the same id.
fn canonical_id(kind: ColumnType, id: &str) -> Option<String> {
    match kind {
        ColumnType::Integer => id.parse::<i64>().ok().map(|value| value.to_string()),
        _ => Some(id.to_string()),
    }
}

fn id_sql_value(kind: ColumnType, id: &str) -> Option<SqlValue> {
    match kind {
        ColumnType::Integer => id.parse().ok().map(SqlValue::Integer),
        _ => Some(SqlValue::Text(id.to_string())),
    }
}

fn invalid_id(table: &TableDef, id: &str) -> StorageError {
    StorageError::InvalidRecord {
        field: Some(table.meta().id.clone()),
        reason: format!("invalid identifier `{id}`"),
    }
}

fn corrupt_row(table: &TableDef, reason: &str) -> StorageError {
    StorageError::backend(format!("unreadable row in `{}`: {reason}", table.name()))
}
