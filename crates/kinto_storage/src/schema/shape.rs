//! Serialization capability: payload preparation and row rendering.
//!
//! # Responsibility
//! - Run per-field preparers, then the optional global preparer.
//! - Validate prepared values against the table's declared columns.
//! - Render stored rows back into external JSON objects.
//!
//! # Invariants
//! - Field preparers for one field run in registration order.
//! - Field preparers always run before the global preparer.
//! - Meta fields in a payload are ignored; the engine owns them.

use super::table::{ColumnType, TableDef};
use super::{SchemaError, SchemaResult};
use crate::model::timestamp::Timestamp;
use crate::model::Object;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Transforms or rejects one field value.
pub type FieldPreparer = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;
/// Transforms or rejects the whole payload after field preparers ran.
pub type ObjectPreparer = Arc<dyn Fn(Object) -> Result<Object, String> + Send + Sync>;

/// Whether a payload must describe the whole record or only changed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeMode {
    /// Create path: required columns must be present.
    Full,
    /// Update path: only supplied fields are prepared and written. The global
    /// preparer sees the supplied fields only.
    Partial,
}

/// Column values ready to bind, in table column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedFields {
    pub values: Vec<(String, SqlValue)>,
}

impl PreparedFields {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Stored row before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub last_modified: Timestamp,
    pub deleted: bool,
    pub fields: Vec<(String, Value)>,
}

/// Preparer configuration of one collection.
#[derive(Clone, Default)]
pub struct RecordShape {
    field_preparers: BTreeMap<String, Vec<FieldPreparer>>,
    global_preparer: Option<ObjectPreparer>,
}

impl Debug for RecordShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordShape")
            .field(
                "field_preparers",
                &self
                    .field_preparers
                    .iter()
                    .map(|(field, preparers)| (field.as_str(), preparers.len()))
                    .collect::<Vec<_>>(),
            )
            .field("global_preparer", &self.global_preparer.is_some())
            .finish()
    }
}

impl RecordShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a preparer for `field`.
    pub fn field_preparer<F>(mut self, field: impl Into<String>, preparer: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.field_preparers
            .entry(field.into())
            .or_default()
            .push(Arc::new(preparer));
        self
    }

    /// Replaces the global preparer.
    pub fn global_preparer<F>(mut self, preparer: F) -> Self
    where
        F: Fn(Object) -> Result<Object, String> + Send + Sync + 'static,
    {
        self.global_preparer = Some(Arc::new(preparer));
        self
    }

    /// Fields with at least one preparer, checked against the table on
    /// registration.
    pub fn prepared_fields(&self) -> impl Iterator<Item = &str> {
        self.field_preparers.keys().map(String::as_str)
    }

    /// Prepares a payload into column values.
    pub fn serialize(
        &self,
        table: &TableDef,
        mut payload: Object,
        mode: ShapeMode,
    ) -> SchemaResult<PreparedFields> {
        let meta = table.meta();
        for key in [&meta.id, &meta.last_modified, &meta.deleted] {
            payload.remove(key);
        }

        let mut prepared = Object::new();
        for (field, value) in payload {
            if table.find_column(&field).is_none() {
                return Err(SchemaError::UnknownField(field));
            }
            let value = self.run_field_preparers(&field, value)?;
            prepared.insert(field, value);
        }

        if let Some(global) = &self.global_preparer {
            prepared = global(prepared).map_err(|reason| SchemaError::Preparer {
                field: None,
                reason,
            })?;
        }

        let mut values = Vec::with_capacity(prepared.len());
        for column in table.columns() {
            match prepared.remove(&column.name) {
                Some(Value::Null) | None if !column.nullable && mode == ShapeMode::Full => {
                    return Err(SchemaError::MissingField(column.name.clone()));
                }
                Some(Value::Null) if !column.nullable => {
                    return Err(SchemaError::MissingField(column.name.clone()));
                }
                Some(value) => {
                    let bound =
                        column
                            .kind
                            .to_sql(&value)
                            .ok_or_else(|| SchemaError::TypeMismatch {
                                field: column.name.clone(),
                                expected: column.kind,
                            })?;
                    values.push((column.name.clone(), bound));
                }
                None => {}
            }
        }

        if let Some(field) = prepared.keys().next() {
            return Err(SchemaError::UnknownField(field.clone()));
        }

        Ok(PreparedFields { values })
    }

    /// Renders a stored row as the external payload.
    ///
    /// `deleted` is only present on deleted records.
    pub fn deserialize(&self, table: &TableDef, record: StoredRecord) -> Object {
        let meta = table.meta();
        let mut object = Object::new();
        object.insert(meta.id.clone(), Value::String(record.id));
        object.insert(
            meta.last_modified.clone(),
            Value::from(record.last_modified.as_millis()),
        );
        if record.deleted {
            object.insert(meta.deleted.clone(), Value::Bool(true));
        }
        for (field, value) in record.fields {
            object.insert(field, value);
        }
        object
    }

    fn run_field_preparers(&self, field: &str, value: Value) -> SchemaResult<Value> {
        let Some(preparers) = self.field_preparers.get(field) else {
            return Ok(value);
        };
        preparers.iter().try_fold(value, |current, preparer| {
            preparer(current).map_err(|reason| SchemaError::Preparer {
                field: Some(field.to_string()),
                reason,
            })
        })
    }
}

/// Minimal representation returned for deleted records.
pub fn deleted_stub(table: &TableDef, id: &str, last_modified: Timestamp) -> Object {
    let meta = table.meta();
    let mut object = Object::new();
    object.insert(meta.id.clone(), Value::String(id.to_string()));
    object.insert(
        meta.last_modified.clone(),
        Value::from(last_modified.as_millis()),
    );
    object.insert(meta.deleted.clone(), Value::Bool(true));
    object
}

/// Renders an identifier read from the id column.
pub fn id_to_string(kind: ColumnType, value: &Value) -> Option<String> {
    match (kind, value) {
        (_, Value::String(text)) => Some(text.clone()),
        (ColumnType::Integer, Value::Number(number)) => number.as_i64().map(|n| n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{RecordShape, ShapeMode, StoredRecord};
    use crate::model::timestamp::Timestamp;
    use crate::model::Object;
    use crate::schema::table::{ColumnDef, ColumnType, TableDef};
    use crate::schema::SchemaError;
    use rusqlite::types::Value as SqlValue;
    use serde_json::{json, Value};

    fn products() -> TableDef {
        TableDef::new("products")
            .column(ColumnDef::new("name", ColumnType::Text).required())
            .column(ColumnDef::new("price", ColumnType::Real))
    }

    fn payload(value: Value) -> Object {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn bound(prepared: &super::PreparedFields, field: &str) -> SqlValue {
        prepared
            .values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.clone())
            .unwrap()
    }

    fn upper(value: Value) -> Result<Value, String> {
        value
            .as_str()
            .map(|text| Value::String(text.to_uppercase()))
            .ok_or_else(|| "expected text".to_string())
    }

    fn suffix(mut object: Object) -> Result<Object, String> {
        if let Some(Value::String(name)) = object.get("name") {
            let renamed = format!("{name}-000");
            object.insert("name".to_string(), Value::String(renamed));
        }
        Ok(object)
    }

    #[test]
    fn field_preparer_applies_to_its_field() {
        let shape = RecordShape::new().field_preparer("name", upper);
        let prepared = shape
            .serialize(&products(), payload(json!({"name": "Name"})), ShapeMode::Full)
            .unwrap();
        assert_eq!(bound(&prepared, "name"), SqlValue::Text("NAME".to_string()));
    }

    #[test]
    fn global_preparer_runs_after_field_preparers() {
        let shape = RecordShape::new()
            .global_preparer(suffix)
            .field_preparer("name", upper);
        let prepared = shape
            .serialize(&products(), payload(json!({"name": "Name"})), ShapeMode::Full)
            .unwrap();
        assert_eq!(
            bound(&prepared, "name"),
            SqlValue::Text("NAME-000".to_string())
        );
    }

    #[test]
    fn field_preparers_chain_in_registration_order() {
        let shape = RecordShape::new()
            .field_preparer("name", upper)
            .field_preparer("name", |value| {
                Ok(Value::String(format!("<{}>", value.as_str().unwrap_or_default())))
            });
        let prepared = shape
            .serialize(&products(), payload(json!({"name": "x"})), ShapeMode::Full)
            .unwrap();
        assert_eq!(bound(&prepared, "name"), SqlValue::Text("<X>".to_string()));
    }

    #[test]
    fn every_field_gets_its_own_preparer() {
        let shape = RecordShape::new()
            .field_preparer("name", upper)
            .field_preparer("price", |value| {
                Ok(json!(value.as_f64().unwrap_or_default() * 2.0))
            })
            .global_preparer(|mut object| {
                let name = object["name"].as_str().unwrap_or_default().to_string();
                let price = object["price"].as_f64().unwrap_or_default();
                object.insert("name".to_string(), json!(format!("{name}-{price}")));
                Ok(object)
            });
        let prepared = shape
            .serialize(
                &products(),
                payload(json!({"name": "Name", "price": 50.0})),
                ShapeMode::Full,
            )
            .unwrap();
        assert_eq!(bound(&prepared, "price"), SqlValue::Real(100.0));
        assert_eq!(
            bound(&prepared, "name"),
            SqlValue::Text("NAME-100".to_string())
        );
    }

    #[test]
    fn preparer_rejection_names_the_field() {
        let shape = RecordShape::new().field_preparer("name", |_| Err("too short".to_string()));
        let err = shape
            .serialize(&products(), payload(json!({"name": "x"})), ShapeMode::Full)
            .unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }

    #[test]
    fn full_mode_requires_columns_and_partial_mode_does_not() {
        let shape = RecordShape::new();
        let table = products();

        let err = shape
            .serialize(&table, payload(json!({"price": 1.5})), ShapeMode::Full)
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingField("name".to_string()));

        let prepared = shape
            .serialize(&table, payload(json!({"price": 1.5})), ShapeMode::Partial)
            .unwrap();
        assert_eq!(prepared.values.len(), 1);

        let err = shape
            .serialize(&table, payload(json!({"name": null})), ShapeMode::Partial)
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingField("name".to_string()));
    }

    #[test]
    fn unknown_and_mistyped_fields_are_rejected() {
        let shape = RecordShape::new();
        let table = products();

        let err = shape
            .serialize(&table, payload(json!({"name": "a", "colour": "red"})), ShapeMode::Full)
            .unwrap_err();
        assert_eq!(err, SchemaError::UnknownField("colour".to_string()));

        let err = shape
            .serialize(&table, payload(json!({"name": 3})), ShapeMode::Full)
            .unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));
    }

    #[test]
    fn meta_fields_are_ignored_on_input_and_rendered_on_output() {
        let shape = RecordShape::new();
        let table = products();
        let prepared = shape
            .serialize(
                &table,
                payload(json!({"id": "9", "last_modified": 1, "deleted": true, "name": "a"})),
                ShapeMode::Full,
            )
            .unwrap();
        assert_eq!(prepared.values.len(), 1);

        let rendered = shape.deserialize(
            &table,
            StoredRecord {
                id: "9".to_string(),
                last_modified: Timestamp::from_millis(42),
                deleted: false,
                fields: vec![("name".to_string(), json!("a"))],
            },
        );
        assert_eq!(
            Value::Object(rendered),
            json!({"id": "9", "last_modified": 42, "name": "a"})
        );
    }
}
