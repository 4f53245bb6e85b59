//! Per-collection composition of table layout, record shape and id strategy.

use super::shape::RecordShape;
use super::table::{ColumnType, TableDef};
use super::{SchemaError, SchemaResult};
use crate::db::migrations::SHARED_TABLES;
use crate::storage::id_generator::{IdGenerator, IntegerId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything the engine needs to store one collection.
#[derive(Debug, Clone)]
pub struct CollectionBinding {
    collection_id: String,
    table: TableDef,
    shape: RecordShape,
    id_generator: Arc<dyn IdGenerator>,
}

impl CollectionBinding {
    /// Binds `collection_id` to `table` with no preparers and integer ids.
    pub fn new(collection_id: impl Into<String>, table: TableDef) -> Self {
        Self {
            collection_id: collection_id.into(),
            table,
            shape: RecordShape::default(),
            id_generator: Arc::new(IntegerId),
        }
    }

    pub fn with_shape(mut self, shape: RecordShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_id_generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Arc::new(generator);
        self
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    pub fn table(&self) -> &TableDef {
        &self.table
    }

    pub fn shape(&self) -> &RecordShape {
        &self.shape
    }

    pub fn id_generator(&self) -> &dyn IdGenerator {
        self.id_generator.as_ref()
    }

    pub fn id_type(&self) -> ColumnType {
        self.id_generator.column_type()
    }

    fn validate(&self) -> SchemaResult<()> {
        if self.collection_id.trim().is_empty() {
            return Err(SchemaError::InvalidIdentifier(self.collection_id.clone()));
        }
        self.table.validate()?;
        for field in self.shape.prepared_fields() {
            if self.table.find_column(field).is_none() {
                return Err(SchemaError::UnknownField(field.to_string()));
            }
        }
        Ok(())
    }
}

/// Registered collections, keyed by collection id.
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    bindings: BTreeMap<String, CollectionBinding>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one collection after validating its layout and preparers.
    pub fn register(&mut self, binding: CollectionBinding) -> SchemaResult<()> {
        binding.validate()?;

        let collection_id = binding.collection_id().to_string();
        if self.bindings.contains_key(&collection_id) {
            return Err(SchemaError::DuplicateCollection(collection_id));
        }

        let table_name = binding.table().name();
        let taken_by_collection = self
            .bindings
            .values()
            .any(|existing| existing.table().name() == table_name);
        if taken_by_collection || SHARED_TABLES.contains(&table_name) {
            return Err(SchemaError::DuplicateTable(table_name.to_string()));
        }

        self.bindings.insert(collection_id, binding);
        Ok(())
    }

    /// Builder-style `register`.
    pub fn with(mut self, binding: CollectionBinding) -> SchemaResult<Self> {
        self.register(binding)?;
        Ok(self)
    }

    pub fn get(&self, collection_id: &str) -> Option<&CollectionBinding> {
        self.bindings.get(collection_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionBinding> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
