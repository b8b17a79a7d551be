//! Schema bundle - immutable snapshot of all mapping metadata.

use std::collections::HashMap;

use ormql_proto::SqlType;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use super::collection::CollectionMeta;
use super::entity::EntityMeta;
use super::facade::RelationCatalog;
use super::filter::FilterDef;
use super::function::{FunctionDef, FunctionRegistry};
use crate::error::{Result, SemanticError};

/// A statically known named constant (`Status.ACTIVE`, `MAX_ITEMS`).
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum ConstantValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Char(char),
    Str(String),
}

impl ConstantValue {
    /// Relational type inferred from the native value kind.
    pub fn sql_type(&self) -> SqlType {
        match self {
            ConstantValue::Bool(_) => SqlType::Boolean,
            ConstantValue::Int(_) => SqlType::Integer,
            ConstantValue::Long(_) => SqlType::Long,
            ConstantValue::Double(_) => SqlType::Double,
            ConstantValue::Char(_) => SqlType::Character,
            ConstantValue::Str(_) => SqlType::String,
        }
    }
}

/// A snapshot of the entire mapping catalog.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct SchemaBundle {
    /// Schema version (monotonically increasing).
    pub version: u64,
    /// Entities keyed by fully qualified name.
    pub entities: HashMap<String, EntityMeta>,
    /// Collections keyed by role.
    pub collections: HashMap<String, CollectionMeta>,
    /// Import names (unqualified or renamed) to entity names.
    pub imports: HashMap<String, String>,
    pub constants: HashMap<String, ConstantValue>,
    pub filters: HashMap<String, FilterDef>,
    pub functions: FunctionRegistry,
}

impl SchemaBundle {
    /// Create an empty schema with the standard function registry.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            entities: HashMap::new(),
            collections: HashMap::new(),
            imports: HashMap::new(),
            constants: HashMap::new(),
            filters: HashMap::new(),
            functions: FunctionRegistry::standard(),
        }
    }

    /// Add an entity. Qualified names are also imported under their short name.
    pub fn with_entity(mut self, entity: EntityMeta) -> Self {
        if entity.short_name() != entity.name {
            self.imports
                .insert(entity.short_name().to_string(), entity.name.clone());
        }
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Add a collection.
    pub fn with_collection(mut self, collection: CollectionMeta) -> Self {
        self.collections.insert(collection.role.clone(), collection);
        self
    }

    /// Import an entity under another name.
    pub fn with_import(mut self, name: impl Into<String>, entity: impl Into<String>) -> Self {
        self.imports.insert(name.into(), entity.into());
        self
    }

    /// Register a named constant.
    pub fn with_constant(mut self, name: impl Into<String>, value: ConstantValue) -> Self {
        self.constants.insert(name.into(), value);
        self
    }

    /// Register a filter definition.
    pub fn with_filter(mut self, filter: FilterDef) -> Self {
        self.filters.insert(filter.name.clone(), filter);
        self
    }

    /// Register a function.
    pub fn with_function(mut self, function: FunctionDef) -> Self {
        self.functions = self.functions.with(function);
        self
    }

    /// List all entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(|s| s.as_str()).collect()
    }

    /// Serialize the schema bundle to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| SemanticError::Catalog(e.to_string()))
    }

    /// Deserialize a schema bundle from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| SemanticError::Catalog(e.to_string()))
    }
}

impl Default for SchemaBundle {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RelationCatalog for SchemaBundle {
    fn find_entity(&self, name: &str) -> Option<&EntityMeta> {
        self.entities.get(name).or_else(|| {
            self.imports
                .get(name)
                .and_then(|target| self.entities.get(target))
        })
    }

    fn find_collection(&self, role: &str) -> Option<&CollectionMeta> {
        self.collections.get(role)
    }

    fn find_constant(&self, name: &str) -> Option<&ConstantValue> {
        self.constants.get(name)
    }

    fn find_filter(&self, name: &str) -> Option<&FilterDef> {
        self.filters.get(name)
    }

    fn find_function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    fn entities(&self) -> Vec<&EntityMeta> {
        let mut entities: Vec<&EntityMeta> = self.entities.values().collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PropertyMeta;

    fn sample_schema() -> SchemaBundle {
        let order = EntityMeta::new("com.acme.Order", "orders")
            .with_property(PropertyMeta::basic("total", "total", SqlType::BigDecimal))
            .with_property(PropertyMeta::collection("items", "com.acme.Order.items"));
        let item = EntityMeta::new("com.acme.LineItem", "line_item")
            .with_property(PropertyMeta::basic("name", "name", SqlType::String));
        let items = CollectionMeta::one_to_many(
            "com.acme.Order.items",
            "com.acme.Order",
            "com.acme.LineItem",
            "line_item",
            vec!["order_id"],
        );

        SchemaBundle::new(1)
            .with_entity(order)
            .with_entity(item)
            .with_collection(items)
            .with_constant("MAX_ITEMS", ConstantValue::Int(50))
    }

    #[test]
    fn test_imports_short_names() {
        let schema = sample_schema();
        assert_eq!(schema.find_entity("Order").unwrap().table, "orders");
        assert!(schema.find_entity("com.acme.Order").is_some());
        assert!(schema.find_entity("order").is_none());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let schema = sample_schema();
        let bytes = schema.to_bytes().unwrap();
        let restored = SchemaBundle::from_bytes(&bytes).unwrap();
        assert_eq!(schema, restored);
    }

    #[test]
    fn test_corrupt_snapshot_rejected() {
        let err = SchemaBundle::from_bytes(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Catalog);
    }

    #[test]
    fn test_constant_types() {
        assert_eq!(ConstantValue::Char('x').sql_type(), SqlType::Character);
        assert_eq!(ConstantValue::Long(1).sql_type(), SqlType::Long);
    }
}
