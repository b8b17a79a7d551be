//! Entity metadata.

use ormql_proto::SqlType;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use super::filter::FilterBinding;
use super::property::PropertyMeta;

/// How an entity hierarchy is mapped onto tables. Declared on the hierarchy root.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub enum InheritanceStrategy {
    /// No mapped subclasses.
    #[default]
    None,
    /// All subclasses share the root table and are told apart by a discriminator.
    SingleTable,
    /// Every subclass has its own table keyed by the identifier.
    Joined,
}

/// Discriminator column of a hierarchy.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct Discriminator {
    pub column: String,
    pub ty: SqlType,
}

/// Discriminator value of one entity in a hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum DiscriminatorValue {
    /// SQL literal text, e.g. `'CAT'` or `2`.
    Literal(String),
    /// Rows whose discriminator column is null.
    Null,
    /// Rows whose discriminator column is not null.
    NotNull,
}

impl DiscriminatorValue {
    pub fn literal(text: impl Into<String>) -> Self {
        DiscriminatorValue::Literal(text.into())
    }

    /// Check if this is the null/not-null sentinel rather than a value.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, DiscriminatorValue::Literal(_))
    }
}

/// A mapped entity.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct EntityMeta {
    /// Entity name (unique within the schema).
    pub name: String,
    /// Primary table. Single-table subclasses repeat the root table.
    pub table: String,
    /// Name of the identifier property.
    pub id_property: String,
    /// Identifier columns in this entity's table; empty to inherit.
    pub id_columns: Vec<String>,
    pub id_type: SqlType,
    /// Properties declared on this entity, components flattened to dotted names.
    pub properties: Vec<PropertyMeta>,
    pub superclass: Option<String>,
    pub inheritance: InheritanceStrategy,
    pub discriminator: Option<Discriminator>,
    pub discriminator_value: Option<DiscriminatorValue>,
    /// Additional tables whose changes invalidate queries over this entity.
    pub synchronized_tables: Vec<String>,
    /// Dynamic filter conditions attached to this entity.
    pub filters: Vec<FilterBinding>,
}

impl EntityMeta {
    /// Create a new entity with an `id` identifier of type long.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            id_property: "id".to_string(),
            id_columns: vec!["id".to_string()],
            id_type: SqlType::Long,
            properties: Vec::new(),
            superclass: None,
            inheritance: InheritanceStrategy::None,
            discriminator: None,
            discriminator_value: None,
            synchronized_tables: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Set the identifier property.
    pub fn with_id(
        mut self,
        property: impl Into<String>,
        columns: Vec<&str>,
        ty: SqlType,
    ) -> Self {
        self.id_property = property.into();
        self.id_columns = columns.into_iter().map(String::from).collect();
        self.id_type = ty;
        self
    }

    /// Add a property.
    pub fn with_property(mut self, property: PropertyMeta) -> Self {
        self.properties.push(property);
        self
    }

    /// Add multiple properties.
    pub fn with_properties(mut self, properties: impl IntoIterator<Item = PropertyMeta>) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Declare this entity a subclass of `superclass`.
    ///
    /// The identifier is inherited unless set again with [`with_id`](Self::with_id).
    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self.id_columns.clear();
        self
    }

    /// Set the inheritance strategy of a hierarchy root.
    pub fn with_inheritance(mut self, strategy: InheritanceStrategy) -> Self {
        self.inheritance = strategy;
        self
    }

    /// Declare the discriminator column of a hierarchy root.
    pub fn with_discriminator(mut self, column: impl Into<String>, ty: SqlType) -> Self {
        self.discriminator = Some(Discriminator {
            column: column.into(),
            ty,
        });
        self
    }

    /// Set this entity's discriminator value.
    pub fn with_discriminator_value(mut self, value: DiscriminatorValue) -> Self {
        self.discriminator_value = Some(value);
        self
    }

    /// Add a synchronized table.
    pub fn with_synchronized_table(mut self, table: impl Into<String>) -> Self {
        self.synchronized_tables.push(table.into());
        self
    }

    /// Attach a dynamic filter condition.
    pub fn with_filter(mut self, binding: FilterBinding) -> Self {
        self.filters.push(binding);
        self
    }

    /// Get a property declared directly on this entity.
    pub fn get_property(&self, name: &str) -> Option<&PropertyMeta> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Unqualified entity name (`com.acme.Order` -> `Order`).
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_builder() {
        let cat = EntityMeta::new("Cat", "animal")
            .extends("Animal")
            .with_discriminator_value(DiscriminatorValue::literal("'CAT'"))
            .with_property(PropertyMeta::basic("lives", "lives", SqlType::Integer));

        assert_eq!(cat.superclass.as_deref(), Some("Animal"));
        assert!(cat.id_columns.is_empty());
        assert!(cat.get_property("lives").is_some());
        assert!(!cat.discriminator_value.unwrap().is_sentinel());
    }

    #[test]
    fn test_short_name() {
        let e = EntityMeta::new("com.acme.Order", "orders");
        assert_eq!(e.short_name(), "Order");
    }
}
