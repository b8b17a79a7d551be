//! Read-only lookup service over mapping metadata.
//!
//! Implementors provide the raw lookups; everything the resolver needs is
//! derived from them by the provided methods, so any metadata source can back
//! a compilation.

use ormql_proto::SqlType;
use serde::{Deserialize, Serialize};

use super::collection::CollectionMeta;
use super::entity::{Discriminator, DiscriminatorValue, EntityMeta, InheritanceStrategy};
use super::filter::FilterDef;
use super::function::FunctionDef;
use super::property::{PropertyKind, PropertyMeta};
use super::schema::ConstantValue;
use crate::alias::table_alias;
use crate::error::{Result, SemanticError};

/// Role of a table in an entity's table closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableRole {
    Own,
    Superclass,
    Subclass,
}

/// One table an entity's rows may span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub table: String,
    pub entity: String,
    /// Identifier columns of this table.
    pub key_columns: Vec<String>,
    pub role: TableRole,
}

/// Result of a property lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyLookup {
    pub property: PropertyMeta,
    /// Entity that declares the property.
    pub declaring_entity: String,
    /// The property exists only on a subclass of the queried entity.
    pub subclass_only: bool,
}

/// Lookup service for entity and collection metadata.
///
/// Lookups are case-sensitive. `find_*` lookups never fail; `require_*`
/// variants report unmapped names as errors.
pub trait RelationCatalog: Send + Sync {
    fn find_entity(&self, name: &str) -> Option<&EntityMeta>;

    fn find_collection(&self, role: &str) -> Option<&CollectionMeta>;

    fn find_constant(&self, name: &str) -> Option<&ConstantValue>;

    fn find_filter(&self, name: &str) -> Option<&FilterDef>;

    fn find_function(&self, name: &str) -> Option<&FunctionDef>;

    /// All entities, in a stable order.
    fn entities(&self) -> Vec<&EntityMeta>;

    fn require_entity(&self, name: &str) -> Result<&EntityMeta> {
        self.find_entity(name)
            .ok_or_else(|| SemanticError::UnmappedEntity(name.to_string()))
    }

    fn require_collection(&self, role: &str) -> Result<&CollectionMeta> {
        self.find_collection(role)
            .ok_or_else(|| SemanticError::UnknownCollection(role.to_string()))
    }

    fn is_entity_name(&self, name: &str) -> bool {
        self.find_entity(name).is_some()
    }

    /// Return type of `name` called with a first argument of type `arg`.
    fn resolve_function_return_type(
        &self,
        name: &str,
        arg: Option<&SqlType>,
    ) -> Result<Option<SqlType>> {
        self.find_function(name)
            .map(|f| f.return_type(arg))
            .ok_or_else(|| SemanticError::UnknownFunction(name.to_string()))
    }

    /// Superclasses of `entity`, nearest first.
    fn superclasses(&self, entity: &str) -> Result<Vec<&EntityMeta>> {
        let mut chain = Vec::new();
        let mut current = self.require_entity(entity)?;
        while let Some(parent) = &current.superclass {
            if parent == entity || chain.iter().any(|e: &&EntityMeta| &e.name == parent) {
                return Err(SemanticError::Catalog(format!(
                    "cyclic inheritance through '{}'",
                    parent
                )));
            }
            current = self.require_entity(parent)?;
            chain.push(current);
        }
        Ok(chain)
    }

    /// All transitive subclasses of `entity`, breadth first.
    fn subclasses(&self, entity: &str) -> Vec<&EntityMeta> {
        let all = self.entities();
        let mut out: Vec<&EntityMeta> = Vec::new();
        let mut frontier = vec![entity.to_string()];
        while let Some(parent) = frontier.pop() {
            for candidate in all
                .iter()
                .copied()
                .filter(|e| e.superclass.as_deref() == Some(parent.as_str()))
            {
                // cyclic chains
                if candidate.name == entity || out.iter().any(|e| e.name == candidate.name) {
                    continue;
                }
                frontier.insert(0, candidate.name.clone());
                out.push(candidate);
            }
        }
        out
    }

    /// The hierarchy root of `entity`.
    fn hierarchy_root(&self, entity: &str) -> Result<&EntityMeta> {
        let own = self.require_entity(entity)?;
        Ok(self.superclasses(entity)?.pop().unwrap_or(own))
    }

    fn inheritance(&self, entity: &str) -> Result<InheritanceStrategy> {
        Ok(self.hierarchy_root(entity)?.inheritance)
    }

    /// Identifier columns, inherited from the nearest declaring superclass.
    fn identifier_columns(&self, entity: &str) -> Result<Vec<String>> {
        let own = self.require_entity(entity)?;
        if !own.id_columns.is_empty() {
            return Ok(own.id_columns.clone());
        }
        Ok(self
            .superclasses(entity)?
            .into_iter()
            .find(|e| !e.id_columns.is_empty())
            .map(|e| e.id_columns.clone())
            .unwrap_or_default())
    }

    /// Identifier property name and type of the hierarchy.
    fn identifier(&self, entity: &str) -> Result<(String, SqlType)> {
        let root = self.hierarchy_root(entity)?;
        Ok((root.id_property.clone(), root.id_type.clone()))
    }

    /// Discriminator column of the hierarchy `entity` belongs to.
    fn discriminator(&self, entity: &str) -> Result<Option<Discriminator>> {
        let own = self.require_entity(entity)?;
        if let Some(d) = &own.discriminator {
            return Ok(Some(d.clone()));
        }
        Ok(self
            .superclasses(entity)?
            .into_iter()
            .find_map(|e| e.discriminator.clone()))
    }

    /// Tables an entity's rows may span: own table first, then superclass
    /// tables nearest first, then subclass tables.
    fn table_closure(&self, entity: &str) -> Result<Vec<TableRef>> {
        let own = self.require_entity(entity)?;
        let mut tables = vec![TableRef {
            table: own.table.clone(),
            entity: own.name.clone(),
            key_columns: self.identifier_columns(entity)?,
            role: TableRole::Own,
        }];
        let related = self
            .superclasses(entity)?
            .into_iter()
            .map(|e| (e, TableRole::Superclass))
            .chain(
                self.subclasses(entity)
                    .into_iter()
                    .map(|e| (e, TableRole::Subclass)),
            );
        for (meta, role) in related {
            if tables.iter().any(|t| t.table == meta.table) {
                continue;
            }
            tables.push(TableRef {
                table: meta.table.clone(),
                entity: meta.name.clone(),
                key_columns: self.identifier_columns(&meta.name)?,
                role,
            });
        }
        Ok(tables)
    }

    /// Check if rows of `entity` span more than one table.
    fn is_multi_table(&self, entity: &str) -> Result<bool> {
        Ok(self.table_closure(entity)?.len() > 1)
    }

    /// Find a property on `entity`, its superclasses, or its subclasses.
    ///
    /// The identifier property (and `id`) and `class` (the discriminator)
    /// are always available.
    fn find_property(&self, entity: &str, name: &str) -> Result<PropertyLookup> {
        let own = self.require_entity(entity)?;
        let (id_property, id_type) = self.identifier(entity)?;
        if name == id_property || name == "id" {
            return Ok(PropertyLookup {
                property: PropertyMeta {
                    name: name.to_string(),
                    columns: self.identifier_columns(entity)?,
                    kind: PropertyKind::Basic(id_type),
                },
                declaring_entity: own.name.clone(),
                subclass_only: false,
            });
        }
        if name == "class" {
            if let Some(d) = self.discriminator(entity)? {
                return Ok(PropertyLookup {
                    property: PropertyMeta::basic("class", d.column, d.ty),
                    declaring_entity: self.hierarchy_root(entity)?.name.clone(),
                    subclass_only: false,
                });
            }
        }

        let inherited = std::iter::once(own).chain(self.superclasses(entity)?);
        for meta in inherited {
            if let Some(p) = meta.get_property(name) {
                return Ok(PropertyLookup {
                    property: p.clone(),
                    declaring_entity: meta.name.clone(),
                    subclass_only: false,
                });
            }
        }
        for meta in self.subclasses(entity) {
            if let Some(p) = meta.get_property(name) {
                return Ok(PropertyLookup {
                    property: p.clone(),
                    declaring_entity: meta.name.clone(),
                    subclass_only: true,
                });
            }
        }
        Err(SemanticError::unknown_property(entity, name))
    }

    /// Position of `declaring_entity`'s table in `entity`'s table closure.
    fn table_index(&self, entity: &str, declaring_entity: &str) -> Result<usize> {
        let table = &self.require_entity(declaring_entity)?.table;
        Ok(self
            .table_closure(entity)?
            .iter()
            .position(|t| &t.table == table)
            .unwrap_or(0))
    }

    /// Columns of `property_path` on `entity`, qualified by the table alias
    /// derived from `alias`.
    fn columns_for(&self, entity: &str, alias: &str, property_path: &str) -> Result<Vec<String>> {
        let lookup = self.find_property(entity, property_path)?;
        let index = self.table_index(entity, &lookup.declaring_entity)?;
        let qualifier = table_alias(alias, index);
        Ok(lookup
            .property
            .columns
            .iter()
            .map(|c| format!("{}.{}", qualifier, c))
            .collect())
    }

    /// Number of columns a value of type `ty` spans.
    fn column_span(&self, ty: &SqlType) -> usize {
        match ty {
            SqlType::Entity(name) => self
                .identifier_columns(name)
                .map(|c| c.len().max(1))
                .unwrap_or(1),
            SqlType::Component { columns, .. } => (*columns as usize).max(1),
            _ => 1,
        }
    }

    /// Discriminator restriction selecting rows of `entity` in a single-table
    /// hierarchy, qualified by `alias`.
    ///
    /// `None` for hierarchy roots and for table-per-subclass mappings, whose
    /// rows are already selected by their tables.
    fn filter_fragment(
        &self,
        entity: &str,
        alias: &str,
        include_subclasses: bool,
    ) -> Result<Option<String>> {
        let own = self.require_entity(entity)?;
        if own.superclass.is_none() || self.inheritance(entity)? != InheritanceStrategy::SingleTable {
            return Ok(None);
        }
        let Some(discriminator) = self.discriminator(entity)? else {
            return Ok(None);
        };
        let column = format!("{}.{}", alias, discriminator.column);

        match &own.discriminator_value {
            None => Ok(None),
            Some(DiscriminatorValue::Null) => Ok(Some(format!("{} is null", column))),
            Some(DiscriminatorValue::NotNull) => Ok(Some(format!("{} is not null", column))),
            Some(DiscriminatorValue::Literal(value)) => {
                let mut values = vec![value.clone()];
                if include_subclasses {
                    for sub in self.subclasses(entity) {
                        if let Some(DiscriminatorValue::Literal(v)) = &sub.discriminator_value {
                            values.push(v.clone());
                        }
                    }
                }
                if values.len() == 1 {
                    Ok(Some(format!("{} = {}", column, values[0])))
                } else {
                    Ok(Some(format!("{} in ({})", column, values.join(", "))))
                }
            }
        }
    }

    /// Tables touched by queries over `entity`.
    fn query_spaces(&self, entity: &str) -> Result<Vec<String>> {
        let own = self.require_entity(entity)?;
        let mut spaces: Vec<String> = self
            .table_closure(entity)?
            .into_iter()
            .map(|t| t.table)
            .collect();
        spaces.extend(own.synchronized_tables.iter().cloned());
        Ok(spaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CollectionMeta, SchemaBundle};

    fn hierarchy() -> SchemaBundle {
        let animal = EntityMeta::new("Animal", "animal")
            .with_inheritance(InheritanceStrategy::SingleTable)
            .with_discriminator("kind", SqlType::String)
            .with_property(PropertyMeta::basic("name", "name", SqlType::String));
        let cat = EntityMeta::new("Cat", "animal")
            .extends("Animal")
            .with_discriminator_value(DiscriminatorValue::literal("'CAT'"))
            .with_property(PropertyMeta::basic("lives", "lives", SqlType::Integer));
        let lion = EntityMeta::new("Lion", "animal")
            .extends("Cat")
            .with_discriminator_value(DiscriminatorValue::literal("'LION'"));

        let person = EntityMeta::new("Person", "person")
            .with_inheritance(InheritanceStrategy::Joined)
            .with_property(PropertyMeta::basic("name", "name", SqlType::String));
        let employee = EntityMeta::new("Employee", "employee")
            .extends("Person")
            .with_id("id", vec!["person_id"], SqlType::Long)
            .with_property(PropertyMeta::basic("salary", "salary", SqlType::BigDecimal));
        let addresses = CollectionMeta::scalars(
            "Person.nicknames",
            "Person",
            "nickname",
            vec!["person_id"],
            "value",
            SqlType::String,
        );

        SchemaBundle::new(1)
            .with_entity(animal)
            .with_entity(cat)
            .with_entity(lion)
            .with_entity(person)
            .with_entity(employee)
            .with_collection(addresses)
    }

    #[test]
    fn test_require_unknown_fails() {
        let schema = hierarchy();
        let err = schema.require_entity("Dog").unwrap_err();
        assert_eq!(err, SemanticError::UnmappedEntity("Dog".into()));
        assert!(schema.require_collection("Person.friends").is_err());
        assert!(!schema.is_entity_name("Dog"));
    }

    #[test]
    fn test_cyclic_inheritance_fails() {
        let schema = SchemaBundle::new(1)
            .with_entity(EntityMeta::new("Left", "left_t").extends("Right"))
            .with_entity(EntityMeta::new("Right", "right_t").extends("Left"));
        let err = schema.superclasses("Left").unwrap_err();
        assert!(matches!(err, SemanticError::Catalog(_)));
        assert_eq!(schema.subclasses("Left").len(), 1);
    }

    #[test]
    fn test_property_lookup_walks_hierarchy() {
        let schema = hierarchy();

        let inherited = schema.find_property("Lion", "name").unwrap();
        assert_eq!(inherited.declaring_entity, "Animal");
        assert!(!inherited.subclass_only);

        let sub = schema.find_property("Animal", "lives").unwrap();
        assert_eq!(sub.declaring_entity, "Cat");
        assert!(sub.subclass_only);

        let id = schema.find_property("Employee", "id").unwrap();
        assert_eq!(id.property.columns, vec!["person_id".to_string()]);

        assert!(schema.find_property("Animal", "wings").is_err());
    }

    #[test]
    fn test_table_closure() {
        let schema = hierarchy();

        let person = schema.table_closure("Person").unwrap();
        assert_eq!(person.len(), 2);
        assert_eq!(person[1].role, TableRole::Subclass);
        assert_eq!(person[1].key_columns, vec!["person_id".to_string()]);

        let employee = schema.table_closure("Employee").unwrap();
        assert_eq!(employee[0].table, "employee");
        assert_eq!(employee[1].role, TableRole::Superclass);

        assert!(!schema.is_multi_table("Cat").unwrap());
        assert!(schema.is_multi_table("Person").unwrap());
    }

    #[test]
    fn test_columns_for_qualifies_by_table() {
        let schema = hierarchy();
        assert_eq!(
            schema.columns_for("Employee", "employee0_", "name").unwrap(),
            vec!["employee0_1_.name".to_string()]
        );
        assert_eq!(
            schema.columns_for("Employee", "employee0_", "salary").unwrap(),
            vec!["employee0_.salary".to_string()]
        );
    }

    #[test]
    fn test_filter_fragment() {
        let schema = hierarchy();
        assert_eq!(schema.filter_fragment("Animal", "a", true).unwrap(), None);
        assert_eq!(
            schema.filter_fragment("Cat", "cat0_", true).unwrap().unwrap(),
            "cat0_.kind in ('CAT', 'LION')"
        );
        assert_eq!(
            schema.filter_fragment("Cat", "cat0_", false).unwrap().unwrap(),
            "cat0_.kind = 'CAT'"
        );
        assert_eq!(schema.filter_fragment("Employee", "e", true).unwrap(), None);
    }

    #[test]
    fn test_column_span() {
        let schema = hierarchy();
        assert_eq!(schema.column_span(&SqlType::Entity("Cat".into())), 1);
        assert_eq!(
            schema.column_span(&SqlType::Component {
                name: "Money".into(),
                columns: 2
            }),
            2
        );
    }

    #[test]
    fn test_function_resolution() {
        let schema = hierarchy();
        assert_eq!(
            schema
                .resolve_function_return_type("count", None)
                .unwrap(),
            Some(SqlType::Long)
        );
        assert_eq!(
            schema.resolve_function_return_type("frobnicate", None),
            Err(SemanticError::UnknownFunction("frobnicate".into()))
        );
    }
}
