//! From-Elements: one joined relation within a scope.

use std::collections::BTreeSet;

use ormql_proto::{FromElementId, ScopeId};
use serde::{Deserialize, Serialize};

use super::sequence::JoinSequence;
use crate::alias::table_alias;

/// Lifecycle of a From-Element.
///
/// `Unresolved -> Joined` or `Unresolved -> Correlated`; the post-processor
/// may move `Joined -> Correlated`. Nothing changes after rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementState {
    Unresolved,
    /// Rendered as an ANSI join.
    Joined,
    /// Rendered as a theta-style table reference.
    Correlated,
}

/// How the element appears in the FROM clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentKind {
    /// A comma-separated table reference.
    FromFragment,
    /// A `join .. on ..` appended to its origin.
    JoinFragment,
}

/// The relation an element stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementRelation {
    Entity { name: String },
    /// A collection; `element_entity` is set for entity collections unless
    /// the element only covers the link table.
    Collection {
        role: String,
        element_entity: Option<String>,
    },
}

/// Final FROM/WHERE text of an element.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderedFragment {
    pub from_text: String,
    pub where_text: String,
}

/// One joined table or relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromElement {
    pub id: FromElementId,
    pub scope: ScopeId,
    /// Generated SQL alias of the element's primary table.
    pub alias: String,
    /// Alias given in the query text.
    pub class_alias: Option<String>,
    /// Primary table.
    pub table: String,
    pub relation: ElementRelation,
    /// The join was synthesized from a path expression.
    pub implied: bool,
    pub include_subclasses: bool,
    /// Render the full superclass table chain even when not referenced.
    pub use_from_fragment: bool,
    /// Render outer-join steps; disabled for bulk statement targets.
    pub use_outer_join_fragment: bool,
    pub fragment: FragmentKind,
    pub state: ElementState,
    pub sequence: JoinSequence,
    pub origin: Option<FromElementId>,
    /// The edge from the origin goes through a link table.
    pub many_to_many: bool,
    /// Alias of the collection's own table (the link table of a many-to-many).
    pub collection_table_alias: Option<String>,
    /// Navigation path this element was created for.
    pub path: Option<String>,
    /// Created by indexed access (`items[0]`); denotes a single element.
    pub indexed: bool,
    /// Dereferenced by a property that only a subclass declares.
    pub subclass_property_ref: bool,
    /// Indexes into the table closure of tables some expression references.
    pub referenced_tables: BTreeSet<usize>,
    pub all_tables_referenced: bool,
    /// Target of a bulk update/delete.
    pub dml_target: bool,
    pub rendered: Option<RenderedFragment>,
}

impl FromElement {
    /// A new element with defaults for a root entity reference.
    pub fn new(
        scope: ScopeId,
        alias: impl Into<String>,
        table: impl Into<String>,
        relation: ElementRelation,
    ) -> Self {
        Self {
            id: FromElementId(0),
            scope,
            alias: alias.into(),
            class_alias: None,
            table: table.into(),
            relation,
            implied: false,
            include_subclasses: true,
            use_from_fragment: false,
            use_outer_join_fragment: true,
            fragment: FragmentKind::FromFragment,
            state: ElementState::Unresolved,
            sequence: JoinSequence::new(),
            origin: None,
            many_to_many: false,
            collection_table_alias: None,
            path: None,
            indexed: false,
            subclass_property_ref: false,
            referenced_tables: BTreeSet::new(),
            all_tables_referenced: false,
            dml_target: false,
            rendered: None,
        }
    }

    /// Entity whose tables this element's alias covers.
    pub fn entity_name(&self) -> Option<&str> {
        match &self.relation {
            ElementRelation::Entity { name } => Some(name),
            ElementRelation::Collection { element_entity, .. } => element_entity.as_deref(),
        }
    }

    pub fn role(&self) -> Option<&str> {
        match &self.relation {
            ElementRelation::Collection { role, .. } => Some(role),
            ElementRelation::Entity { .. } => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.relation, ElementRelation::Collection { .. })
    }

    /// Alias of table `index` in this element's table closure.
    pub fn table_alias(&self, index: usize) -> String {
        table_alias(&self.alias, index)
    }

    /// Alias naming the collection's own table.
    pub fn collection_alias(&self) -> &str {
        self.collection_table_alias.as_deref().unwrap_or(&self.alias)
    }

    /// Record that an expression references table `index`.
    pub fn reference_table(&mut self, index: usize) {
        self.referenced_tables.insert(index);
    }

    /// Record that every table of the element is referenced.
    pub fn reference_all_tables(&mut self) {
        self.all_tables_referenced = true;
    }

    pub fn is_table_referenced(&self, index: usize) -> bool {
        self.all_tables_referenced || self.referenced_tables.contains(&index)
    }

    /// Name used in diagnostics: the query alias, else the path, else the alias.
    pub fn display_name(&self) -> &str {
        self.class_alias
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or(&self.alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_element_accessors() {
        let mut element = FromElement::new(
            ScopeId::ROOT,
            "product2_",
            "product",
            ElementRelation::Collection {
                role: "Order.products".into(),
                element_entity: Some("Product".into()),
            },
        );
        element.collection_table_alias = Some("products1_".into());

        assert!(element.is_collection());
        assert_eq!(element.entity_name(), Some("Product"));
        assert_eq!(element.role(), Some("Order.products"));
        assert_eq!(element.collection_alias(), "products1_");
        assert_eq!(element.table_alias(1), "product2_1_");
    }

    #[test]
    fn test_referenced_tables() {
        let mut element = FromElement::new(
            ScopeId::ROOT,
            "person0_",
            "person",
            ElementRelation::Entity {
                name: "Person".into(),
            },
        );
        element.reference_table(1);
        assert!(element.is_table_referenced(1));
        assert!(!element.is_table_referenced(2));
        element.reference_all_tables();
        assert!(element.is_table_referenced(2));
    }
}
