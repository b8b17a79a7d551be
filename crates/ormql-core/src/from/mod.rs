//! Logical path model: From-Clauses, From-Elements and their join sequences.
//!
//! Elements of every scope live in one arena owned by [`FromTree`] and are
//! addressed by [`FromElementId`]; a clause only stores ids.

mod clause;
mod element;
mod sequence;

use std::collections::BTreeSet;

use ormql_proto::{FromElementId, NodeId, ScopeId, Statement};

pub use clause::FromClause;
pub use element::{ElementRelation, ElementState, FragmentKind, FromElement, RenderedFragment};
pub use sequence::{column_pairs, ColumnPair, JoinRoot, JoinSequence, JoinStep, PendingCondition};

use crate::alias::AliasGenerator;
use crate::error::{Result, SemanticError};

/// The clauses of every scope of a statement and the element arena.
#[derive(Debug, Clone, Default)]
pub struct FromTree {
    clauses: Vec<FromClause>,
    elements: Vec<FromElement>,
}

impl FromTree {
    /// Create one empty clause per scope of `statement`.
    pub fn new(statement: &Statement) -> Self {
        Self {
            clauses: statement
                .scopes
                .iter()
                .map(|s| FromClause::new(s.id, s.parent))
                .collect(),
            elements: Vec::new(),
        }
    }

    pub fn clause(&self, scope: ScopeId) -> &FromClause {
        &self.clauses[scope.index()]
    }

    pub fn element(&self, id: FromElementId) -> &FromElement {
        &self.elements[id.index()]
    }

    pub fn element_mut(&mut self, id: FromElementId) -> &mut FromElement {
        &mut self.elements[id.index()]
    }

    pub fn elements(&self) -> &[FromElement] {
        &self.elements
    }

    /// Element ids of a scope in creation order.
    pub fn element_ids(&self, scope: ScopeId) -> Vec<FromElementId> {
        self.clause(scope).elements.clone()
    }

    /// Add an element to its scope and return its id.
    pub fn add_element(&mut self, mut element: FromElement) -> FromElementId {
        let id = FromElementId(self.elements.len() as u32);
        element.id = id;
        let scope = element.scope;
        self.elements.push(element);
        self.clauses[scope.index()].add_element(id);
        id
    }

    /// Register a query alias; aliases must be unique within a scope.
    pub fn register_alias(&mut self, scope: ScopeId, alias: &str, id: FromElementId) -> Result<()> {
        if self.clause(scope).find_element_by_alias(alias).is_some() {
            return Err(SemanticError::DuplicateAlias(alias.to_string()));
        }
        self.clauses[scope.index()].register_alias(alias, id);
        self.elements[id.index()].class_alias = Some(alias.to_string());
        Ok(())
    }

    /// Memoize the element created for a navigation path.
    pub fn register_path(&mut self, scope: ScopeId, path: &str, id: FromElementId) {
        self.clauses[scope.index()].register_path(path, id);
    }

    /// `scope` followed by its enclosing scopes, innermost first.
    pub fn scope_chain(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![scope];
        let mut current = self.clause(scope).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.clause(parent).parent;
        }
        chain
    }

    /// Find an element by query alias in `scope` or an enclosing scope.
    pub fn find_element_by_alias(&self, scope: ScopeId, alias: &str) -> Option<FromElementId> {
        self.scope_chain(scope)
            .into_iter()
            .find_map(|s| self.clause(s).find_element_by_alias(alias))
    }

    /// Find a memoized path in `scope` or an enclosing scope.
    pub fn find_element_by_path(&self, scope: ScopeId, path: &str) -> Option<FromElementId> {
        self.scope_chain(scope)
            .into_iter()
            .find_map(|s| self.clause(s).find_element_by_path(path))
    }

    /// Consume the tree, returning the element arena.
    pub fn into_elements(self) -> Vec<FromElement> {
        self.elements
    }
}

/// A select item standing for a whole entity element. Its property
/// columns are added once the element's subclass tables are decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub scope: ScopeId,
    pub node: NodeId,
    pub element: FromElementId,
}

/// Mutable state of one compilation unit.
#[derive(Debug, Default)]
pub struct PlanState {
    pub aliases: AliasGenerator,
    pub from: FromTree,
    /// Every table the statement touches.
    pub query_spaces: BTreeSet<String>,
    pub projections: Vec<Projection>,
}

impl PlanState {
    pub fn new(statement: &Statement) -> Self {
        Self {
            aliases: AliasGenerator::new(),
            from: FromTree::new(statement),
            query_spaces: BTreeSet::new(),
            projections: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_element(scope: ScopeId, alias: &str) -> FromElement {
        FromElement::new(
            scope,
            alias,
            "orders",
            ElementRelation::Entity {
                name: "Order".into(),
            },
        )
    }

    #[test]
    fn test_alias_lookup_walks_enclosing_scopes() {
        let mut statement = Statement::select();
        let sub = statement.add_subquery(ScopeId::ROOT);
        let mut tree = FromTree::new(&statement);

        let outer = tree.add_element(entity_element(ScopeId::ROOT, "order0_"));
        tree.register_alias(ScopeId::ROOT, "o", outer).unwrap();

        assert_eq!(tree.find_element_by_alias(sub, "o"), Some(outer));
        assert_eq!(tree.clause(sub).find_element_by_alias("o"), None);
        assert_eq!(tree.scope_chain(sub), vec![sub, ScopeId::ROOT]);
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let statement = Statement::select();
        let mut tree = FromTree::new(&statement);
        let a = tree.add_element(entity_element(ScopeId::ROOT, "order0_"));
        let b = tree.add_element(entity_element(ScopeId::ROOT, "order1_"));

        tree.register_alias(ScopeId::ROOT, "o", a).unwrap();
        assert_eq!(
            tree.register_alias(ScopeId::ROOT, "o", b),
            Err(SemanticError::DuplicateAlias("o".into()))
        );
    }

    #[test]
    fn test_element_ids_assigned_in_order() {
        let statement = Statement::select();
        let mut tree = FromTree::new(&statement);
        let a = tree.add_element(entity_element(ScopeId::ROOT, "order0_"));
        let b = tree.add_element(entity_element(ScopeId::ROOT, "order1_"));
        assert_eq!(tree.element(b).id, b);
        assert_eq!(tree.element_ids(ScopeId::ROOT), vec![a, b]);
    }
}
