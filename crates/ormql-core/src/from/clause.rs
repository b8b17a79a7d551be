//! From-Clauses: the join scope of one query or subquery.

use std::collections::HashMap;

use ormql_proto::{FromElementId, ScopeId};
use serde::{Deserialize, Serialize};

/// Elements of one scope, with alias and navigation-path indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromClause {
    pub scope: ScopeId,
    pub parent: Option<ScopeId>,
    /// Elements in creation order.
    pub elements: Vec<FromElementId>,
    aliases: HashMap<String, FromElementId>,
    paths: HashMap<String, FromElementId>,
}

impl FromClause {
    pub fn new(scope: ScopeId, parent: Option<ScopeId>) -> Self {
        Self {
            scope,
            parent,
            elements: Vec::new(),
            aliases: HashMap::new(),
            paths: HashMap::new(),
        }
    }

    pub fn is_subquery(&self) -> bool {
        self.parent.is_some()
    }

    /// Find an element of this scope by query alias.
    pub fn find_element_by_alias(&self, alias: &str) -> Option<FromElementId> {
        self.aliases.get(alias).copied()
    }

    /// Find the element memoized for a navigation path.
    pub fn find_element_by_path(&self, path: &str) -> Option<FromElementId> {
        self.paths.get(path).copied()
    }

    pub(crate) fn add_element(&mut self, id: FromElementId) {
        self.elements.push(id);
    }

    pub(crate) fn register_alias(&mut self, alias: impl Into<String>, id: FromElementId) {
        self.aliases.insert(alias.into(), id);
    }

    pub(crate) fn register_path(&mut self, path: impl Into<String>, id: FromElementId) {
        self.paths.insert(path.into(), id);
    }

    /// The first element, which unqualified property references bind to.
    pub fn first_element(&self) -> Option<FromElementId> {
        self.elements.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_and_path_indexes() {
        let mut clause = FromClause::new(ScopeId(1), Some(ScopeId::ROOT));
        clause.add_element(FromElementId(3));
        clause.register_alias("o", FromElementId(3));
        clause.register_path("o.customer", FromElementId(4));

        assert!(clause.is_subquery());
        assert_eq!(clause.find_element_by_alias("o"), Some(FromElementId(3)));
        assert_eq!(clause.find_element_by_path("o.customer"), Some(FromElementId(4)));
        assert_eq!(clause.find_element_by_path("o.items"), None);
        assert_eq!(clause.first_element(), Some(FromElementId(3)));
    }
}
