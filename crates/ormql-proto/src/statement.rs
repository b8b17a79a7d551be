//! Statement and scope descriptors.

use serde::{Deserialize, Serialize};

use crate::ast::{NodeId, QueryTree, ScopeId};
use crate::span::Span;

/// Kind of top-level statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    Select,
    Update,
    Delete,
}

impl StatementKind {
    /// Check if this is a bulk update or delete.
    pub fn is_dml(self) -> bool {
        !matches!(self, StatementKind::Select)
    }
}

/// Join type of a join step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JoinKind {
    #[default]
    Inner,
    LeftOuter,
    RightOuter,
    Full,
    /// Cartesian product; the condition goes to the WHERE clause.
    Theta,
}

impl JoinKind {
    /// SQL keyword for an ANSI join of this kind.
    pub fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "inner join",
            JoinKind::LeftOuter => "left outer join",
            JoinKind::RightOuter => "right outer join",
            JoinKind::Full => "full join",
            JoinKind::Theta => ",",
        }
    }

    pub fn is_outer(self) -> bool {
        matches!(
            self,
            JoinKind::LeftOuter | JoinKind::RightOuter | JoinKind::Full
        )
    }
}

/// A declaration in a FROM clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FromDecl {
    /// `from Order o`
    Entity {
        name: String,
        alias: Option<String>,
        span: Span,
    },
    /// `join o.items i with i.quantity > 1`
    Join {
        path: String,
        alias: Option<String>,
        kind: JoinKind,
        with: Option<NodeId>,
        span: Span,
    },
}

/// One query scope: the outer query or a subquery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub from: Vec<FromDecl>,
    pub select: Vec<NodeId>,
    pub where_clause: Option<NodeId>,
}

impl QuerySpec {
    pub fn is_subquery(&self) -> bool {
        self.parent.is_some()
    }
}

/// `SET target = value` in a bulk update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub target: NodeId,
    pub value: NodeId,
}

/// A parsed statement: the node arena plus its scopes.
///
/// Scope 0 is always the outermost query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub tree: QueryTree,
    pub scopes: Vec<QuerySpec>,
    pub assignments: Vec<Assignment>,
}

impl Statement {
    /// Create a statement with an empty root scope.
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            tree: QueryTree::new(),
            scopes: vec![QuerySpec {
                id: ScopeId::ROOT,
                parent: None,
                from: Vec::new(),
                select: Vec::new(),
                where_clause: None,
            }],
            assignments: Vec::new(),
        }
    }

    pub fn select() -> Self {
        Self::new(StatementKind::Select)
    }

    pub fn update(entity: impl Into<String>, alias: Option<&str>) -> Self {
        let mut statement = Self::new(StatementKind::Update);
        statement.from_entity(ScopeId::ROOT, entity, alias);
        statement
    }

    pub fn delete(entity: impl Into<String>, alias: Option<&str>) -> Self {
        let mut statement = Self::new(StatementKind::Delete);
        statement.from_entity(ScopeId::ROOT, entity, alias);
        statement
    }

    pub fn scope(&self, id: ScopeId) -> &QuerySpec {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut QuerySpec {
        &mut self.scopes[id.index()]
    }

    /// Open a subquery scope nested in `parent`.
    pub fn add_subquery(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(QuerySpec {
            id,
            parent: Some(parent),
            from: Vec::new(),
            select: Vec::new(),
            where_clause: None,
        });
        id
    }

    /// Scopes in pre-order: each scope before the subqueries nested in it.
    pub fn scopes_preorder(&self) -> Vec<ScopeId> {
        let mut out = Vec::with_capacity(self.scopes.len());
        let mut stack = vec![ScopeId::ROOT];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children: Vec<ScopeId> = self
                .scopes
                .iter()
                .filter(|s| s.parent == Some(id))
                .map(|s| s.id)
                .collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    pub fn from_entity(
        &mut self,
        scope: ScopeId,
        name: impl Into<String>,
        alias: Option<&str>,
    ) -> &mut Self {
        let name = name.into();
        let span = self.synthetic_span(&name);
        self.scope_mut(scope).from.push(FromDecl::Entity {
            name,
            alias: alias.map(str::to_string),
            span,
        });
        self
    }

    pub fn join(
        &mut self,
        scope: ScopeId,
        path: impl Into<String>,
        alias: Option<&str>,
        kind: JoinKind,
    ) -> &mut Self {
        self.join_with(scope, path, alias, kind, None)
    }

    pub fn join_with(
        &mut self,
        scope: ScopeId,
        path: impl Into<String>,
        alias: Option<&str>,
        kind: JoinKind,
        with: Option<NodeId>,
    ) -> &mut Self {
        let path = path.into();
        let span = self.synthetic_span(&path);
        self.scope_mut(scope).from.push(FromDecl::Join {
            path,
            alias: alias.map(str::to_string),
            kind,
            with,
            span,
        });
        self
    }

    pub fn select_item(&mut self, scope: ScopeId, node: NodeId) -> &mut Self {
        self.scope_mut(scope).select.push(node);
        self
    }

    pub fn where_(&mut self, scope: ScopeId, node: NodeId) -> &mut Self {
        self.scope_mut(scope).where_clause = Some(node);
        self
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> &mut Self {
        self.assignments.push(Assignment { target, value });
        self
    }

    fn synthetic_span(&mut self, text: &str) -> Span {
        self.tree.reserve_span(text.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_preorder() {
        let mut statement = Statement::select();
        let a = statement.add_subquery(ScopeId::ROOT);
        let b = statement.add_subquery(a);
        let c = statement.add_subquery(ScopeId::ROOT);

        assert_eq!(
            statement.scopes_preorder(),
            vec![ScopeId::ROOT, a, b, c]
        );
        assert!(statement.scope(b).is_subquery());
    }

    #[test]
    fn test_dml_constructors() {
        let statement = Statement::delete("Order", Some("o"));
        assert!(statement.kind.is_dml());
        assert!(matches!(
            &statement.scope(ScopeId::ROOT).from[0],
            FromDecl::Entity { name, alias: Some(a), .. } if name == "Order" && a == "o"
        ));
    }
}
