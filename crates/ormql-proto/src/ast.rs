//! Index-addressed query tree.
//!
//! The external parser hands over a flat arena of [`Node`]s. Nodes refer to
//! each other through [`NodeId`] indices, never through pointers, so the
//! resolver and post-processor can annotate and extend the tree in place.

use serde::{Deserialize, Serialize};

use crate::span::Span;
use crate::types::SqlType;

/// Index of a node in a [`QueryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Index of a query scope (the outer query or one of its subqueries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub u32);

/// Index of a From-Element in the compiler's element arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FromElementId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ScopeId {
    /// The outermost query scope.
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl FromElementId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
}

impl ComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Like => "like",
            ComparisonOp::NotLike => "not like",
        }
    }
}

/// Logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
    IsNull,
    IsNotNull,
    Exists,
}

/// Lexical category of a literal, as reported by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteralKind {
    /// Numeric literal, possibly carrying a type suffix (`10L`, `1.5f`, `3bd`).
    Numeric,
    /// Quoted string literal, quotes included.
    String,
    Boolean,
    Null,
}

/// A query parameter reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamRef {
    /// `:name`
    Named(String),
    /// `?1`, or a bare `?` numbered by the parser.
    Positional(u32),
}

/// Group tag of a synthetic conjunction inserted by the post-processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyntheticGroup {
    /// Conditions from enabled dynamic filters.
    FilterConditions,
    /// Theta-style join conditions and root restrictions.
    ThetaJoins,
    /// Discriminator restriction of a bulk update/delete target.
    Discriminator,
}

/// The closed set of node kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A bare identifier: alias, entity name, constant or unqualified property.
    Ident(String),
    /// Property dereference `lhs.property`.
    Dot { lhs: NodeId, property: String },
    /// Indexed collection access `collection[selector]`.
    Index { collection: NodeId, selector: NodeId },
    Literal(LiteralKind),
    Parameter(ParamRef),
    /// Operands are optional because a malformed parse may drop one.
    Arithmetic {
        op: ArithmeticOp,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
    },
    Comparison {
        op: ComparisonOp,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
    },
    Logical { op: LogicalOp, operands: Vec<NodeId> },
    Unary { op: UnaryOp, operand: Option<NodeId> },
    Between {
        subject: Option<NodeId>,
        low: Option<NodeId>,
        high: Option<NodeId>,
        negated: bool,
    },
    In {
        subject: Option<NodeId>,
        candidates: Vec<NodeId>,
        negated: bool,
    },
    Function { name: String, args: Vec<NodeId> },
    Subquery(ScopeId),
    /// Rendered SQL fragments joined by `and`.
    Synthetic {
        group: SyntheticGroup,
        fragments: Vec<String>,
    },
}

impl NodeKind {
    /// Direct children of this node, in source order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Ident(_)
            | NodeKind::Literal(_)
            | NodeKind::Parameter(_)
            | NodeKind::Subquery(_)
            | NodeKind::Synthetic { .. } => Vec::new(),
            NodeKind::Dot { lhs, .. } => vec![*lhs],
            NodeKind::Index {
                collection,
                selector,
            } => vec![*collection, *selector],
            NodeKind::Arithmetic { lhs, rhs, .. } | NodeKind::Comparison { lhs, rhs, .. } => {
                lhs.iter().chain(rhs.iter()).copied().collect()
            }
            NodeKind::Logical { operands, .. } => operands.clone(),
            NodeKind::Unary { operand, .. } => operand.iter().copied().collect(),
            NodeKind::Between {
                subject, low, high, ..
            } => [subject, low, high].into_iter().flatten().copied().collect(),
            NodeKind::In {
                subject,
                candidates,
                ..
            } => subject.iter().chain(candidates.iter()).copied().collect(),
            NodeKind::Function { args, .. } => args.clone(),
        }
    }
}

/// A node of the query tree together with its resolution annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    /// Source position; parameters are ordered by it.
    pub span: Span,
    /// Source text of the node.
    pub text: String,
    /// SQL text, set once the node is resolved.
    pub rendered: Option<String>,
    pub data_type: Option<SqlType>,
    /// Type imposed by the surrounding expression (parameters and literals).
    pub expected_type: Option<SqlType>,
    /// The From-Element a path node resolved to.
    pub from_element: Option<FromElementId>,
    pub resolved: bool,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span, text: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            text: text.into(),
            rendered: None,
            data_type: None,
            expected_type: None,
            from_element: None,
            resolved: false,
        }
    }

    /// Check if this node is a query parameter.
    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, NodeKind::Parameter(_))
    }

    /// The SQL text of the node, falling back to its source text.
    pub fn sql(&self) -> &str {
        self.rendered.as_deref().unwrap_or(&self.text)
    }
}

/// Arena of query nodes.
///
/// The builder methods assign monotonically increasing spans, so trees built
/// programmatically order their parameters by construction order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryTree {
    nodes: Vec<Node>,
    cursor: usize,
}

impl QueryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its index.
    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.cursor = self.cursor.max(node.span.end + 1);
        self.nodes.push(node);
        id
    }

    /// Reserve a source range of `len` bytes after everything built so far.
    pub fn reserve_span(&mut self, len: usize) -> Span {
        let span = Span::new(self.cursor, self.cursor + len);
        self.cursor = span.end + 1;
        span
    }

    /// Append a node with a synthetic span following the previous node.
    pub fn add(&mut self, kind: NodeKind, text: impl Into<String>) -> NodeId {
        let text = text.into();
        let span = self.reserve_span(text.len());
        self.push(Node::new(kind, span, text))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Look up a node, returning `None` for a dangling index.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Collect the subtree rooted at `root` in pre-order.
    ///
    /// Subquery nodes are leaves; their scopes own separate subtrees.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children = self.node(id).kind.children();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    // Builders

    pub fn ident(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        self.add(NodeKind::Ident(name.clone()), name)
    }

    /// Build a dotted path such as `o.customer.name` as a chain of dot nodes.
    pub fn path(&mut self, path: &str) -> NodeId {
        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();
        let mut current = self.ident(root);
        for segment in segments {
            current = self.dot(current, segment);
        }
        current
    }

    pub fn dot(&mut self, lhs: NodeId, property: impl Into<String>) -> NodeId {
        let property = property.into();
        let text = format!("{}.{}", self.node(lhs).text, property);
        self.add(NodeKind::Dot { lhs, property }, text)
    }

    pub fn index(&mut self, collection: NodeId, selector: NodeId) -> NodeId {
        let text = format!(
            "{}[{}]",
            self.node(collection).text,
            self.node(selector).text
        );
        self.add(
            NodeKind::Index {
                collection,
                selector,
            },
            text,
        )
    }

    pub fn number(&mut self, text: impl Into<String>) -> NodeId {
        self.add(NodeKind::Literal(LiteralKind::Numeric), text)
    }

    /// A string literal; `value` is quoted and escaped.
    pub fn string(&mut self, value: &str) -> NodeId {
        let text = format!("'{}'", value.replace('\'', "''"));
        self.add(NodeKind::Literal(LiteralKind::String), text)
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.add(NodeKind::Literal(LiteralKind::Boolean), value.to_string())
    }

    pub fn null(&mut self) -> NodeId {
        self.add(NodeKind::Literal(LiteralKind::Null), "null")
    }

    pub fn named_param(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        let text = format!(":{}", name);
        self.add(NodeKind::Parameter(ParamRef::Named(name)), text)
    }

    pub fn positional_param(&mut self, position: u32) -> NodeId {
        self.add(
            NodeKind::Parameter(ParamRef::Positional(position)),
            format!("?{}", position),
        )
    }

    pub fn arithmetic(&mut self, op: ArithmeticOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let text = format!(
            "{} {} {}",
            self.node(lhs).text,
            op.symbol(),
            self.node(rhs).text
        );
        self.add(
            NodeKind::Arithmetic {
                op,
                lhs: Some(lhs),
                rhs: Some(rhs),
            },
            text,
        )
    }

    pub fn compare(&mut self, op: ComparisonOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let text = format!(
            "{} {} {}",
            self.node(lhs).text,
            op.symbol(),
            self.node(rhs).text
        );
        self.add(
            NodeKind::Comparison {
                op,
                lhs: Some(lhs),
                rhs: Some(rhs),
            },
            text,
        )
    }

    pub fn equals(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.compare(ComparisonOp::Eq, lhs, rhs)
    }

    pub fn and(&mut self, operands: Vec<NodeId>) -> NodeId {
        self.logical(LogicalOp::And, operands)
    }

    pub fn or(&mut self, operands: Vec<NodeId>) -> NodeId {
        self.logical(LogicalOp::Or, operands)
    }

    fn logical(&mut self, op: LogicalOp, operands: Vec<NodeId>) -> NodeId {
        let joiner = match op {
            LogicalOp::And => " and ",
            LogicalOp::Or => " or ",
        };
        let text = operands
            .iter()
            .map(|id| self.node(*id).text.clone())
            .collect::<Vec<_>>()
            .join(joiner);
        self.add(NodeKind::Logical { op, operands }, text)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> NodeId {
        let inner = self.node(operand).text.clone();
        let text = match op {
            UnaryOp::Negate => format!("-{}", inner),
            UnaryOp::Not => format!("not {}", inner),
            UnaryOp::IsNull => format!("{} is null", inner),
            UnaryOp::IsNotNull => format!("{} is not null", inner),
            UnaryOp::Exists => format!("exists {}", inner),
        };
        self.add(
            NodeKind::Unary {
                op,
                operand: Some(operand),
            },
            text,
        )
    }

    pub fn between(&mut self, subject: NodeId, low: NodeId, high: NodeId) -> NodeId {
        let text = format!(
            "{} between {} and {}",
            self.node(subject).text,
            self.node(low).text,
            self.node(high).text
        );
        self.add(
            NodeKind::Between {
                subject: Some(subject),
                low: Some(low),
                high: Some(high),
                negated: false,
            },
            text,
        )
    }

    pub fn in_list(&mut self, subject: NodeId, candidates: Vec<NodeId>) -> NodeId {
        let list = candidates
            .iter()
            .map(|id| self.node(*id).text.clone())
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!("{} in ({})", self.node(subject).text, list);
        self.add(
            NodeKind::In {
                subject: Some(subject),
                candidates,
                negated: false,
            },
            text,
        )
    }

    pub fn function(&mut self, name: impl Into<String>, args: Vec<NodeId>) -> NodeId {
        let name = name.into();
        let list = args
            .iter()
            .map(|id| self.node(*id).text.clone())
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!("{}({})", name, list);
        self.add(NodeKind::Function { name, args }, text)
    }

    pub fn subquery(&mut self, scope: ScopeId) -> NodeId {
        self.add(NodeKind::Subquery(scope), "(subquery)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_builds_dot_chain() {
        let mut tree = QueryTree::new();
        let path = tree.path("o.customer.name");

        let node = tree.node(path);
        assert_eq!(node.text, "o.customer.name");
        match &node.kind {
            NodeKind::Dot { lhs, property } => {
                assert_eq!(property, "name");
                assert_eq!(tree.node(*lhs).text, "o.customer");
            }
            other => panic!("expected dot node, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_spans_follow_construction_order() {
        let mut tree = QueryTree::new();
        let a = tree.named_param("a");
        let b = tree.positional_param(1);
        assert!(tree.node(a).span < tree.node(b).span);
    }

    #[test]
    fn test_descendants_preorder() {
        let mut tree = QueryTree::new();
        let lhs = tree.path("o.total");
        let rhs = tree.number("10");
        let cmp = tree.compare(ComparisonOp::Gt, lhs, rhs);

        let ids = tree.descendants(cmp);
        assert_eq!(ids[0], cmp);
        assert_eq!(ids.len(), 4);
        assert_eq!(*ids.last().unwrap(), rhs);
    }

    #[test]
    fn test_in_list_text() {
        let mut tree = QueryTree::new();
        let subject = tree.path("o.status");
        let a = tree.string("NEW");
        let b = tree.string("it's");
        let node = tree.in_list(subject, vec![a, b]);
        assert_eq!(tree.node(node).text, "o.status in ('NEW', 'it''s')");
    }

    #[test]
    fn test_equals_builds_comparison() {
        let mut tree = QueryTree::new();
        let lhs = tree.path("o.number");
        let rhs = tree.named_param("n");
        let node = tree.equals(lhs, rhs);
        assert_eq!(tree.node(node).text, "o.number = :n");
        assert!(matches!(
            tree.node(node).kind,
            NodeKind::Comparison {
                op: ComparisonOp::Eq,
                ..
            }
        ));
    }
}
