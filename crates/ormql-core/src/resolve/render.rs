//! SQL text of resolved expressions.
//!
//! Leaves (paths, literals, constants, collection functions) carry the text
//! set during resolution; operators are rendered here from their children.
//! Parameters are rendered last, once their expected type is final.

use std::collections::HashMap;

use ormql_proto::{ArithmeticOp, LogicalOp, NodeId, NodeKind, QueryTree, ScopeId, UnaryOp};

use crate::catalog::RelationCatalog;
use crate::config::CompilerConfig;

/// Renders expression trees to SQL text, storing the text on each node.
pub struct ExpressionRenderer<'a> {
    catalog: &'a dyn RelationCatalog,
    config: &'a CompilerConfig,
    subqueries: &'a HashMap<ScopeId, String>,
}

impl<'a> ExpressionRenderer<'a> {
    /// `subqueries` holds the rendered text of every already rendered scope.
    pub fn new(
        catalog: &'a dyn RelationCatalog,
        config: &'a CompilerConfig,
        subqueries: &'a HashMap<ScopeId, String>,
    ) -> Self {
        Self {
            catalog,
            config,
            subqueries,
        }
    }

    /// Render `id` and everything below it.
    pub fn render(&self, tree: &mut QueryTree, id: NodeId) -> String {
        let kind = tree.node(id).kind.clone();
        let text = match kind {
            NodeKind::Ident(_)
            | NodeKind::Dot { .. }
            | NodeKind::Index { .. }
            | NodeKind::Literal(_) => return tree.node(id).sql().to_string(),
            NodeKind::Parameter(_) => {
                let node = tree.node(id);
                let span = node
                    .expected_type
                    .as_ref()
                    .map(|t| self.catalog.column_span(t))
                    .unwrap_or(1);
                self.config.placeholders(span)
            }
            NodeKind::Arithmetic { op, lhs, rhs } => {
                let lhs = lhs.map(|l| self.operand(tree, l, op, false)).unwrap_or_default();
                let rhs = rhs.map(|r| self.operand(tree, r, op, true)).unwrap_or_default();
                format!("{} {} {}", lhs, op.symbol(), rhs)
            }
            NodeKind::Comparison { op, lhs, rhs } => {
                let lhs = lhs.map(|l| self.render(tree, l)).unwrap_or_default();
                let rhs = rhs.map(|r| self.render(tree, r)).unwrap_or_default();
                format!("{} {} {}", lhs, op.symbol(), rhs)
            }
            NodeKind::Logical { op, operands } => {
                let joiner = match op {
                    LogicalOp::And => " and ",
                    LogicalOp::Or => " or ",
                };
                operands
                    .iter()
                    .map(|o| {
                        let text = self.render(tree, *o);
                        match &tree.node(*o).kind {
                            NodeKind::Logical { op: inner, .. } if *inner != op => {
                                format!("({})", text)
                            }
                            _ => text,
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(joiner)
            }
            NodeKind::Unary { op, operand } => {
                let inner = operand.map(|o| self.render(tree, o)).unwrap_or_default();
                match op {
                    UnaryOp::Negate => format!("-{}", inner),
                    UnaryOp::Not => format!("not ({})", inner),
                    UnaryOp::IsNull => format!("{} is null", inner),
                    UnaryOp::IsNotNull => format!("{} is not null", inner),
                    UnaryOp::Exists => format!("exists {}", inner),
                }
            }
            NodeKind::Between {
                subject,
                low,
                high,
                negated,
            } => {
                let mut part = |n: Option<NodeId>| n.map(|n| self.render(tree, n)).unwrap_or_default();
                let subject = part(subject);
                let low = part(low);
                let high = part(high);
                let not = if negated { "not " } else { "" };
                format!("{} {}between {} and {}", subject, not, low, high)
            }
            NodeKind::In {
                subject,
                candidates,
                negated,
            } => {
                let subject = subject.map(|s| self.render(tree, s)).unwrap_or_default();
                let not = if negated { "not " } else { "" };
                let single_subquery = candidates.len() == 1
                    && matches!(tree.node(candidates[0]).kind, NodeKind::Subquery(_));
                let list: Vec<String> = candidates.iter().map(|c| self.render(tree, *c)).collect();
                if single_subquery {
                    format!("{} {}in {}", subject, not, list.join(", "))
                } else {
                    format!("{} {}in ({})", subject, not, list.join(", "))
                }
            }
            NodeKind::Function { name, args } => {
                if let Some(rendered) = tree.node(id).rendered.clone() {
                    if is_collection_function(&name) {
                        return rendered;
                    }
                }
                let args: Vec<String> = args.iter().map(|a| self.render(tree, *a)).collect();
                if args.is_empty() && name.eq_ignore_ascii_case("count") {
                    "count(*)".to_string()
                } else if args.is_empty() && name.to_ascii_lowercase().starts_with("current_") {
                    name
                } else {
                    format!("{}({})", name, args.join(", "))
                }
            }
            NodeKind::Subquery(scope) => match self.subqueries.get(&scope) {
                Some(text) => format!("({})", text),
                None => tree.node(id).sql().to_string(),
            },
            NodeKind::Synthetic { fragments, .. } => fragments.join(" and "),
        };
        tree.node_mut(id).rendered = Some(text.clone());
        text
    }

    /// Render an arithmetic operand, parenthesized where precedence needs it.
    fn operand(&self, tree: &mut QueryTree, id: NodeId, parent: ArithmeticOp, right: bool) -> String {
        let text = self.render(tree, id);
        match &tree.node(id).kind {
            NodeKind::Arithmetic { op, .. } => {
                let (child, outer) = (precedence(*op), precedence(parent));
                let non_associative =
                    matches!(parent, ArithmeticOp::Subtract | ArithmeticOp::Divide);
                if child < outer || (right && child == outer && non_associative) {
                    format!("({})", text)
                } else {
                    text
                }
            }
            _ => text,
        }
    }
}

/// Collection functions whose text is fixed during resolution.
fn is_collection_function(name: &str) -> bool {
    ["size", "elements", "indices"]
        .iter()
        .any(|f| name.eq_ignore_ascii_case(f))
}

fn precedence(op: ArithmeticOp) -> u8 {
    match op {
        ArithmeticOp::Add | ArithmeticOp::Subtract => 1,
        ArithmeticOp::Multiply | ArithmeticOp::Divide => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaBundle;
    use ormql_proto::{ComparisonOp, SqlType};

    fn render(tree: &mut QueryTree, id: NodeId) -> String {
        let catalog = SchemaBundle::new(1);
        let config = CompilerConfig::default();
        let subqueries = HashMap::new();
        ExpressionRenderer::new(&catalog, &config, &subqueries).render(tree, id)
    }

    #[test]
    fn test_arithmetic_parenthesization() {
        let mut tree = QueryTree::new();
        let a = tree.number("1");
        let b = tree.number("2");
        let c = tree.number("3");
        let sum = tree.arithmetic(ArithmeticOp::Add, a, b);
        let product = tree.arithmetic(ArithmeticOp::Multiply, sum, c);
        assert_eq!(render(&mut tree, product), "(1 + 2) * 3");

        let d = tree.number("4");
        let diff = tree.arithmetic(ArithmeticOp::Subtract, d, sum);
        assert_eq!(render(&mut tree, diff), "4 - (1 + 2)");
    }

    #[test]
    fn test_parameters_render_per_column_span() {
        let mut tree = QueryTree::new();
        let p = tree.named_param("p");
        assert_eq!(render(&mut tree, p), "?");
        tree.node_mut(p).expected_type = Some(SqlType::Component {
            name: "Money".into(),
            columns: 2,
        });
        assert_eq!(render(&mut tree, p), "(?, ?)");
    }

    #[test]
    fn test_mixed_logical_operators() {
        let mut tree = QueryTree::new();
        let a = tree.number("1");
        let b = tree.number("2");
        let x = tree.compare(ComparisonOp::Lt, a, b);
        let y = tree.compare(ComparisonOp::Gt, a, b);
        let z = tree.compare(ComparisonOp::Eq, a, b);
        let or = tree.or(vec![x, y]);
        let and = tree.and(vec![or, z]);
        assert_eq!(render(&mut tree, and), "(1 < 2 or 1 > 2) and 1 = 2");
    }
}
