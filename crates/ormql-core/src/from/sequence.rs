//! Join sequences: the ordered join steps of one From-Element.

use ormql_proto::{JoinKind, NodeId};
use serde::{Deserialize, Serialize};

/// An equality condition between two qualified columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    pub lhs: String,
    pub rhs: String,
}

impl ColumnPair {
    pub fn new(lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self {
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    pub fn render(&self) -> String {
        format!("{}={}", self.lhs, self.rhs)
    }
}

/// Pair up two column lists qualified by their table aliases.
pub fn column_pairs(
    lhs_alias: &str,
    lhs_columns: &[String],
    rhs_alias: &str,
    rhs_columns: &[String],
) -> Vec<ColumnPair> {
    lhs_columns
        .iter()
        .zip(rhs_columns)
        .map(|(l, r)| {
            ColumnPair::new(
                format!("{}.{}", lhs_alias, l),
                format!("{}.{}", rhs_alias, r),
            )
        })
        .collect()
}

/// The table a sequence starts from (root elements only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoot {
    pub table: String,
    pub alias: String,
}

/// One joined table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStep {
    pub table: String,
    pub alias: String,
    pub kind: JoinKind,
    /// Key equalities linking this table to the previous one.
    pub conditions: Vec<ColumnPair>,
    /// Additional SQL conditions: `with` clauses, index selectors, filters.
    pub extra: Vec<String>,
    /// Joins a superclass or subclass table of the same element; always
    /// rendered as an ANSI join.
    pub hierarchy: bool,
}

impl JoinStep {
    pub fn new(
        table: impl Into<String>,
        alias: impl Into<String>,
        kind: JoinKind,
        conditions: Vec<ColumnPair>,
    ) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            kind,
            conditions,
            extra: Vec::new(),
            hierarchy: false,
        }
    }

    /// Mark the step as joining a table of the element's own hierarchy.
    pub fn within_hierarchy(mut self) -> Self {
        self.hierarchy = true;
        self
    }

    /// All conditions of this step rendered as SQL.
    pub fn condition_texts(&self) -> Vec<String> {
        self.conditions
            .iter()
            .map(ColumnPair::render)
            .chain(self.extra.iter().cloned())
            .collect()
    }
}

/// A join condition whose expression is rendered after the subqueries it
/// may contain: a `with` clause or an index selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCondition {
    /// Alias of the step the condition belongs to; `None` restricts the root.
    pub step: Option<String>,
    /// Column compared with the expression, for index selectors.
    pub column: Option<String>,
    pub node: NodeId,
}

impl PendingCondition {
    /// The whole expression is the condition.
    pub fn expression(step: Option<String>, node: NodeId) -> Self {
        Self {
            step,
            column: None,
            node,
        }
    }

    /// `column = <expression>`
    pub fn equals_column(step: impl Into<String>, column: impl Into<String>, node: NodeId) -> Self {
        Self {
            step: Some(step.into()),
            column: Some(column.into()),
            node,
        }
    }
}

/// Ordered join steps of a From-Element.
///
/// A theta-style sequence renders its tables as a comma list and every
/// condition into the WHERE clause; an ANSI sequence renders `join .. on ..`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JoinSequence {
    pub root: Option<JoinRoot>,
    pub steps: Vec<JoinStep>,
    /// Conditions on the root table (discriminator restrictions).
    pub restrictions: Vec<String>,
    /// Conditions still waiting for their expression text.
    pub pending: Vec<PendingCondition>,
    theta_style: bool,
}

impl JoinSequence {
    /// An empty sequence for a joined element.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sequence starting at a root table.
    pub fn rooted(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            root: Some(JoinRoot {
                table: table.into(),
                alias: alias.into(),
            }),
            ..Self::default()
        }
    }

    pub fn add_step(&mut self, step: JoinStep) -> &mut Self {
        self.steps.push(step);
        self
    }

    pub fn add_restriction(&mut self, condition: impl Into<String>) -> &mut Self {
        self.restrictions.push(condition.into());
        self
    }

    pub fn is_theta_style(&self) -> bool {
        self.theta_style
    }

    pub fn set_theta_style(&mut self, theta_style: bool) -> &mut Self {
        self.theta_style = theta_style;
        self
    }

    pub fn step(&self, alias: &str) -> Option<&JoinStep> {
        self.steps.iter().find(|s| s.alias == alias)
    }

    pub fn step_mut(&mut self, alias: &str) -> Option<&mut JoinStep> {
        self.steps.iter_mut().find(|s| s.alias == alias)
    }

    /// Append an extra condition to the step joining `alias`.
    ///
    /// Returns `false` when no step joins that alias.
    pub fn append_condition(&mut self, alias: &str, condition: impl Into<String>) -> bool {
        match self.step_mut(alias) {
            Some(step) => {
                step.extra.push(condition.into());
                true
            }
            None => false,
        }
    }

    pub fn defer_condition(&mut self, condition: PendingCondition) -> &mut Self {
        self.pending.push(condition);
        self
    }

    /// Attach the rendered expression of a pending condition to its step,
    /// or to the root restrictions when the step is gone.
    pub fn settle(&mut self, pending: &PendingCondition, text: String) {
        let condition = match &pending.column {
            Some(column) => format!("{} = {}", column, text),
            None => text,
        };
        let step = pending.step.as_deref().and_then(|alias| self.step_mut(alias));
        if let Some(step) = step {
            step.extra.push(condition);
        } else {
            self.restrictions.push(condition);
        }
    }

    /// Aliases introduced by this sequence, root first.
    pub fn aliases(&self) -> Vec<&str> {
        self.root
            .iter()
            .map(|r| r.alias.as_str())
            .chain(self.steps.iter().map(|s| s.alias.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_pairs() {
        let pairs = column_pairs(
            "order0_",
            &["id".to_string()],
            "items1_",
            &["order_id".to_string()],
        );
        assert_eq!(pairs[0].render(), "order0_.id=items1_.order_id");
    }

    #[test]
    fn test_append_condition_targets_step() {
        let mut seq = JoinSequence::new();
        seq.add_step(JoinStep::new("order_product", "products1_", JoinKind::Inner, vec![]))
            .add_step(JoinStep::new("product", "product2_", JoinKind::Inner, vec![]));

        assert!(seq.append_condition("products1_", "products1_.idx = 0"));
        assert!(!seq.append_condition("nope", "x"));
        assert_eq!(seq.step("products1_").unwrap().extra, vec!["products1_.idx = 0"]);
        assert!(seq.step("product2_").unwrap().extra.is_empty());
        assert_eq!(seq.aliases(), vec!["products1_", "product2_"]);
    }

    #[test]
    fn test_settle_pending_conditions() {
        let mut seq = JoinSequence::new();
        seq.add_step(JoinStep::new("line_item", "lineitem1_", JoinKind::Inner, vec![]));
        let selector = PendingCondition::equals_column("lineitem1_", "lineitem1_.idx", NodeId(4));
        let with = PendingCondition::expression(Some("gone_".into()), NodeId(9));
        seq.defer_condition(selector.clone()).defer_condition(with.clone());
        assert_eq!(seq.pending.len(), 2);

        seq.settle(&selector, "(select 1)".into());
        seq.settle(&with, "lineitem1_.qty > 2".into());
        assert_eq!(
            seq.step("lineitem1_").unwrap().extra,
            vec!["lineitem1_.idx = (select 1)"]
        );
        assert_eq!(seq.restrictions, vec!["lineitem1_.qty > 2"]);
    }
}
