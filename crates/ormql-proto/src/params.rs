//! Parameter specifications produced for the execution layer.

use serde::{Deserialize, Serialize};

use crate::ast::NodeId;
use crate::span::Span;
use crate::types::SqlType;

/// Where a placeholder came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterSource {
    /// `:name` in the query text.
    Named(String),
    /// `?n` in the query text.
    Positional(u32),
    /// `:filter.parameter` inside an enabled dynamic filter condition.
    Filter { filter: String, parameter: String },
}

/// A bind parameter in final binding order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub source: ParameterSource,
    pub expected_type: Option<SqlType>,
    /// Number of `?` markers rendered for this parameter.
    pub column_span: usize,
    /// The query node, absent for filter parameters.
    pub node: Option<NodeId>,
    pub span: Option<Span>,
}

impl ParameterSpec {
    pub fn is_filter(&self) -> bool {
        matches!(self.source, ParameterSource::Filter { .. })
    }
}

/// Render the placeholder text for a parameter spanning `columns` columns.
///
/// A single column renders as `?`; several are grouped as `(?, ?)`.
pub fn placeholder_markers(columns: usize) -> String {
    match columns {
        0 | 1 => "?".to_string(),
        n => format!("({})", vec!["?"; n].join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_markers() {
        assert_eq!(placeholder_markers(1), "?");
        assert_eq!(placeholder_markers(3), "(?, ?, ?)");
    }
}
