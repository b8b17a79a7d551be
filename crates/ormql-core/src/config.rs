//! Compiler configuration.

use ormql_proto::JoinKind;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Rendering mode for big-decimal and floating point literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecimalFormat {
    /// Plain decimal text with the written scale preserved (`123.450`).
    #[default]
    Exact,
    /// Scientific notation (`1.2345E2`).
    Approximate,
}

/// Configuration for one compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// How decimal literals are re-rendered.
    pub decimal_format: DecimalFormat,

    /// Render every implied join as a theta-style join (legacy output).
    pub theta_style_implicit_joins: bool,

    /// Omit superclass/subclass tables that no expression references.
    pub omit_unreferenced_tables: bool,

    /// Join kind used for implied joins.
    pub implied_join_kind: JoinKind,

    /// Shallow projection: entity projections select identifiers only and
    /// subclass tables are never joined.
    pub shallow: bool,

    /// Fall back to `double` when neither arithmetic operand has a type.
    /// When disabled such expressions fail with `UnresolvableType`.
    pub allow_arithmetic_type_guess: bool,

    /// SQL text for `true` and `false`.
    pub boolean_literals: (String, String),

    /// Placeholder marker for one bound column.
    pub parameter_marker: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            decimal_format: DecimalFormat::Exact,
            theta_style_implicit_joins: false,
            omit_unreferenced_tables: true,
            implied_join_kind: JoinKind::Inner,
            shallow: false,
            allow_arithmetic_type_guess: true,
            boolean_literals: ("1".to_string(), "0".to_string()),
            parameter_marker: "?".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the decimal literal format.
    pub fn decimal_format(mut self, format: DecimalFormat) -> Self {
        self.decimal_format = format;
        self
    }

    /// Force implied joins to theta style.
    pub fn theta_style_implicit_joins(mut self, enabled: bool) -> Self {
        self.theta_style_implicit_joins = enabled;
        self
    }

    /// Enable or disable unreferenced table elimination.
    pub fn omit_unreferenced_tables(mut self, enabled: bool) -> Self {
        self.omit_unreferenced_tables = enabled;
        self
    }

    /// Set the join kind for implied joins.
    pub fn implied_join_kind(mut self, kind: JoinKind) -> Self {
        self.implied_join_kind = kind;
        self
    }

    /// Mark the compilation as a shallow projection query.
    pub fn shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    /// Allow or forbid the `double` fallback for untyped arithmetic.
    pub fn allow_arithmetic_type_guess(mut self, allow: bool) -> Self {
        self.allow_arithmetic_type_guess = allow;
        self
    }

    /// Set the SQL text for boolean literals.
    pub fn boolean_literals(mut self, yes: impl Into<String>, no: impl Into<String>) -> Self {
        self.boolean_literals = (yes.into(), no.into());
        self
    }

    /// Render a boolean as SQL text.
    pub fn render_boolean(&self, value: bool) -> &str {
        if value {
            &self.boolean_literals.0
        } else {
            &self.boolean_literals.1
        }
    }

    /// Render the placeholder markers for a parameter spanning `columns` columns.
    pub fn placeholders(&self, columns: usize) -> String {
        if self.parameter_marker == "?" {
            return ormql_proto::placeholder_markers(columns);
        }
        match columns {
            0 | 1 => self.parameter_marker.clone(),
            n => format!("({})", vec![self.parameter_marker.as_str(); n].join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.decimal_format, DecimalFormat::Exact);
        assert_eq!(config.implied_join_kind, JoinKind::Inner);
        assert!(config.allow_arithmetic_type_guess);
        assert_eq!(config.placeholders(2), "(?, ?)");
    }

    #[test]
    fn test_from_json_partial() {
        let config = CompilerConfig::from_json(
            r#"{ "decimal_format": "Approximate", "shallow": true }"#,
        )
        .unwrap();
        assert_eq!(config.decimal_format, DecimalFormat::Approximate);
        assert!(config.shallow);
        assert!(config.omit_unreferenced_tables);
    }

    #[test]
    fn test_builder_and_boolean_rendering() {
        let config = CompilerConfig::default()
            .boolean_literals("true", "false")
            .theta_style_implicit_joins(true);
        assert_eq!(config.render_boolean(false), "false");
        assert!(config.theta_style_implicit_joins);
    }

    #[test]
    fn test_invalid_json_is_catalog_error() {
        let err = CompilerConfig::from_json("{ not json").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Catalog);
    }
}
