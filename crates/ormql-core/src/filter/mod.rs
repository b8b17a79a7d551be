//! Dynamic filters enabled for one execution.
//!
//! A filter is defined in the catalog with typed parameters and bound to
//! entities or collections through condition templates. Enabling it makes
//! the post-processor inject those conditions; `:filter.param` markers in the
//! condition text become bind parameters supplied by the execution layer.

use ormql_proto::{ParameterSource, ParameterSpec};
use tracing::debug;

use crate::catalog::{FilterBinding, FilterDef, RelationCatalog};
use crate::config::CompilerConfig;
use crate::error::{Result, SemanticError};

/// The set of filters enabled for an execution, in enabling order.
#[derive(Debug, Clone, Default)]
pub struct ActiveFilters {
    enabled: Vec<FilterDef>,
}

impl ActiveFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable a filter defined in the catalog.
    pub fn enable(&mut self, catalog: &dyn RelationCatalog, name: &str) -> Result<&mut Self> {
        let definition = catalog
            .find_filter(name)
            .ok_or_else(|| SemanticError::UnknownFilter(name.to_string()))?;
        if !self.is_enabled(name) {
            debug!(filter = name, "enabled filter");
            self.enabled.push(definition.clone());
        }
        Ok(self)
    }

    /// Disable a filter; returns whether it was enabled.
    pub fn disable(&mut self, name: &str) -> bool {
        let before = self.enabled.len();
        self.enabled.retain(|f| f.name != name);
        before != self.enabled.len()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn definition(&self, name: &str) -> Option<&FilterDef> {
        self.enabled.iter().find(|f| f.name == name)
    }

    /// Bindings whose filter is enabled.
    pub fn applicable<'b>(&self, bindings: &'b [FilterBinding]) -> Vec<&'b FilterBinding> {
        bindings
            .iter()
            .filter(|b| self.is_enabled(&b.filter))
            .collect()
    }

    /// Replace `:filter.param` markers in rendered SQL with placeholders.
    ///
    /// Returns the rewritten text and one parameter per marker, in text
    /// order. Quoted literals are left untouched.
    pub fn expand_parameters(
        &self,
        text: &str,
        catalog: &dyn RelationCatalog,
        config: &CompilerConfig,
    ) -> Result<(String, Vec<ParameterSpec>)> {
        let mut out = String::with_capacity(text.len());
        let mut parameters = Vec::new();
        let mut in_quote = false;
        let mut rest = text;

        while let Some(c) = rest.chars().next() {
            if c == '\'' {
                in_quote = !in_quote;
            }
            if in_quote || c != ':' {
                out.push(c);
                rest = &rest[c.len_utf8()..];
                continue;
            }
            let Some((filter, parameter, consumed)) = filter_marker(&rest[1..]) else {
                out.push(c);
                rest = &rest[1..];
                continue;
            };

            let definition = self
                .definition(filter)
                .ok_or_else(|| SemanticError::UnknownFilter(filter.to_string()))?;
            let ty = definition.parameter_type(parameter).cloned().ok_or_else(|| {
                SemanticError::MissingFilterParameter {
                    filter: filter.to_string(),
                    parameter: parameter.to_string(),
                }
            })?;
            let column_span = catalog.column_span(&ty);
            out.push_str(&config.placeholders(column_span));
            parameters.push(ParameterSpec {
                source: ParameterSource::Filter {
                    filter: filter.to_string(),
                    parameter: parameter.to_string(),
                },
                expected_type: Some(ty),
                column_span,
                node: None,
                span: None,
            });
            rest = &rest[1 + consumed..];
        }
        Ok((out, parameters))
    }
}

/// Parse `filter.param` at the start of `text`.
fn filter_marker(text: &str) -> Option<(&str, &str, usize)> {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let filter_len = text.find(|c: char| !is_ident(c)).unwrap_or(text.len());
    if filter_len == 0 || !text[filter_len..].starts_with('.') {
        return None;
    }
    let after = &text[filter_len + 1..];
    let param_len = after.find(|c: char| !is_ident(c)).unwrap_or(after.len());
    if param_len == 0 {
        return None;
    }
    Some((&text[..filter_len], &after[..param_len], filter_len + 1 + param_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaBundle;
    use crate::error::ErrorKind;
    use ormql_proto::SqlType;
    use pretty_assertions::assert_eq;

    fn schema() -> SchemaBundle {
        SchemaBundle::new(1)
            .with_filter(FilterDef::new("tenant").with_param("id", SqlType::Long))
            .with_filter(FilterDef::new("region").with_param("code", SqlType::String))
    }

    #[test]
    fn test_enable_unknown_filter() {
        let schema = schema();
        let mut filters = ActiveFilters::new();
        let err = filters.enable(&schema, "missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownFilter);
        assert!(filters.is_empty());
    }

    #[test]
    fn test_enable_and_disable() {
        let schema = schema();
        let mut filters = ActiveFilters::new();
        filters.enable(&schema, "tenant").unwrap();
        filters.enable(&schema, "tenant").unwrap();
        assert_eq!(filters.len(), 1);
        assert!(filters.disable("tenant"));
        assert!(!filters.disable("tenant"));
    }

    #[test]
    fn test_expand_parameters_in_text_order() {
        let schema = schema();
        let config = CompilerConfig::default();
        let mut filters = ActiveFilters::new();
        filters.enable(&schema, "tenant").unwrap();
        filters.enable(&schema, "region").unwrap();

        let (text, params) = filters
            .expand_parameters(
                "o.region = :region.code and o.tenant_id = :tenant.id and o.note <> ':tenant.id'",
                &schema,
                &config,
            )
            .unwrap();
        assert_eq!(
            text,
            "o.region = ? and o.tenant_id = ? and o.note <> ':tenant.id'"
        );
        let sources: Vec<_> = params.iter().map(|p| p.source.clone()).collect();
        assert_eq!(
            sources,
            vec![
                ParameterSource::Filter {
                    filter: "region".into(),
                    parameter: "code".into()
                },
                ParameterSource::Filter {
                    filter: "tenant".into(),
                    parameter: "id".into()
                },
            ]
        );
        assert!(params.iter().all(|p| p.is_filter() && p.column_span == 1));
    }

    #[test]
    fn test_missing_filter_parameter() {
        let schema = schema();
        let config = CompilerConfig::default();
        let mut filters = ActiveFilters::new();
        filters.enable(&schema, "tenant").unwrap();

        let err = filters
            .expand_parameters("x = :tenant.code", &schema, &config)
            .unwrap_err();
        assert_eq!(
            err,
            SemanticError::MissingFilterParameter {
                filter: "tenant".into(),
                parameter: "code".into()
            }
        );
    }
}
