//! Dynamic filter definitions and bindings.

use ormql_proto::SqlType;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// A declared filter parameter.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct FilterParam {
    pub name: String,
    pub ty: SqlType,
}

/// A named filter with typed parameters, enabled per execution.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct FilterDef {
    pub name: String,
    pub parameters: Vec<FilterParam>,
}

impl FilterDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// Declare a parameter.
    pub fn with_param(mut self, name: impl Into<String>, ty: SqlType) -> Self {
        self.parameters.push(FilterParam {
            name: name.into(),
            ty,
        });
        self
    }

    /// Type of a declared parameter.
    pub fn parameter_type(&self, name: &str) -> Option<&SqlType> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.ty)
    }
}

/// A filter condition attached to an entity or collection.
///
/// The condition is SQL text where `{alias}` stands for the table alias of the
/// filtered relation and `:filter.param` marks a filter parameter, e.g.
/// `{alias}.tenant_id = :tenant.id`.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct FilterBinding {
    pub filter: String,
    pub condition: String,
}

impl FilterBinding {
    pub fn new(filter: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            condition: condition.into(),
        }
    }

    /// Render the condition for a table alias.
    pub fn render(&self, alias: &str) -> String {
        self.condition.replace("{alias}", alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_render() {
        let binding = FilterBinding::new("tenant", "{alias}.tenant_id = :tenant.id");
        assert_eq!(binding.render("order0_"), "order0_.tenant_id = :tenant.id");
    }

    #[test]
    fn test_filter_parameter_type() {
        let def = FilterDef::new("tenant").with_param("id", SqlType::Long);
        assert_eq!(def.parameter_type("id"), Some(&SqlType::Long));
        assert_eq!(def.parameter_type("other"), None);
    }
}
