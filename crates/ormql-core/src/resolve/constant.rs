//! Rendering of named constants and discriminator literals.

use ormql_proto::SqlType;

use crate::catalog::{ConstantValue, DiscriminatorValue, RelationCatalog};
use crate::config::CompilerConfig;

/// Renders a named constant as an inline SQL literal.
pub fn render_constant(value: &ConstantValue, config: &CompilerConfig) -> (String, SqlType) {
    let text = match value {
        ConstantValue::Bool(b) => config.render_boolean(*b).to_string(),
        ConstantValue::Int(v) => v.to_string(),
        ConstantValue::Long(v) => v.to_string(),
        ConstantValue::Double(v) => format_double(*v),
        ConstantValue::Char(c) => quote(&c.to_string()),
        ConstantValue::Str(s) => quote(s),
    };
    (text, value.sql_type())
}

/// The discriminator literal that selects `entity`, if it has one.
///
/// Sentinel values (`null`/`not null`) are not literals and yield `None`.
pub fn discriminator_literal(catalog: &dyn RelationCatalog, entity: &str) -> Option<(String, SqlType)> {
    let meta = catalog.find_entity(entity)?;
    let discriminator = catalog.discriminator(entity).ok().flatten()?;
    match &meta.discriminator_value {
        Some(DiscriminatorValue::Literal(v)) => Some((v.clone(), discriminator.ty.clone())),
        _ => None,
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn format_double(v: f64) -> String {
    let text = v.to_string();
    if text.contains(['.', 'e', 'E']) || !v.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_constants() {
        let config = CompilerConfig::default();
        assert_eq!(
            render_constant(&ConstantValue::Str("it's".into()), &config),
            ("'it''s'".to_string(), SqlType::String)
        );
        assert_eq!(
            render_constant(&ConstantValue::Int(7), &config),
            ("7".to_string(), SqlType::Integer)
        );
        assert_eq!(render_constant(&ConstantValue::Double(2.0), &config).0, "2.0");
        assert_eq!(render_constant(&ConstantValue::Bool(true), &config).0, "1");

        let config = CompilerConfig::default().boolean_literals("true", "false");
        assert_eq!(render_constant(&ConstantValue::Bool(false), &config).0, "false");
    }
}
