//! SQL function registry.

use std::collections::HashMap;

use ormql_proto::SqlType;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// How a function's return type is determined.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum ReturnRule {
    /// Always the given type.
    Fixed(SqlType),
    /// The type of the first argument.
    ArgumentType,
    /// `sum`: integral types widen to long, floating types to double.
    SumWidening,
}

/// A registered function.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct FunctionDef {
    pub name: String,
    pub returns: ReturnRule,
    /// Aggregates may take `*` and never open a subselect.
    pub aggregate: bool,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, returns: ReturnRule) -> Self {
        Self {
            name: name.into(),
            returns,
            aggregate: false,
        }
    }

    pub fn aggregate(name: impl Into<String>, returns: ReturnRule) -> Self {
        Self {
            aggregate: true,
            ..Self::new(name, returns)
        }
    }

    /// Return type for a call whose first argument has type `arg`.
    ///
    /// `None` when the type depends on an argument that is not yet typed.
    pub fn return_type(&self, arg: Option<&SqlType>) -> Option<SqlType> {
        match &self.returns {
            ReturnRule::Fixed(ty) => Some(ty.clone()),
            ReturnRule::ArgumentType => arg.cloned(),
            ReturnRule::SumWidening => arg.map(|ty| match ty {
                SqlType::Byte | SqlType::Short | SqlType::Integer | SqlType::Long => SqlType::Long,
                SqlType::Float | SqlType::Double => SqlType::Double,
                other => other.clone(),
            }),
        }
    }
}

/// Registry of functions keyed by lower-case name.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct FunctionRegistry {
    pub functions: HashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The aggregates and common scalar functions every dialect supports.
    pub fn standard() -> Self {
        Self::new()
            .with(FunctionDef::aggregate("count", ReturnRule::Fixed(SqlType::Long)))
            .with(FunctionDef::aggregate("avg", ReturnRule::Fixed(SqlType::Double)))
            .with(FunctionDef::aggregate("sum", ReturnRule::SumWidening))
            .with(FunctionDef::aggregate("min", ReturnRule::ArgumentType))
            .with(FunctionDef::aggregate("max", ReturnRule::ArgumentType))
            .with(FunctionDef::new("lower", ReturnRule::Fixed(SqlType::String)))
            .with(FunctionDef::new("upper", ReturnRule::Fixed(SqlType::String)))
            .with(FunctionDef::new("trim", ReturnRule::Fixed(SqlType::String)))
            .with(FunctionDef::new("concat", ReturnRule::Fixed(SqlType::String)))
            .with(FunctionDef::new("substring", ReturnRule::Fixed(SqlType::String)))
            .with(FunctionDef::new("length", ReturnRule::Fixed(SqlType::Integer)))
            .with(FunctionDef::new("locate", ReturnRule::Fixed(SqlType::Integer)))
            .with(FunctionDef::new("abs", ReturnRule::ArgumentType))
            .with(FunctionDef::new("sqrt", ReturnRule::Fixed(SqlType::Double)))
            .with(FunctionDef::new("mod", ReturnRule::Fixed(SqlType::Integer)))
            .with(FunctionDef::new("coalesce", ReturnRule::ArgumentType))
            .with(FunctionDef::new("current_date", ReturnRule::Fixed(SqlType::Date)))
            .with(FunctionDef::new("current_time", ReturnRule::Fixed(SqlType::Time)))
            .with(FunctionDef::new(
                "current_timestamp",
                ReturnRule::Fixed(SqlType::Timestamp),
            ))
    }

    /// Register a function.
    pub fn with(mut self, function: FunctionDef) -> Self {
        self.functions
            .insert(function.name.to_ascii_lowercase(), function);
        self
    }

    /// Look up a function, ignoring case.
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_aggregates() {
        let registry = FunctionRegistry::standard();

        let count = registry.get("COUNT").unwrap();
        assert!(count.aggregate);
        assert_eq!(count.return_type(None), Some(SqlType::Long));

        let avg = registry.get("avg").unwrap();
        assert_eq!(avg.return_type(Some(&SqlType::Integer)), Some(SqlType::Double));

        let max = registry.get("max").unwrap();
        assert_eq!(max.return_type(Some(&SqlType::Date)), Some(SqlType::Date));
        assert_eq!(max.return_type(None), None);
    }

    #[test]
    fn test_sum_widening() {
        let sum = FunctionRegistry::standard().get("sum").cloned().unwrap();
        assert_eq!(sum.return_type(Some(&SqlType::Integer)), Some(SqlType::Long));
        assert_eq!(sum.return_type(Some(&SqlType::Float)), Some(SqlType::Double));
        assert_eq!(
            sum.return_type(Some(&SqlType::BigDecimal)),
            Some(SqlType::BigDecimal)
        );
    }
}
