//! Semantic errors raised while resolving a statement.

use thiserror::Error;

/// Result type for the resolution core.
pub type Result<T> = std::result::Result<T, SemanticError>;

/// A compilation failure. Every variant is terminal: the statement is rejected
/// and no partial plan is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    /// An entity or class name is not registered in the catalog.
    #[error("entity '{0}' is not mapped")]
    UnmappedEntity(String),

    /// A collection role is not registered in the catalog.
    #[error("collection role '{0}' is not mapped")]
    UnknownCollection(String),

    /// A property does not exist on the owning relation.
    #[error("could not resolve property '{property}' of '{owner}'")]
    UnknownProperty { owner: String, property: String },

    /// A function is not registered.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// An explicit join path starts with an undeclared alias.
    #[error("alias '{0}' is not defined in this query")]
    UnknownAlias(String),

    /// An operator node lacks a structurally required operand.
    #[error("malformed '{operator}' expression: {reason}")]
    MalformedOperator { operator: String, reason: String },

    /// A BETWEEN node lacks its subject or one of its bounds.
    #[error("malformed between expression '{0}': subject, low and high bounds are required")]
    MalformedBetween(String),

    /// No type could be determined where one is mandatory.
    #[error("could not determine the type of '{0}'")]
    UnresolvableType(String),

    /// Date/time operands combined with an unsupported operator.
    #[error("invalid date/time arithmetic '{0}'")]
    InvalidDateTimeArithmetic(String),

    /// Indexed access into a collection with a multi-column index.
    #[error("composite index of collection '{0}' cannot be used in indexed access")]
    UnsupportedCompositeIndex(String),

    /// A query alias declared twice in one scope chain.
    #[error("alias '{0}' is declared more than once")]
    DuplicateAlias(String),

    /// A collection dereferenced directly off another implied collection join.
    #[error("collection '{0}' cannot be navigated from another collection; use an explicit join")]
    NestedCollectionNotSupported(String),

    /// A numeric literal that cannot be interpreted.
    #[error("invalid numeric literal '{0}'")]
    InvalidLiteral(String),

    /// Bulk DML on a multi-table entity with a sentinel discriminator.
    #[error("cannot restrict bulk statement on '{0}': discriminator value is a null/not-null sentinel")]
    InvalidDiscriminatorPath(String),

    /// A deferred identifier was needed as a value.
    #[error("unresolved identifier '{0}'")]
    UnresolvedIdentifier(String),

    /// Enabling a filter that is not defined.
    #[error("filter '{0}' is not defined")]
    UnknownFilter(String),

    /// A filter condition references an undeclared parameter.
    #[error("filter '{filter}' has no parameter '{parameter}'")]
    MissingFilterParameter { filter: String, parameter: String },

    /// The alias counter overflowed.
    #[error("alias space exhausted")]
    AliasSpaceExhausted,

    /// Catalog snapshot or configuration could not be decoded.
    #[error("catalog error: {0}")]
    Catalog(String),
}

/// Discriminant of a [`SemanticError`] for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnmappedEntity,
    UnknownCollection,
    UnknownProperty,
    UnknownFunction,
    UnknownAlias,
    DuplicateAlias,
    MalformedOperator,
    MalformedBetween,
    UnresolvableType,
    InvalidDateTimeArithmetic,
    UnsupportedCompositeIndex,
    NestedCollectionNotSupported,
    InvalidLiteral,
    InvalidDiscriminatorPath,
    UnresolvedIdentifier,
    UnknownFilter,
    MissingFilterParameter,
    AliasSpaceExhausted,
    Catalog,
}

impl SemanticError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SemanticError::UnmappedEntity(_) => ErrorKind::UnmappedEntity,
            SemanticError::UnknownCollection(_) => ErrorKind::UnknownCollection,
            SemanticError::UnknownProperty { .. } => ErrorKind::UnknownProperty,
            SemanticError::UnknownFunction(_) => ErrorKind::UnknownFunction,
            SemanticError::UnknownAlias(_) => ErrorKind::UnknownAlias,
            SemanticError::DuplicateAlias(_) => ErrorKind::DuplicateAlias,
            SemanticError::MalformedOperator { .. } => ErrorKind::MalformedOperator,
            SemanticError::MalformedBetween(_) => ErrorKind::MalformedBetween,
            SemanticError::UnresolvableType(_) => ErrorKind::UnresolvableType,
            SemanticError::InvalidDateTimeArithmetic(_) => ErrorKind::InvalidDateTimeArithmetic,
            SemanticError::UnsupportedCompositeIndex(_) => ErrorKind::UnsupportedCompositeIndex,
            SemanticError::NestedCollectionNotSupported(_) => {
                ErrorKind::NestedCollectionNotSupported
            }
            SemanticError::InvalidLiteral(_) => ErrorKind::InvalidLiteral,
            SemanticError::InvalidDiscriminatorPath(_) => ErrorKind::InvalidDiscriminatorPath,
            SemanticError::UnresolvedIdentifier(_) => ErrorKind::UnresolvedIdentifier,
            SemanticError::UnknownFilter(_) => ErrorKind::UnknownFilter,
            SemanticError::MissingFilterParameter { .. } => ErrorKind::MissingFilterParameter,
            SemanticError::AliasSpaceExhausted => ErrorKind::AliasSpaceExhausted,
            SemanticError::Catalog(_) => ErrorKind::Catalog,
        }
    }

    /// Create an unknown property error.
    pub fn unknown_property(owner: &str, property: &str) -> Self {
        SemanticError::UnknownProperty {
            owner: owner.to_string(),
            property: property.to_string(),
        }
    }

    /// Create a malformed operator error.
    pub fn malformed(operator: &str, reason: impl Into<String>) -> Self {
        SemanticError::MalformedOperator {
            operator: operator.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for SemanticError {
    fn from(e: serde_json::Error) -> Self {
        SemanticError::Catalog(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_offending_name() {
        let err = SemanticError::unknown_property("Order", "nme");
        assert_eq!(err.kind(), ErrorKind::UnknownProperty);
        assert_eq!(err.to_string(), "could not resolve property 'nme' of 'Order'");

        let err = SemanticError::malformed("between", "missing high bound");
        assert!(err.to_string().contains("missing high bound"));
    }
}
