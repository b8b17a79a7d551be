//! Relational type lattice shared by the catalog and the type resolver.

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// Data type of an expression, a mapped property or a parameter.
///
/// Scalar variants map one-to-one onto column types. Entity and collection
/// types are resolved through the catalog; a component carries the number of
/// columns it spans so that placeholder rendering does not need a catalog.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub enum SqlType {
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    BigInteger,
    BigDecimal,
    Float,
    Double,
    Character,
    String,
    Binary,
    Date,
    Time,
    Timestamp,
    /// Reference to a mapped entity; spans its identifier columns.
    Entity(String),
    /// A mapped collection, addressed by role (`Owner.property`).
    Collection(String),
    /// An embedded value type.
    Component { name: String, columns: u16 },
}

impl SqlType {
    /// Check if this is one of the date/time types.
    pub fn is_datetime(&self) -> bool {
        matches!(self, SqlType::Date | SqlType::Time | SqlType::Timestamp)
    }

    /// Check if this is a numeric type.
    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some() || matches!(self, SqlType::Byte | SqlType::Short)
    }

    /// Check if this is an entity reference.
    pub fn is_entity(&self) -> bool {
        matches!(self, SqlType::Entity(_))
    }

    /// Position of this type in the arithmetic widening order.
    ///
    /// Higher ranks win: double > float > big decimal > big integer > long > integer.
    /// Types outside the widening order return `None`.
    pub fn numeric_rank(&self) -> Option<u8> {
        match self {
            SqlType::Double => Some(6),
            SqlType::Float => Some(5),
            SqlType::BigDecimal => Some(4),
            SqlType::BigInteger => Some(3),
            SqlType::Long => Some(2),
            SqlType::Integer => Some(1),
            _ => None,
        }
    }

    /// Name of the entity this type references, if any.
    pub fn entity_name(&self) -> Option<&str> {
        match self {
            SqlType::Entity(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Boolean => write!(f, "boolean"),
            SqlType::Byte => write!(f, "byte"),
            SqlType::Short => write!(f, "short"),
            SqlType::Integer => write!(f, "integer"),
            SqlType::Long => write!(f, "long"),
            SqlType::BigInteger => write!(f, "big_integer"),
            SqlType::BigDecimal => write!(f, "big_decimal"),
            SqlType::Float => write!(f, "float"),
            SqlType::Double => write!(f, "double"),
            SqlType::Character => write!(f, "character"),
            SqlType::String => write!(f, "string"),
            SqlType::Binary => write!(f, "binary"),
            SqlType::Date => write!(f, "date"),
            SqlType::Time => write!(f, "time"),
            SqlType::Timestamp => write!(f, "timestamp"),
            SqlType::Entity(name) => write!(f, "entity({})", name),
            SqlType::Collection(role) => write!(f, "collection({})", role),
            SqlType::Component { name, .. } => write!(f, "component({})", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening_ranks() {
        assert!(SqlType::Double.numeric_rank() > SqlType::Float.numeric_rank());
        assert!(SqlType::Float.numeric_rank() > SqlType::BigDecimal.numeric_rank());
        assert!(SqlType::BigDecimal.numeric_rank() > SqlType::BigInteger.numeric_rank());
        assert!(SqlType::BigInteger.numeric_rank() > SqlType::Long.numeric_rank());
        assert!(SqlType::Long.numeric_rank() > SqlType::Integer.numeric_rank());
        assert_eq!(SqlType::Short.numeric_rank(), None);
        assert!(SqlType::Short.is_numeric());
    }

    #[test]
    fn test_classification() {
        assert!(SqlType::Timestamp.is_datetime());
        assert!(!SqlType::Long.is_datetime());
        assert!(SqlType::Entity("Order".into()).is_entity());
        assert_eq!(SqlType::Entity("Order".into()).entity_name(), Some("Order"));
        assert_eq!(SqlType::Collection("Order.items".into()).to_string(), "collection(Order.items)");
    }
}
