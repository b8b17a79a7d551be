//! Property metadata.

use ormql_proto::SqlType;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// What a property maps to.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum PropertyKind {
    /// A scalar column (or several, for custom multi-column types).
    Basic(SqlType),
    /// Many-to-one or one-to-one association; columns are the foreign key.
    ToOne { target: String, nullable: bool },
    /// A collection; the columns are empty and the role names the mapping.
    Collection { role: String },
    /// An embedded component; members are registered as `name.member`.
    Component { type_name: String },
}

/// A mapped property of an entity or component.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct PropertyMeta {
    /// Property name; component members use dotted names.
    pub name: String,
    pub columns: Vec<String>,
    pub kind: PropertyKind,
}

impl PropertyMeta {
    /// A single-column scalar property.
    pub fn basic(name: impl Into<String>, column: impl Into<String>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            columns: vec![column.into()],
            kind: PropertyKind::Basic(ty),
        }
    }

    /// A to-one association over the given foreign key columns.
    pub fn to_one(name: impl Into<String>, target: impl Into<String>, columns: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(String::from).collect(),
            kind: PropertyKind::ToOne {
                target: target.into(),
                nullable: false,
            },
        }
    }

    /// A collection property bound to `role`.
    pub fn collection(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            kind: PropertyKind::Collection { role: role.into() },
        }
    }

    /// A component property spanning the given columns.
    pub fn component(
        name: impl Into<String>,
        type_name: impl Into<String>,
        columns: Vec<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(String::from).collect(),
            kind: PropertyKind::Component {
                type_name: type_name.into(),
            },
        }
    }

    /// Mark a to-one association as optional.
    pub fn nullable(mut self) -> Self {
        if let PropertyKind::ToOne { nullable, .. } = &mut self.kind {
            *nullable = true;
        }
        self
    }

    /// The relational type of the property.
    pub fn data_type(&self) -> SqlType {
        match &self.kind {
            PropertyKind::Basic(ty) => ty.clone(),
            PropertyKind::ToOne { target, .. } => SqlType::Entity(target.clone()),
            PropertyKind::Collection { role } => SqlType::Collection(role.clone()),
            PropertyKind::Component { type_name } => SqlType::Component {
                name: type_name.clone(),
                columns: self.columns.len() as u16,
            },
        }
    }

    /// Check if navigating through this property requires a join.
    pub fn is_association(&self) -> bool {
        matches!(
            self.kind,
            PropertyKind::ToOne { .. } | PropertyKind::Collection { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_types() {
        let customer = PropertyMeta::to_one("customer", "Customer", vec!["customer_id"]).nullable();
        assert_eq!(customer.data_type(), SqlType::Entity("Customer".into()));
        assert!(matches!(customer.kind, PropertyKind::ToOne { nullable: true, .. }));

        let address = PropertyMeta::component("address", "Address", vec!["street", "city"]);
        assert_eq!(
            address.data_type(),
            SqlType::Component {
                name: "Address".into(),
                columns: 2
            }
        );
        assert!(!address.is_association());
    }
}
