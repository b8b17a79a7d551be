//! Collection metadata.

use ormql_proto::SqlType;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use super::filter::FilterBinding;
use super::property::PropertyMeta;

/// Index (list position or map key) of an indexed collection.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct CollectionIndex {
    pub columns: Vec<String>,
    pub ty: SqlType,
}

impl CollectionIndex {
    /// Check if the index spans more than one column.
    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }
}

/// What the collection contains.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum CollectionElement {
    /// Entities whose table carries the key columns.
    OneToMany { target: String },
    /// Entities reached through a link table; `element_columns` reference the target id.
    ManyToMany {
        target: String,
        element_columns: Vec<String>,
    },
    /// Scalar values stored in the collection table.
    Scalar { ty: SqlType, column: String },
    /// Component values stored in the collection table.
    Component {
        type_name: String,
        properties: Vec<PropertyMeta>,
    },
}

/// A mapped collection.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct CollectionMeta {
    /// Role name, `Owner.property`.
    pub role: String,
    pub owner: String,
    /// Collection table: the target table for one-to-many, the link table for
    /// many-to-many, the value table otherwise.
    pub table: String,
    /// Columns referencing the owner's identifier.
    pub key_columns: Vec<String>,
    pub index: Option<CollectionIndex>,
    pub element: CollectionElement,
    /// Dynamic filter conditions applied when the collection is joined.
    pub filters: Vec<FilterBinding>,
}

impl CollectionMeta {
    fn new(
        role: impl Into<String>,
        owner: impl Into<String>,
        table: impl Into<String>,
        key_columns: Vec<&str>,
        element: CollectionElement,
    ) -> Self {
        Self {
            role: role.into(),
            owner: owner.into(),
            table: table.into(),
            key_columns: key_columns.into_iter().map(String::from).collect(),
            index: None,
            element,
            filters: Vec::new(),
        }
    }

    /// A one-to-many collection stored in the target table.
    pub fn one_to_many(
        role: impl Into<String>,
        owner: impl Into<String>,
        target: impl Into<String>,
        target_table: impl Into<String>,
        key_columns: Vec<&str>,
    ) -> Self {
        Self::new(
            role,
            owner,
            target_table,
            key_columns,
            CollectionElement::OneToMany {
                target: target.into(),
            },
        )
    }

    /// A many-to-many collection through `link_table`.
    pub fn many_to_many(
        role: impl Into<String>,
        owner: impl Into<String>,
        target: impl Into<String>,
        link_table: impl Into<String>,
        key_columns: Vec<&str>,
        element_columns: Vec<&str>,
    ) -> Self {
        Self::new(
            role,
            owner,
            link_table,
            key_columns,
            CollectionElement::ManyToMany {
                target: target.into(),
                element_columns: element_columns.into_iter().map(String::from).collect(),
            },
        )
    }

    /// A collection of scalar values.
    pub fn scalars(
        role: impl Into<String>,
        owner: impl Into<String>,
        table: impl Into<String>,
        key_columns: Vec<&str>,
        column: impl Into<String>,
        ty: SqlType,
    ) -> Self {
        Self::new(
            role,
            owner,
            table,
            key_columns,
            CollectionElement::Scalar {
                ty,
                column: column.into(),
            },
        )
    }

    /// A collection of component values.
    pub fn components(
        role: impl Into<String>,
        owner: impl Into<String>,
        table: impl Into<String>,
        key_columns: Vec<&str>,
        type_name: impl Into<String>,
        properties: Vec<PropertyMeta>,
    ) -> Self {
        Self::new(
            role,
            owner,
            table,
            key_columns,
            CollectionElement::Component {
                type_name: type_name.into(),
                properties,
            },
        )
    }

    /// Make the collection indexed (list or map).
    pub fn with_index(mut self, columns: Vec<&str>, ty: SqlType) -> Self {
        self.index = Some(CollectionIndex {
            columns: columns.into_iter().map(String::from).collect(),
            ty,
        });
        self
    }

    /// Attach a dynamic filter condition.
    pub fn with_filter(mut self, binding: FilterBinding) -> Self {
        self.filters.push(binding);
        self
    }

    /// Target entity of an entity collection.
    pub fn element_entity(&self) -> Option<&str> {
        match &self.element {
            CollectionElement::OneToMany { target }
            | CollectionElement::ManyToMany { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn is_many_to_many(&self) -> bool {
        matches!(self.element, CollectionElement::ManyToMany { .. })
    }

    /// Property name of the role (`Order.items` -> `items`).
    pub fn property_name(&self) -> &str {
        self.role.rsplit('.').next().unwrap_or(&self.role)
    }

    /// The relational type of one element.
    pub fn element_type(&self) -> SqlType {
        match &self.element {
            CollectionElement::OneToMany { target }
            | CollectionElement::ManyToMany { target, .. } => SqlType::Entity(target.clone()),
            CollectionElement::Scalar { ty, .. } => ty.clone(),
            CollectionElement::Component {
                type_name,
                properties,
            } => SqlType::Component {
                name: type_name.clone(),
                columns: properties.iter().map(|p| p.columns.len()).sum::<usize>() as u16,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_one_to_many() {
        let items = CollectionMeta::one_to_many(
            "Order.items",
            "Order",
            "LineItem",
            "line_item",
            vec!["order_id"],
        )
        .with_index(vec!["idx"], SqlType::Integer);

        assert_eq!(items.property_name(), "items");
        assert_eq!(items.element_entity(), Some("LineItem"));
        assert!(!items.index.as_ref().unwrap().is_composite());
        assert!(!items.is_many_to_many());
    }

    #[test]
    fn test_scalar_element_type() {
        let tags = CollectionMeta::scalars(
            "Product.tags",
            "Product",
            "product_tag",
            vec!["product_id"],
            "tag",
            SqlType::String,
        );
        assert_eq!(tags.element_type(), SqlType::String);
        assert_eq!(tags.element_entity(), None);
    }
}
