//! Join synthesis: turns association navigation into From-Elements.

use ormql_proto::{FromElementId, JoinKind, NodeId, ScopeId, StatementKind};
use tracing::{debug, trace};

use crate::catalog::{
    CollectionElement, CollectionIndex, PropertyKind, PropertyLookup, PropertyMeta,
    RelationCatalog,
};
use crate::config::CompilerConfig;
use crate::error::{Result, SemanticError};
use crate::from::{
    column_pairs, ElementRelation, ElementState, FragmentKind, FromElement, JoinSequence,
    JoinStep, PendingCondition, PlanState,
};

/// How a join is requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinRequest<'r> {
    /// Join kind; implied joins use the configured implied kind.
    pub kind: Option<JoinKind>,
    /// Query alias for the new element.
    pub class_alias: Option<&'r str>,
    /// Synthesized from a path expression rather than a FROM clause join.
    pub implied: bool,
    /// Inside `elements()`/`indices()`: a many-to-many stops at the link table.
    pub fold_junction: bool,
}

impl<'r> JoinRequest<'r> {
    /// A join synthesized from path navigation.
    pub fn implied() -> Self {
        Self {
            implied: true,
            ..Self::default()
        }
    }

    /// A join declared in a FROM clause.
    pub fn explicit(kind: JoinKind, class_alias: Option<&'r str>) -> Self {
        Self {
            kind: Some(kind),
            class_alias,
            implied: false,
            fold_junction: false,
        }
    }

    /// Stop many-to-many joins at the link table.
    pub fn folding(mut self) -> Self {
        self.fold_junction = true;
        self
    }
}

/// What the synthesizer needs to know about the element a join starts from.
struct Origin {
    id: FromElementId,
    scope: ScopeId,
    entity: Option<String>,
    collection_path: bool,
}

/// Creates and memoizes From-Elements for one compilation unit.
pub struct JoinSynthesizer<'a> {
    catalog: &'a dyn RelationCatalog,
    config: &'a CompilerConfig,
    plan: &'a mut PlanState,
    statement_kind: StatementKind,
}

impl<'a> JoinSynthesizer<'a> {
    pub fn new(
        catalog: &'a dyn RelationCatalog,
        config: &'a CompilerConfig,
        plan: &'a mut PlanState,
        statement_kind: StatementKind,
    ) -> Self {
        Self {
            catalog,
            config,
            plan,
            statement_kind,
        }
    }

    /// Create the root element for `from Entity alias`.
    pub fn create_root(
        &mut self,
        scope: ScopeId,
        entity: &str,
        class_alias: Option<&str>,
    ) -> Result<FromElementId> {
        let catalog = self.catalog;
        let meta = catalog.require_entity(entity)?;
        let alias = self.plan.aliases.allocate(&meta.name)?;

        let mut element = FromElement::new(
            scope,
            alias.clone(),
            meta.table.clone(),
            ElementRelation::Entity {
                name: meta.name.clone(),
            },
        );
        element.sequence = JoinSequence::rooted(meta.table.clone(), alias.clone());
        element.state = ElementState::Joined;
        element.dml_target = self.statement_kind.is_dml()
            && scope == ScopeId::ROOT
            && self.plan.from.clause(scope).elements.is_empty();
        if element.dml_target {
            element.use_outer_join_fragment = false;
        }

        self.plan
            .query_spaces
            .extend(catalog.query_spaces(&meta.name)?);
        let id = self.plan.from.add_element(element);
        if let Some(class_alias) = class_alias {
            self.plan.from.register_alias(scope, class_alias, id)?;
        }
        debug!(entity = %meta.name, alias = %alias, scope = scope.0, "created root element");
        Ok(id)
    }

    /// Resolve `root.property1.property2...` to a From-Element, joining as needed.
    ///
    /// `root` must be a query alias of this or an enclosing scope, or an entity
    /// name (in which case the path must consist of the entity name alone and a
    /// new root element is created). With an alias or kind hint the last join
    /// is explicit; otherwise every join is implied and memoized.
    pub fn synthesize(
        &mut self,
        scope: ScopeId,
        path: &str,
        alias_hint: Option<&str>,
        kind_hint: Option<JoinKind>,
    ) -> Result<FromElementId> {
        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();
        let properties: Vec<&str> = segments.collect();

        let Some(origin) = self.plan.from.find_element_by_alias(scope, root) else {
            self.catalog.require_entity(root)?;
            if !properties.is_empty() {
                return Err(SemanticError::malformed(
                    "from",
                    format!("'{}' does not start with a query alias", path),
                ));
            }
            return self.create_root(scope, root, alias_hint);
        };
        if properties.is_empty() {
            return Ok(origin);
        }

        let explicit = alias_hint.is_some() || kind_hint.is_some();
        let mut current = origin;
        let mut prefix: Option<String> = None;
        let mut key = root.to_string();
        for (i, segment) in properties.iter().enumerate() {
            let last = i + 1 == properties.len();
            let name = match &prefix {
                Some(p) => format!("{}.{}", p, segment),
                None => segment.to_string(),
            };
            key = format!("{}.{}", key, segment);

            let lookup = self.lookup_property(current, &name)?;
            match &lookup.property.kind {
                PropertyKind::Component { .. } if !last => {
                    prefix = Some(name);
                }
                PropertyKind::ToOne { .. } | PropertyKind::Collection { .. } => {
                    let request = if last && explicit {
                        JoinRequest::explicit(kind_hint.unwrap_or_default(), alias_hint)
                    } else {
                        JoinRequest::implied()
                    };
                    current = self.join_property(scope, current, &lookup, &key, &request)?;
                    prefix = None;
                }
                _ => {
                    return Err(SemanticError::malformed(
                        "join",
                        format!("'{}' is not an association", key),
                    ));
                }
            }
        }
        Ok(current)
    }

    /// Look up a property of the relation an element stands for.
    ///
    /// A hit on a subclass-only property marks the element so that its
    /// subclass tables are always joined.
    pub fn lookup_property(&mut self, element: FromElementId, name: &str) -> Result<PropertyLookup> {
        let relation = self.plan.from.element(element).relation.clone();
        match relation {
            ElementRelation::Entity { name: entity }
            | ElementRelation::Collection {
                element_entity: Some(entity),
                ..
            } => {
                let lookup = self.catalog.find_property(&entity, name)?;
                if lookup.subclass_only {
                    let el = self.plan.from.element_mut(element);
                    el.subclass_property_ref = true;
                    debug!(
                        alias = %el.alias,
                        property = name,
                        subclass = %lookup.declaring_entity,
                        "subclass property forces subclass tables"
                    );
                }
                Ok(lookup)
            }
            ElementRelation::Collection {
                role,
                element_entity: None,
            } => {
                let collection = self.catalog.require_collection(&role)?;
                let property = match &collection.element {
                    CollectionElement::Component { properties, .. } => {
                        properties.iter().find(|p| p.name == name).cloned()
                    }
                    CollectionElement::ManyToMany {
                        target,
                        element_columns,
                    } => {
                        let (id_property, id_type) = self.catalog.identifier(target)?;
                        (name == id_property || name == "id").then(|| PropertyMeta {
                            name: name.to_string(),
                            columns: element_columns.clone(),
                            kind: PropertyKind::Basic(id_type),
                        })
                    }
                    CollectionElement::Scalar { .. } | CollectionElement::OneToMany { .. } => None,
                };
                property
                    .map(|property| PropertyLookup {
                        property,
                        declaring_entity: role.clone(),
                        subclass_only: false,
                    })
                    .ok_or_else(|| SemanticError::unknown_property(&role, name))
            }
        }
    }

    /// Join the association `lookup` off `origin`, reusing the element
    /// memoized for `path` unless the join is explicit.
    pub fn join_property(
        &mut self,
        scope: ScopeId,
        origin: FromElementId,
        lookup: &PropertyLookup,
        path: &str,
        request: &JoinRequest<'_>,
    ) -> Result<FromElementId> {
        if request.implied {
            if let Some(existing) = self.plan.from.find_element_by_path(scope, path) {
                trace!(path, alias = %self.plan.from.element(existing).alias, "reusing join");
                return Ok(existing);
            }
        }

        let origin = self.origin(origin);
        match &lookup.property.kind {
            PropertyKind::ToOne { target, .. } => {
                self.join_entity(scope, &origin, lookup, target, path, request)
            }
            PropertyKind::Collection { role } => {
                if origin.collection_path {
                    return Err(SemanticError::NestedCollectionNotSupported(path.to_string()));
                }
                self.join_collection(scope, &origin, lookup, role, path, request)
            }
            _ => Err(SemanticError::malformed(
                "join",
                format!("'{}' is not an association", path),
            )),
        }
    }

    /// Index metadata for indexed access into `role`.
    pub fn collection_index(&self, role: &str) -> Result<CollectionIndex> {
        let collection = self.catalog.require_collection(role)?;
        let index = collection.index.clone().ok_or_else(|| {
            SemanticError::malformed("[]", format!("collection '{}' is not indexed", role))
        })?;
        if index.is_composite() {
            return Err(SemanticError::UnsupportedCompositeIndex(role.to_string()));
        }
        Ok(index)
    }

    /// Join a collection for `collection[selector]`.
    ///
    /// The selector condition is appended to the step joining the collection's
    /// own table (the link table of a many-to-many).
    pub fn join_indexed(
        &mut self,
        scope: ScopeId,
        origin: FromElementId,
        lookup: &PropertyLookup,
        path: &str,
        selector: NodeId,
    ) -> Result<FromElementId> {
        let PropertyKind::Collection { role } = &lookup.property.kind else {
            return Err(SemanticError::malformed(
                "[]",
                format!("'{}' is not a collection", path),
            ));
        };
        let index = self.collection_index(role)?;
        if let Some(existing) = self.plan.from.find_element_by_path(scope, path) {
            return Ok(existing);
        }

        let origin = self.origin(origin);
        if origin.collection_path {
            return Err(SemanticError::NestedCollectionNotSupported(path.to_string()));
        }
        let id = self.join_collection(scope, &origin, lookup, role, path, &JoinRequest::implied())?;

        let element = self.plan.from.element_mut(id);
        element.indexed = true;
        let collection_alias = element.collection_alias().to_string();
        let column = format!("{}.{}", collection_alias, index.columns[0]);
        debug!(path, column = %column, "indexed collection access");
        element
            .sequence
            .defer_condition(PendingCondition::equals_column(collection_alias, column, selector));
        Ok(id)
    }

    fn origin(&self, id: FromElementId) -> Origin {
        let element = self.plan.from.element(id);
        Origin {
            id,
            scope: element.scope,
            entity: element.entity_name().map(str::to_string),
            collection_path: element.is_collection() && element.implied && !element.indexed,
        }
    }

    /// Qualifier for columns of `declaring`'s table within the origin element,
    /// marking that table referenced.
    fn origin_qualifier(&mut self, origin: &Origin, declaring: &str) -> Result<String> {
        let index = match &origin.entity {
            Some(entity) => self.catalog.table_index(entity, declaring)?,
            None => 0,
        };
        let element = self.plan.from.element_mut(origin.id);
        element.reference_table(index);
        Ok(element.table_alias(index))
    }

    /// Identifier columns of the origin side for a collection key join.
    fn owner_key_columns(&self, origin: &Origin, declaring: &str) -> Result<Vec<String>> {
        match &origin.entity {
            Some(_) => self.catalog.identifier_columns(declaring),
            None => Ok(Vec::new()),
        }
    }

    fn join_entity(
        &mut self,
        scope: ScopeId,
        origin: &Origin,
        lookup: &PropertyLookup,
        target: &str,
        path: &str,
        request: &JoinRequest<'_>,
    ) -> Result<FromElementId> {
        let catalog = self.catalog;
        let meta = catalog.require_entity(target)?;
        let alias = self.plan.aliases.allocate(&meta.name)?;
        let qualifier = self.origin_qualifier(origin, &lookup.declaring_entity)?;
        let id_columns = catalog.identifier_columns(&meta.name)?;
        let kind = request.kind.unwrap_or(self.config.implied_join_kind);

        let mut element = FromElement::new(
            scope,
            alias.clone(),
            meta.table.clone(),
            ElementRelation::Entity {
                name: meta.name.clone(),
            },
        );
        element.sequence.add_step(JoinStep::new(
            meta.table.clone(),
            alias,
            kind,
            column_pairs(&qualifier, &lookup.property.columns, &element.alias, &id_columns),
        ));
        element.use_from_fragment = request.implied && catalog.is_multi_table(&meta.name)?;
        self.plan
            .query_spaces
            .extend(catalog.query_spaces(&meta.name)?);

        self.finish(scope, origin, element, kind, path, request)
    }

    fn join_collection(
        &mut self,
        scope: ScopeId,
        origin: &Origin,
        lookup: &PropertyLookup,
        role: &str,
        path: &str,
        request: &JoinRequest<'_>,
    ) -> Result<FromElementId> {
        let catalog = self.catalog;
        let collection = catalog.require_collection(role)?;
        let kind = request.kind.unwrap_or(self.config.implied_join_kind);
        let qualifier = self.origin_qualifier(origin, &lookup.declaring_entity)?;
        let owner_columns = self.owner_key_columns(origin, &lookup.declaring_entity)?;
        self.plan.query_spaces.insert(collection.table.clone());

        let mut sequence = JoinSequence::new();
        let mut element = match &collection.element {
            CollectionElement::OneToMany { target } => {
                let alias = self.plan.aliases.allocate(target)?;
                sequence.add_step(JoinStep::new(
                    collection.table.clone(),
                    alias.clone(),
                    kind,
                    column_pairs(&qualifier, &owner_columns, &alias, &collection.key_columns),
                ));
                let mut element = FromElement::new(
                    scope,
                    alias.clone(),
                    collection.table.clone(),
                    ElementRelation::Collection {
                        role: role.to_string(),
                        element_entity: Some(target.clone()),
                    },
                );
                element.collection_table_alias = Some(alias);
                element.use_from_fragment =
                    request.implied && catalog.is_multi_table(target)?;
                self.plan
                    .query_spaces
                    .extend(catalog.query_spaces(target)?);
                element
            }
            CollectionElement::ManyToMany {
                target,
                element_columns,
            } => {
                let link_alias = self.plan.aliases.allocate(role)?;
                sequence.add_step(JoinStep::new(
                    collection.table.clone(),
                    link_alias.clone(),
                    kind,
                    column_pairs(&qualifier, &owner_columns, &link_alias, &collection.key_columns),
                ));
                let mut element = if request.fold_junction {
                    FromElement::new(
                        scope,
                        link_alias.clone(),
                        collection.table.clone(),
                        ElementRelation::Collection {
                            role: role.to_string(),
                            element_entity: None,
                        },
                    )
                } else {
                    let target_meta = catalog.require_entity(target)?;
                    let target_alias = self.plan.aliases.allocate(&target_meta.name)?;
                    let target_ids = catalog.identifier_columns(&target_meta.name)?;
                    sequence.add_step(JoinStep::new(
                        target_meta.table.clone(),
                        target_alias.clone(),
                        kind,
                        column_pairs(&link_alias, element_columns, &target_alias, &target_ids),
                    ));
                    self.plan
                        .query_spaces
                        .extend(catalog.query_spaces(target)?);
                    let mut element = FromElement::new(
                        scope,
                        target_alias,
                        target_meta.table.clone(),
                        ElementRelation::Collection {
                            role: role.to_string(),
                            element_entity: Some(target.clone()),
                        },
                    );
                    element.use_from_fragment =
                        request.implied && catalog.is_multi_table(target)?;
                    element
                };
                element.many_to_many = true;
                element.collection_table_alias = Some(link_alias);
                element
            }
            CollectionElement::Scalar { .. } | CollectionElement::Component { .. } => {
                let alias = self.plan.aliases.allocate(role)?;
                sequence.add_step(JoinStep::new(
                    collection.table.clone(),
                    alias.clone(),
                    kind,
                    column_pairs(&qualifier, &owner_columns, &alias, &collection.key_columns),
                ));
                let mut element = FromElement::new(
                    scope,
                    alias.clone(),
                    collection.table.clone(),
                    ElementRelation::Collection {
                        role: role.to_string(),
                        element_entity: None,
                    },
                );
                element.collection_table_alias = Some(alias);
                element
            }
        };

        element.sequence = sequence;
        self.finish(scope, origin, element, kind, path, request)
    }

    /// Common tail of every join: flags, join style, registration.
    fn finish(
        &mut self,
        scope: ScopeId,
        origin: &Origin,
        mut element: FromElement,
        kind: JoinKind,
        path: &str,
        request: &JoinRequest<'_>,
    ) -> Result<FromElementId> {
        let subquery = self.plan.from.clause(scope).is_subquery();
        let correlated = origin.scope != scope;

        element.implied = request.implied;
        element.origin = Some(origin.id);
        element.path = Some(path.to_string());
        element.include_subclasses = !request.implied && !subquery && !self.config.shallow;

        let theta = correlated
            || kind == JoinKind::Theta
            || (request.implied && self.config.theta_style_implicit_joins);
        if theta {
            element.fragment = FragmentKind::FromFragment;
            element.state = ElementState::Correlated;
            element.sequence.set_theta_style(true);
        } else {
            element.fragment = FragmentKind::JoinFragment;
            element.state = ElementState::Joined;
        }

        let alias = element.alias.clone();
        let id = self.plan.from.add_element(element);
        self.plan.from.register_path(scope, path, id);
        if let Some(class_alias) = request.class_alias {
            self.plan.from.register_alias(scope, class_alias, id)?;
        }
        debug!(
            path,
            alias = %alias,
            implied = request.implied,
            correlated,
            theta,
            "created join"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CollectionMeta, EntityMeta, InheritanceStrategy, SchemaBundle};
    use ormql_proto::{SqlType, Statement};

    fn schema() -> SchemaBundle {
        let customer = EntityMeta::new("Customer", "customer")
            .with_property(PropertyMeta::basic("name", "name", SqlType::String))
            .with_property(PropertyMeta::collection("orders", "Customer.orders"));
        let order = EntityMeta::new("Order", "orders")
            .with_property(PropertyMeta::to_one("customer", "Customer", vec!["customer_id"]))
            .with_property(PropertyMeta::collection("items", "Order.items"))
            .with_property(PropertyMeta::collection("products", "Order.products"))
            .with_property(PropertyMeta::collection("notes", "Order.notes"));
        let item = EntityMeta::new("LineItem", "line_item")
            .with_property(PropertyMeta::basic("name", "name", SqlType::String));
        let product = EntityMeta::new("Product", "product")
            .with_inheritance(InheritanceStrategy::Joined);

        SchemaBundle::new(1)
            .with_entity(customer)
            .with_entity(order)
            .with_entity(item)
            .with_entity(product)
            .with_collection(
                CollectionMeta::one_to_many(
                    "Customer.orders",
                    "Customer",
                    "Order",
                    "orders",
                    vec!["customer_id"],
                )
                .with_index(vec!["order_idx"], SqlType::Integer),
            )
            .with_collection(
                CollectionMeta::one_to_many("Order.items", "Order", "LineItem", "line_item", vec!["order_id"])
                    .with_index(vec!["idx"], SqlType::Integer),
            )
            .with_collection(
                CollectionMeta::many_to_many(
                    "Order.products",
                    "Order",
                    "Product",
                    "order_product",
                    vec!["order_id"],
                    vec!["product_id"],
                )
                .with_index(vec!["pos", "sub"], SqlType::Integer),
            )
            .with_collection(CollectionMeta::scalars(
                "Order.notes",
                "Order",
                "order_note",
                vec!["order_id"],
                "note",
                SqlType::String,
            ))
    }

    struct Fixture {
        schema: SchemaBundle,
        config: CompilerConfig,
        plan: PlanState,
    }

    impl Fixture {
        fn new(statement: &Statement) -> Self {
            Self {
                schema: schema(),
                config: CompilerConfig::default(),
                plan: PlanState::new(statement),
            }
        }

        fn synthesizer(&mut self) -> JoinSynthesizer<'_> {
            JoinSynthesizer::new(&self.schema, &self.config, &mut self.plan, StatementKind::Select)
        }
    }

    #[test]
    fn test_implied_join_is_memoized() {
        let statement = Statement::select();
        let mut fx = Fixture::new(&statement);
        let mut synth = fx.synthesizer();
        synth.create_root(ScopeId::ROOT, "Order", Some("o")).unwrap();

        let a = synth.synthesize(ScopeId::ROOT, "o.customer", None, None).unwrap();
        let b = synth.synthesize(ScopeId::ROOT, "o.customer", None, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(fx.plan.from.elements().len(), 2);

        let customer = fx.plan.from.element(a);
        assert!(customer.implied);
        assert!(!customer.include_subclasses);
        assert_eq!(customer.fragment, FragmentKind::JoinFragment);
        assert_eq!(
            customer.sequence.steps[0].conditions[0].render(),
            "order0_.customer_id=customer1_.id"
        );
    }

    #[test]
    fn test_unknown_root_fails() {
        let statement = Statement::select();
        let mut fx = Fixture::new(&statement);
        let err = fx
            .synthesizer()
            .synthesize(ScopeId::ROOT, "Invoice", None, None)
            .unwrap_err();
        assert_eq!(err, SemanticError::UnmappedEntity("Invoice".into()));
    }

    #[test]
    fn test_unknown_property_fails() {
        let statement = Statement::select();
        let mut fx = Fixture::new(&statement);
        let mut synth = fx.synthesizer();
        synth.create_root(ScopeId::ROOT, "Order", Some("o")).unwrap();
        let err = synth
            .synthesize(ScopeId::ROOT, "o.supplier", None, None)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnknownProperty);
    }

    #[test]
    fn test_many_to_many_two_steps() {
        let statement = Statement::select();
        let mut fx = Fixture::new(&statement);
        let mut synth = fx.synthesizer();
        synth.create_root(ScopeId::ROOT, "Order", Some("o")).unwrap();
        let id = synth
            .synthesize(ScopeId::ROOT, "o.products", Some("p"), Some(JoinKind::LeftOuter))
            .unwrap();

        let element = fx.plan.from.element(id);
        assert!(element.many_to_many);
        assert_eq!(element.sequence.steps.len(), 2);
        assert_eq!(element.sequence.steps[0].table, "order_product");
        assert_eq!(element.sequence.steps[1].table, "product");
        assert_eq!(element.sequence.steps[1].kind, JoinKind::LeftOuter);
        assert_eq!(element.class_alias.as_deref(), Some("p"));
        assert!(element.include_subclasses);
    }

    #[test]
    fn test_folded_many_to_many_stops_at_link_table() {
        let statement = Statement::select();
        let mut fx = Fixture::new(&statement);
        let mut synth = fx.synthesizer();
        let root = synth.create_root(ScopeId::ROOT, "Order", Some("o")).unwrap();
        let lookup = synth.lookup_property(root, "products").unwrap();
        let id = synth
            .join_property(ScopeId::ROOT, root, &lookup, "o.products#elements", &JoinRequest::implied().folding())
            .unwrap();

        let element = fx.plan.from.element(id);
        assert_eq!(element.sequence.steps.len(), 1);
        assert_eq!(element.table, "order_product");
        assert_eq!(element.entity_name(), None);
    }

    #[test]
    fn test_composite_index_rejected() {
        let statement = Statement::select();
        let mut fx = Fixture::new(&statement);
        let synth = fx.synthesizer();
        assert_eq!(
            synth.collection_index("Order.products").unwrap_err(),
            SemanticError::UnsupportedCompositeIndex("Order.products".into())
        );
        assert_eq!(
            synth.collection_index("Order.notes").unwrap_err().kind(),
            crate::error::ErrorKind::MalformedOperator
        );
    }

    #[test]
    fn test_nested_collection_rejected() {
        let statement = Statement::select();
        let mut fx = Fixture::new(&statement);
        let mut synth = fx.synthesizer();
        synth.create_root(ScopeId::ROOT, "Customer", Some("c")).unwrap();
        let err = synth
            .synthesize(ScopeId::ROOT, "c.orders.items", None, None)
            .unwrap_err();
        assert_eq!(
            err,
            SemanticError::NestedCollectionNotSupported("c.orders.items".into())
        );
    }

    #[test]
    fn test_indexed_access_defers_selector() {
        let statement = Statement::select();
        let mut fx = Fixture::new(&statement);
        let mut synth = fx.synthesizer();
        let root = synth.create_root(ScopeId::ROOT, "Order", Some("o")).unwrap();
        let lookup = synth.lookup_property(root, "items").unwrap();
        let id = synth
            .join_indexed(ScopeId::ROOT, root, &lookup, "o.items[3]", NodeId(3))
            .unwrap();

        let element = fx.plan.from.element(id);
        assert!(element.indexed);
        assert!(element.sequence.steps[0].extra.is_empty());
        assert_eq!(
            element.sequence.pending,
            vec![PendingCondition::equals_column("lineitem1_", "lineitem1_.idx", NodeId(3))]
        );
    }

    #[test]
    fn test_correlated_join_is_theta() {
        let mut statement = Statement::select();
        let sub = statement.add_subquery(ScopeId::ROOT);
        let mut fx = Fixture::new(&statement);
        let mut synth = fx.synthesizer();
        synth.create_root(ScopeId::ROOT, "Order", Some("o")).unwrap();
        let id = synth.synthesize(sub, "o.customer", None, None).unwrap();

        let element = fx.plan.from.element(id);
        assert_eq!(element.scope, sub);
        assert_eq!(element.state, ElementState::Correlated);
        assert_eq!(element.fragment, FragmentKind::FromFragment);
        assert!(element.sequence.is_theta_style());
        assert_eq!(fx.plan.from.clause(sub).elements, vec![id]);
    }

    #[test]
    fn test_query_spaces_collected() {
        let statement = Statement::select();
        let mut fx = Fixture::new(&statement);
        let mut synth = fx.synthesizer();
        synth.create_root(ScopeId::ROOT, "Order", Some("o")).unwrap();
        synth.synthesize(ScopeId::ROOT, "o.products", Some("p"), None).unwrap();
        let spaces: Vec<&str> = fx.plan.query_spaces.iter().map(String::as_str).collect();
        assert_eq!(spaces, vec!["order_product", "orders", "product"]);
    }
}
