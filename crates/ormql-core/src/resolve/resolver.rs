//! Expression resolution.
//!
//! Walks every scope of a statement in order (FROM declarations, select
//! items, WHERE, then assignments of a bulk statement), binding identifiers
//! and paths to From-Elements, synthesizing the joins paths imply, inferring
//! result types and pushing expected types down to parameters.

use ormql_proto::{
    ArithmeticOp, ComparisonOp, FromDecl, FromElementId, LiteralKind, LogicalOp, NodeId,
    NodeKind, ScopeId, SqlType, Statement, UnaryOp,
};
use tracing::{debug, trace};

use super::arithmetic::{expected_operand_type, result_type, ArithmeticType};
use super::constant::{discriminator_literal, render_constant};
use super::literal::classify_numeric;
use crate::catalog::{CollectionElement, PropertyKind, PropertyLookup, RelationCatalog};
use crate::config::CompilerConfig;
use crate::error::{Result, SemanticError};
use crate::from::{column_pairs, PendingCondition, PlanState, Projection};
use crate::join::{JoinRequest, JoinSynthesizer};

/// The clause an expression is resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    From,
    /// `with` condition of an explicit join.
    With,
    Select,
    Where,
    /// `set` list of a bulk update.
    Set,
}

/// Where a path currently points: an element, or a component of one.
#[derive(Debug, Clone)]
enum Anchor {
    Element(FromElementId),
    Component { element: FromElementId, prefix: String },
}

impl Anchor {
    /// Element and property name for `property` relative to this anchor.
    fn property_of(&self, property: &str) -> (FromElementId, String) {
        match self {
            Anchor::Element(element) => (*element, property.to_string()),
            Anchor::Component { element, prefix } => (*element, format!("{}.{}", prefix, property)),
        }
    }
}

/// Resolves the expressions of one statement.
pub struct Resolver<'a> {
    catalog: &'a dyn RelationCatalog,
    config: &'a CompilerConfig,
    statement: &'a mut Statement,
    plan: &'a mut PlanState,
    scope: ScopeId,
    clause: Clause,
    deferred: Vec<NodeId>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        catalog: &'a dyn RelationCatalog,
        config: &'a CompilerConfig,
        statement: &'a mut Statement,
        plan: &'a mut PlanState,
    ) -> Self {
        Self {
            catalog,
            config,
            statement,
            plan,
            scope: ScopeId::ROOT,
            clause: Clause::From,
            deferred: Vec::new(),
        }
    }

    /// Resolve the whole statement.
    ///
    /// Returns the identifiers that could not be bound and were left as raw
    /// text.
    pub fn resolve_statement(mut self) -> Result<Vec<NodeId>> {
        self.resolve_scope(ScopeId::ROOT)?;
        self.resolve_assignments()?;
        Ok(self.deferred)
    }

    fn synthesizer(&mut self) -> JoinSynthesizer<'_> {
        JoinSynthesizer::new(self.catalog, self.config, &mut *self.plan, self.statement.kind)
    }

    fn resolve_scope(&mut self, scope: ScopeId) -> Result<()> {
        let saved = (self.scope, self.clause);
        self.scope = scope;
        let spec = self.statement.scope(scope).clone();

        self.clause = Clause::From;
        for decl in &spec.from {
            self.resolve_from_decl(decl)?;
        }
        self.clause = Clause::Select;
        for item in &spec.select {
            self.resolve_select_item(*item)?;
        }
        if let Some(condition) = spec.where_clause {
            self.clause = Clause::Where;
            self.resolve(condition)?;
        }

        trace!(scope = scope.0, "resolved scope");
        (self.scope, self.clause) = saved;
        Ok(())
    }

    fn resolve_from_decl(&mut self, decl: &FromDecl) -> Result<()> {
        let scope = self.scope;
        match decl {
            FromDecl::Entity { name, alias, .. } => {
                self.synthesizer().create_root(scope, name, alias.as_deref())?;
            }
            FromDecl::Join {
                path,
                alias,
                kind,
                with,
                ..
            } => {
                let element = self
                    .synthesizer()
                    .synthesize(scope, path, alias.as_deref(), Some(*kind))?;
                if let Some(with) = with {
                    self.apply_with(element, *with)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve a `with` condition and attach it to the last step of the join.
    /// Its text is rendered with the scope, after any subquery inside it.
    fn apply_with(&mut self, element: FromElementId, condition: NodeId) -> Result<()> {
        self.clause = Clause::With;
        self.resolve(condition)?;

        let sequence = &mut self.plan.from.element_mut(element).sequence;
        let step = sequence.steps.last().map(|s| s.alias.clone());
        sequence.defer_condition(PendingCondition::expression(step, condition));
        self.clause = Clause::From;
        Ok(())
    }

    fn resolve_assignments(&mut self) -> Result<()> {
        self.scope = ScopeId::ROOT;
        self.clause = Clause::Set;
        let assignments = self.statement.assignments.clone();
        for assignment in assignments {
            self.resolve(assignment.target)?;
            self.resolve(assignment.value)?;
            if let Some(ty) = self.type_of(assignment.target) {
                self.expect(assignment.value, &ty);
            }
        }
        Ok(())
    }

    fn resolve_select_item(&mut self, id: NodeId) -> Result<()> {
        if let NodeKind::Ident(name) = &self.statement.tree.node(id).kind {
            if let Some(element) = self.plan.from.find_element_by_alias(self.scope, name) {
                return self.project_element(id, element);
            }
        }

        self.resolve(id)?;
        let node = self.statement.tree.node(id);
        if node.data_type.is_none() && node.expected_type.is_none() {
            if self.deferred.contains(&id) {
                return Err(SemanticError::UnresolvedIdentifier(node.text.clone()));
            }
            let untyped_ok = node.is_parameter()
                || matches!(node.kind, NodeKind::Literal(LiteralKind::Null));
            if !untyped_ok {
                return Err(SemanticError::UnresolvableType(node.text.clone()));
            }
        }
        Ok(())
    }

    /// Resolve one expression node and everything below it.
    fn resolve(&mut self, id: NodeId) -> Result<()> {
        let node = self.statement.tree.node(id);
        if node.resolved {
            return Ok(());
        }
        match node.kind.clone() {
            NodeKind::Ident(name) => self.resolve_ident(id, &name)?,
            NodeKind::Dot { lhs, property } => self.resolve_dot(id, lhs, &property)?,
            NodeKind::Index { .. } => self.resolve_indexed_value(id)?,
            NodeKind::Literal(kind) => self.resolve_literal(id, kind)?,
            // typed by the enclosing operator, rendered last
            NodeKind::Parameter(_) => return Ok(()),
            NodeKind::Arithmetic { op, lhs, rhs } => self.resolve_arithmetic(id, op, lhs, rhs)?,
            NodeKind::Comparison { op, lhs, rhs } => self.resolve_comparison(id, op, lhs, rhs)?,
            NodeKind::Logical { op, operands } => {
                if operands.is_empty() {
                    let symbol = match op {
                        LogicalOp::And => "and",
                        LogicalOp::Or => "or",
                    };
                    return Err(SemanticError::malformed(symbol, "at least one operand is required"));
                }
                for operand in operands {
                    self.resolve(operand)?;
                }
                self.set_type(id, Some(SqlType::Boolean));
            }
            NodeKind::Unary { op, operand } => self.resolve_unary(id, op, operand)?,
            NodeKind::Between {
                subject, low, high, ..
            } => self.resolve_between(id, subject, low, high)?,
            NodeKind::In {
                subject,
                candidates,
                ..
            } => self.resolve_in(id, subject, &candidates)?,
            NodeKind::Function { name, args } => self.resolve_function(id, &name, &args)?,
            NodeKind::Subquery(scope) => {
                self.resolve_scope(scope)?;
                let ty = self
                    .statement
                    .scope(scope)
                    .select
                    .first()
                    .and_then(|item| self.type_of(*item));
                self.set_type(id, ty);
            }
            NodeKind::Synthetic { .. } => self.set_type(id, Some(SqlType::Boolean)),
        }
        self.statement.tree.node_mut(id).resolved = true;
        Ok(())
    }

    // Identifiers and paths

    /// Bind a bare identifier: query alias, entity name (discriminator
    /// value), named constant, unqualified property of the first element of
    /// the scope; anything else is deferred and kept as raw text.
    fn resolve_ident(&mut self, id: NodeId, name: &str) -> Result<()> {
        let scope = self.scope;
        if let Some(element) = self.plan.from.find_element_by_alias(scope, name) {
            let (columns, ty) = self.element_value(element)?;
            self.set_columns(id, &columns, Some(ty), Some(element));
            return Ok(());
        }
        if let Some((text, ty)) = discriminator_literal(self.catalog, name) {
            self.set_leaf(id, text, Some(ty));
            return Ok(());
        }
        if let Some(value) = self.catalog.find_constant(name) {
            let (text, ty) = render_constant(value, self.config);
            self.set_leaf(id, text, Some(ty));
            return Ok(());
        }
        if let Some(first) = self.unqualified_owner(name) {
            let key = format!("{}.{}", self.plan.from.element(first).display_name(), name);
            let lookup = self.synthesizer().lookup_property(first, name)?;
            return self.resolve_terminal(id, first, lookup, &key);
        }

        debug!(identifier = name, scope = scope.0, "deferring unresolved identifier");
        self.set_leaf(id, name.to_string(), None);
        self.deferred.push(id);
        Ok(())
    }

    /// The first element of the scope if it has a property `name`.
    fn unqualified_owner(&self, name: &str) -> Option<FromElementId> {
        let first = self.plan.from.clause(self.scope).first_element()?;
        let entity = self.plan.from.element(first).entity_name()?;
        self.catalog.find_property(entity, name).ok().map(|_| first)
    }

    fn resolve_dot(&mut self, id: NodeId, lhs: NodeId, property: &str) -> Result<()> {
        if let Some(root) = self.root_ident(lhs) {
            let bound = self.plan.from.find_element_by_alias(self.scope, &root).is_some()
                || self.unqualified_owner(&root).is_some();
            if !bound {
                let text = self.statement.tree.node(id).text.clone();
                if let Some(value) = self.catalog.find_constant(&text) {
                    let (sql, ty) = render_constant(value, self.config);
                    self.set_leaf(id, sql, Some(ty));
                    return Ok(());
                }
            }
        }
        if self.resolve_identifier_shortcut(id, lhs, property)? {
            return Ok(());
        }

        let (anchor, key) = self.anchor(lhs)?;
        let key = format!("{}.{}", key, property);
        let (element, name) = anchor.property_of(property);
        let lookup = self.synthesizer().lookup_property(element, &name)?;
        self.resolve_terminal(id, element, lookup, &key)
    }

    /// The identifier a path starts from.
    fn root_ident(&self, id: NodeId) -> Option<String> {
        let mut current = id;
        loop {
            match &self.statement.tree.node(current).kind {
                NodeKind::Ident(name) => return Some(name.clone()),
                NodeKind::Dot { lhs, .. } => current = *lhs,
                NodeKind::Index { collection, .. } => current = *collection,
                _ => return None,
            }
        }
    }

    /// `x.assoc.id` over a mandatory to-one reads the foreign key instead of
    /// joining the target.
    fn resolve_identifier_shortcut(&mut self, id: NodeId, lhs: NodeId, property: &str) -> Result<bool> {
        let NodeKind::Dot {
            lhs: owner,
            property: association,
        } = self.statement.tree.node(lhs).kind.clone()
        else {
            return Ok(false);
        };
        let (anchor, _) = self.anchor(owner)?;
        let (element, name) = anchor.property_of(&association);
        let lookup = self.synthesizer().lookup_property(element, &name)?;
        let PropertyKind::ToOne {
            target,
            nullable: false,
        } = &lookup.property.kind
        else {
            return Ok(false);
        };
        let (id_property, id_type) = self.catalog.identifier(target)?;
        if property != id_property && property != "id" {
            return Ok(false);
        }

        let columns = self.qualify(element, &lookup)?;
        trace!(path = %self.statement.tree.node(id).text, "identifier read from foreign key");
        self.set_columns(id, &columns, Some(id_type), Some(element));
        Ok(true)
    }

    /// Resolve the dereferenceable part of a path, joining associations.
    /// Returns the anchor and the path key used for join memoization.
    fn anchor(&mut self, id: NodeId) -> Result<(Anchor, String)> {
        match self.statement.tree.node(id).kind.clone() {
            NodeKind::Ident(name) => {
                if let Some(element) = self.plan.from.find_element_by_alias(self.scope, &name) {
                    self.statement.tree.node_mut(id).from_element = Some(element);
                    return Ok((Anchor::Element(element), name));
                }
                match self.unqualified_owner(&name) {
                    Some(first) => {
                        let key = self.plan.from.element(first).display_name().to_string();
                        self.dereference(Anchor::Element(first), &name, format!("{}.{}", key, name))
                    }
                    None => Err(SemanticError::UnmappedEntity(name)),
                }
            }
            NodeKind::Dot { lhs, property } => {
                let (anchor, key) = self.anchor(lhs)?;
                let key = format!("{}.{}", key, property);
                self.dereference(anchor, &property, key)
            }
            NodeKind::Index { .. } => {
                let (element, key) = self.join_index(id)?;
                Ok((Anchor::Element(element), key))
            }
            _ => Err(SemanticError::malformed(
                ".",
                format!("'{}' cannot be dereferenced", self.statement.tree.node(id).text),
            )),
        }
    }

    fn dereference(&mut self, anchor: Anchor, property: &str, key: String) -> Result<(Anchor, String)> {
        let (element, name) = anchor.property_of(property);
        let lookup = self.synthesizer().lookup_property(element, &name)?;
        match &lookup.property.kind {
            PropertyKind::Component { .. } => Ok((Anchor::Component { element, prefix: name }, key)),
            PropertyKind::ToOne { .. } | PropertyKind::Collection { .. } => {
                let scope = self.scope;
                let joined = self.synthesizer().join_property(
                    scope,
                    element,
                    &lookup,
                    &key,
                    &JoinRequest::implied(),
                )?;
                Ok((Anchor::Element(joined), key))
            }
            PropertyKind::Basic(_) => Err(SemanticError::malformed(
                ".",
                format!("'{}' is neither an association nor a component", key),
            )),
        }
    }

    /// Resolve the last property of a path.
    fn resolve_terminal(
        &mut self,
        id: NodeId,
        element: FromElementId,
        lookup: PropertyLookup,
        key: &str,
    ) -> Result<()> {
        let scope = self.scope;
        match lookup.property.kind.clone() {
            PropertyKind::Basic(ty) => {
                let columns = self.qualify(element, &lookup)?;
                self.set_columns(id, &columns, Some(ty), Some(element));
            }
            PropertyKind::Component { type_name } => {
                let columns = self.qualify(element, &lookup)?;
                let ty = SqlType::Component {
                    name: type_name,
                    columns: columns.len() as u16,
                };
                self.set_columns(id, &columns, Some(ty), Some(element));
            }
            PropertyKind::ToOne { target, .. } => {
                if self.clause == Clause::Select && !self.config.shallow {
                    let joined = self.synthesizer().join_property(
                        scope,
                        element,
                        &lookup,
                        key,
                        &JoinRequest::implied(),
                    )?;
                    return self.project_element(id, joined);
                }
                let columns = self.qualify(element, &lookup)?;
                self.set_columns(id, &columns, Some(SqlType::Entity(target)), Some(element));
            }
            PropertyKind::Collection { .. } => {
                let joined = self.synthesizer().join_property(
                    scope,
                    element,
                    &lookup,
                    key,
                    &JoinRequest::implied(),
                )?;
                let (columns, ty) = self.element_value(joined)?;
                self.set_columns(id, &columns, Some(ty), Some(joined));
            }
        }
        Ok(())
    }

    fn resolve_indexed_value(&mut self, id: NodeId) -> Result<()> {
        let (element, _) = self.join_index(id)?;
        let is_entity = self.plan.from.element(element).entity_name().is_some();
        if self.clause == Clause::Select && is_entity {
            return self.project_element(id, element);
        }
        let (columns, ty) = self.element_value(element)?;
        self.set_columns(id, &columns, Some(ty), Some(element));
        Ok(())
    }

    /// Join the collection of `collection[selector]`.
    ///
    /// The selector is resolved first, its parameters expect the index type,
    /// and it becomes part of the join condition.
    fn join_index(&mut self, id: NodeId) -> Result<(FromElementId, String)> {
        let NodeKind::Index {
            collection,
            selector,
        } = self.statement.tree.node(id).kind.clone()
        else {
            return Err(SemanticError::malformed("[]", "not an indexed access"));
        };

        let (owner, name, key) = match self.statement.tree.node(collection).kind.clone() {
            NodeKind::Dot { lhs, property } => {
                let (anchor, key) = self.anchor(lhs)?;
                let (owner, name) = anchor.property_of(&property);
                (owner, name, format!("{}.{}", key, property))
            }
            NodeKind::Ident(name) => {
                let owner = self
                    .unqualified_owner(&name)
                    .ok_or_else(|| SemanticError::UnresolvedIdentifier(name.clone()))?;
                let key = format!("{}.{}", self.plan.from.element(owner).display_name(), name);
                (owner, name, key)
            }
            _ => {
                return Err(SemanticError::malformed(
                    "[]",
                    format!("'{}' is not a collection path", self.statement.tree.node(collection).text),
                ))
            }
        };

        let lookup = self.synthesizer().lookup_property(owner, &name)?;
        let PropertyKind::Collection { role } = lookup.property.kind.clone() else {
            return Err(SemanticError::malformed(
                "[]",
                format!("'{}' is not a collection", key),
            ));
        };
        let index = self.synthesizer().collection_index(&role)?;

        self.resolve(selector)?;
        self.expect(selector, &index.ty);
        let path = format!("{}[{}]", key, self.statement.tree.node(selector).text);

        let scope = self.scope;
        let element = self
            .synthesizer()
            .join_indexed(scope, owner, &lookup, &path, selector)?;

        let node = self.statement.tree.node_mut(collection);
        node.data_type = Some(SqlType::Collection(role));
        node.from_element = Some(element);
        node.resolved = true;
        Ok((element, path))
    }

    // Values of elements

    /// Identity columns of an entity element, or the value columns of a
    /// value collection element.
    fn element_value(&mut self, element: FromElementId) -> Result<(Vec<String>, SqlType)> {
        let entity = self.plan.from.element(element).entity_name().map(str::to_string);
        match entity {
            Some(entity) => {
                let qualifier = self.qualifier(element, &entity)?;
                let columns = self.catalog.identifier_columns(&entity)?;
                Ok((qualified(qualifier.as_deref(), &columns), SqlType::Entity(entity)))
            }
            None => self.collection_value(element),
        }
    }

    fn collection_value(&mut self, element: FromElementId) -> Result<(Vec<String>, SqlType)> {
        let el = self.plan.from.element_mut(element);
        el.reference_table(0);
        let alias = el.alias.clone();
        let role = el.role().map(str::to_string).unwrap_or_default();
        let collection = self.catalog.require_collection(&role)?;

        let columns_of = |columns: &[String]| qualified(Some(&alias), columns);
        Ok(match &collection.element {
            CollectionElement::Scalar { ty, column } => {
                (columns_of(std::slice::from_ref(column)), ty.clone())
            }
            CollectionElement::Component {
                type_name,
                properties,
            } => {
                let columns: Vec<String> = properties.iter().flat_map(|p| p.columns.clone()).collect();
                let ty = SqlType::Component {
                    name: type_name.clone(),
                    columns: columns.len() as u16,
                };
                (columns_of(&columns), ty)
            }
            CollectionElement::ManyToMany {
                target,
                element_columns,
            } => (columns_of(element_columns), SqlType::Entity(target.clone())),
            CollectionElement::OneToMany { target } => {
                let columns = self.catalog.identifier_columns(target)?;
                (columns_of(&columns), SqlType::Entity(target.clone()))
            }
        })
    }

    /// Render an element as a select item: every mapped column, or only the
    /// identifier in shallow queries and subqueries. Property columns are
    /// added by post-processing, once subclass tables are decided.
    fn project_element(&mut self, id: NodeId, element: FromElementId) -> Result<()> {
        if self.plan.from.element(element).entity_name().is_none() {
            let (columns, ty) = self.collection_value(element)?;
            self.set_columns(id, &columns, Some(ty), Some(element));
            return Ok(());
        }

        let subquery = self.statement.scope(self.scope).is_subquery();
        let (columns, ty) = self.element_value(element)?;
        self.set_columns(id, &columns, Some(ty), Some(element));
        if !self.config.shallow && !subquery {
            self.plan.from.element_mut(element).reference_all_tables();
            self.plan.projections.push(Projection {
                scope: self.scope,
                node: id,
                element,
            });
        }
        Ok(())
    }

    /// Qualifier for columns of `declaring`'s table in `element`, marking the
    /// table referenced.
    ///
    /// Columns of a bulk statement target are unqualified in the statement
    /// itself and qualified by table name inside its subqueries.
    fn qualifier(&mut self, element: FromElementId, declaring: &str) -> Result<Option<String>> {
        let entity = self.plan.from.element(element).entity_name().map(str::to_string);
        let index = match &entity {
            Some(entity) => self.catalog.table_index(entity, declaring)?,
            None => 0,
        };
        let el = self.plan.from.element_mut(element);
        el.reference_table(index);
        if !el.dml_target {
            return Ok(Some(el.table_alias(index)));
        }
        if self.scope == ScopeId::ROOT {
            return Ok(None);
        }
        let table = match &entity {
            Some(entity) => self
                .catalog
                .table_closure(entity)?
                .get(index)
                .map(|t| t.table.clone()),
            None => None,
        };
        Ok(Some(table.unwrap_or_else(|| el.table.clone())))
    }

    fn qualify(&mut self, element: FromElementId, lookup: &PropertyLookup) -> Result<Vec<String>> {
        let qualifier = self.qualifier(element, &lookup.declaring_entity)?;
        Ok(qualified(qualifier.as_deref(), &lookup.property.columns))
    }

    // Literals and operators

    fn resolve_literal(&mut self, id: NodeId, kind: LiteralKind) -> Result<()> {
        let text = self.statement.tree.node(id).text.clone();
        match kind {
            LiteralKind::Numeric => {
                let literal = classify_numeric(&text, self.config.decimal_format)?;
                self.set_leaf(id, literal.text, Some(literal.ty));
            }
            LiteralKind::String => self.set_leaf(id, text, Some(SqlType::String)),
            LiteralKind::Boolean => {
                let value = text.eq_ignore_ascii_case("true");
                let sql = self.config.render_boolean(value).to_string();
                self.set_leaf(id, sql, Some(SqlType::Boolean));
            }
            LiteralKind::Null => self.set_leaf(id, "null".to_string(), None),
        }
        Ok(())
    }

    fn resolve_arithmetic(
        &mut self,
        id: NodeId,
        op: ArithmeticOp,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
    ) -> Result<()> {
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return Err(SemanticError::malformed(op.symbol(), "both operands are required"));
        };
        self.resolve(lhs)?;
        self.resolve(rhs)?;

        let (lhs_type, rhs_type) = (self.type_of(lhs), self.type_of(rhs));
        match (&lhs_type, &rhs_type) {
            (Some(known), None) => {
                if let Some(expected) = expected_operand_type(op, known, true) {
                    self.expect(rhs, &expected);
                }
            }
            (None, Some(known)) => {
                if let Some(expected) = expected_operand_type(op, known, false) {
                    self.expect(lhs, &expected);
                }
            }
            _ => {}
        }

        let text = self.statement.tree.node(id).text.clone();
        let ty = match result_type(op, lhs_type.as_ref(), rhs_type.as_ref(), &text)? {
            ArithmeticType::Known(ty) => Some(ty),
            ArithmeticType::Guessed(ty) => {
                if !self.config.allow_arithmetic_type_guess {
                    return Err(SemanticError::UnresolvableType(text));
                }
                debug!(expression = %text, guess = %ty, "guessing arithmetic result type");
                Some(ty)
            }
            ArithmeticType::Unknown => None,
        };
        self.set_type(id, ty);
        Ok(())
    }

    fn resolve_comparison(
        &mut self,
        id: NodeId,
        op: ComparisonOp,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
    ) -> Result<()> {
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return Err(SemanticError::malformed(op.symbol(), "both operands are required"));
        };
        self.resolve(lhs)?;
        self.resolve(rhs)?;
        match (self.type_of(lhs), self.type_of(rhs)) {
            (Some(known), None) => self.expect(rhs, &known),
            (None, Some(known)) => self.expect(lhs, &known),
            _ => {}
        }
        self.set_type(id, Some(SqlType::Boolean));
        Ok(())
    }

    fn resolve_unary(&mut self, id: NodeId, op: UnaryOp, operand: Option<NodeId>) -> Result<()> {
        let Some(operand) = operand else {
            let symbol = match op {
                UnaryOp::Negate => "-",
                UnaryOp::Not => "not",
                UnaryOp::IsNull => "is null",
                UnaryOp::IsNotNull => "is not null",
                UnaryOp::Exists => "exists",
            };
            return Err(SemanticError::malformed(symbol, "an operand is required"));
        };
        self.resolve(operand)?;
        let ty = match op {
            UnaryOp::Negate => self.type_of(operand),
            _ => Some(SqlType::Boolean),
        };
        self.set_type(id, ty);
        Ok(())
    }

    fn resolve_between(
        &mut self,
        id: NodeId,
        subject: Option<NodeId>,
        low: Option<NodeId>,
        high: Option<NodeId>,
    ) -> Result<()> {
        let (Some(subject), Some(low), Some(high)) = (subject, low, high) else {
            let text = self.statement.tree.node(id).text.clone();
            return Err(SemanticError::MalformedBetween(text));
        };
        let operands = [subject, low, high];
        for operand in operands {
            self.resolve(operand)?;
        }
        let types: Vec<Option<SqlType>> = operands.iter().map(|o| self.type_of(*o)).collect();
        for (i, operand) in operands.iter().enumerate() {
            if types[i].is_some() {
                continue;
            }
            let other = types
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .find_map(|(_, t)| t.clone());
            if let Some(ty) = other {
                self.expect(*operand, &ty);
            }
        }
        self.set_type(id, Some(SqlType::Boolean));
        Ok(())
    }

    fn resolve_in(&mut self, id: NodeId, subject: Option<NodeId>, candidates: &[NodeId]) -> Result<()> {
        let Some(subject) = subject else {
            return Err(SemanticError::malformed("in", "a left-hand subject is required"));
        };
        if candidates.is_empty() {
            return Err(SemanticError::malformed("in", "the candidate list is empty"));
        }
        self.resolve(subject)?;
        for candidate in candidates {
            self.resolve(*candidate)?;
        }

        let mut subject_type = self.type_of(subject);
        if subject_type.is_none() {
            if let Some(ty) = candidates.iter().find_map(|c| self.type_of(*c)) {
                self.expect(subject, &ty);
                subject_type = Some(ty);
            }
        }
        let Some(ty) = subject_type else {
            let text = self.statement.tree.node(subject).text.clone();
            return Err(SemanticError::UnresolvableType(text));
        };
        for candidate in candidates {
            self.expect(*candidate, &ty);
        }
        self.set_type(id, Some(SqlType::Boolean));
        Ok(())
    }

    // Functions

    fn resolve_function(&mut self, id: NodeId, name: &str, args: &[NodeId]) -> Result<()> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "size" => return self.resolve_size(id, args),
            "elements" | "indices" => return self.resolve_collection_function(id, &lower, args),
            _ => {}
        }
        for arg in args {
            self.resolve(*arg)?;
        }
        let first = args.first().and_then(|a| self.type_of(*a));
        let ty = self.catalog.resolve_function_return_type(name, first.as_ref())?;
        self.set_type(id, ty);
        Ok(())
    }

    /// The owning element and property of a collection function argument.
    fn collection_argument(
        &mut self,
        function: &str,
        args: &[NodeId],
    ) -> Result<(FromElementId, PropertyLookup, String, String)> {
        let [arg] = args else {
            return Err(SemanticError::malformed(function, "exactly one collection argument is required"));
        };
        let (owner, name, key) = match self.statement.tree.node(*arg).kind.clone() {
            NodeKind::Dot { lhs, property } => {
                let (anchor, key) = self.anchor(lhs)?;
                let (owner, name) = anchor.property_of(&property);
                (owner, name, format!("{}.{}", key, property))
            }
            NodeKind::Ident(name) => {
                let owner = self
                    .unqualified_owner(&name)
                    .ok_or_else(|| SemanticError::UnresolvedIdentifier(name.clone()))?;
                let key = format!("{}.{}", self.plan.from.element(owner).display_name(), name);
                (owner, name, key)
            }
            _ => {
                return Err(SemanticError::malformed(
                    function,
                    format!("'{}' is not a collection path", self.statement.tree.node(*arg).text),
                ))
            }
        };
        let lookup = self.synthesizer().lookup_property(owner, &name)?;
        let PropertyKind::Collection { role } = lookup.property.kind.clone() else {
            return Err(SemanticError::malformed(
                function,
                format!("'{}' is not a collection", key),
            ));
        };
        let node = self.statement.tree.node_mut(*arg);
        node.data_type = Some(SqlType::Collection(role.clone()));
        node.resolved = true;
        Ok((owner, lookup, key, role))
    }

    /// `size(x.collection)` renders a correlated count subquery.
    fn resolve_size(&mut self, id: NodeId, args: &[NodeId]) -> Result<()> {
        let (owner, lookup, _, role) = self.collection_argument("size", args)?;
        let catalog = self.catalog;
        let collection = catalog.require_collection(&role)?;

        let owner_qualifier = match self.qualifier(owner, &lookup.declaring_entity)? {
            Some(q) => q,
            None => self.plan.from.element(owner).table.clone(),
        };
        let owner_columns = catalog.identifier_columns(&lookup.declaring_entity)?;
        let alias = self.plan.aliases.allocate(&role)?;
        let condition = column_pairs(&owner_qualifier, &owner_columns, &alias, &collection.key_columns)
            .iter()
            .map(|pair| pair.render())
            .collect::<Vec<_>>()
            .join(" and ");
        let counted = collection.key_columns.first().cloned().unwrap_or_else(|| "*".to_string());
        let text = format!(
            "(select count({alias}.{counted}) from {table} {alias} where {condition})",
            table = collection.table,
        );
        self.plan.query_spaces.insert(collection.table.clone());
        self.set_leaf(id, text, Some(SqlType::Integer));
        Ok(())
    }

    /// `elements(x.collection)` and `indices(x.collection)` join the
    /// collection, stopping many-to-many joins at the link table.
    fn resolve_collection_function(&mut self, id: NodeId, function: &str, args: &[NodeId]) -> Result<()> {
        let (owner, lookup, key, role) = self.collection_argument(function, args)?;
        let scope = self.scope;
        let path = format!("{}({})", function, key);
        let element = self.synthesizer().join_property(
            scope,
            owner,
            &lookup,
            &path,
            &JoinRequest::implied().folding(),
        )?;

        let (columns, ty) = if function == "indices" {
            let index = self.synthesizer().collection_index(&role)?;
            let el = self.plan.from.element_mut(element);
            el.reference_table(0);
            let columns = qualified(Some(el.collection_alias()), &index.columns);
            (columns, index.ty)
        } else {
            self.element_value(element)?
        };
        self.set_columns(id, &columns, Some(ty), Some(element));
        Ok(())
    }

    // Node annotation helpers

    /// Data type of a node, or the type its context expects.
    fn type_of(&self, id: NodeId) -> Option<SqlType> {
        let node = self.statement.tree.node(id);
        node.data_type.clone().or_else(|| node.expected_type.clone())
    }

    /// Impose an expected type on an untyped parameter.
    fn expect(&mut self, id: NodeId, ty: &SqlType) {
        let node = self.statement.tree.node_mut(id);
        if node.is_parameter() && node.expected_type.is_none() {
            trace!(parameter = %node.text, expected = %ty, "inferred parameter type");
            node.expected_type = Some(ty.clone());
        }
    }

    fn set_type(&mut self, id: NodeId, ty: Option<SqlType>) {
        self.statement.tree.node_mut(id).data_type = ty;
    }

    fn set_leaf(&mut self, id: NodeId, text: String, ty: Option<SqlType>) {
        let node = self.statement.tree.node_mut(id);
        node.rendered = Some(text);
        node.data_type = ty;
        node.resolved = true;
    }

    /// Set a column list as the node's text. Several columns are a row value
    /// outside the select list.
    fn set_columns(
        &mut self,
        id: NodeId,
        columns: &[String],
        ty: Option<SqlType>,
        element: Option<FromElementId>,
    ) {
        let joined = columns.join(", ");
        let text = if columns.len() > 1 && self.clause != Clause::Select {
            format!("({})", joined)
        } else {
            joined
        };
        self.set_leaf(id, text, ty);
        self.statement.tree.node_mut(id).from_element = element;
    }
}

fn qualified(qualifier: Option<&str>, columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .map(|c| match qualifier {
            Some(q) => format!("{}.{}", q, c),
            None => c.clone(),
        })
        .collect()
}
