//! Join & restriction post-processing.
//!
//! Runs once per scope after every expression of the statement is resolved:
//! decides which hierarchy tables each element joins, completes entity
//! projections, renders join sequences into FROM/WHERE fragments, injects
//! filter conditions and discriminator restrictions, and splices the
//! leftover WHERE fragments into the scope's WHERE tree as synthetic nodes.

use std::collections::HashMap;

use ormql_proto::{
    FromElementId, JoinKind, NodeKind, ParameterSpec, ScopeId, SqlType, Statement,
    SyntheticGroup,
};
use tracing::{debug, instrument, trace};

use super::fragment::FragmentRenderer;
use crate::catalog::{DiscriminatorValue, FilterBinding, PropertyKind, RelationCatalog, TableRole};
use crate::config::CompilerConfig;
use crate::error::{Result, SemanticError};
use crate::filter::ActiveFilters;
use crate::from::{
    column_pairs, ElementRelation, ElementState, FragmentKind, FromElement, JoinStep, PlanState,
    RenderedFragment,
};

/// What post-processing produced for one scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeFragments {
    /// The scope's FROM clause text.
    pub from_text: String,
    /// Parameters of the filter-conditions group (and of bulk statement
    /// restrictions), in text order.
    pub group_parameters: Vec<ParameterSpec>,
    /// Parameters of filters embedded in join conditions, in FROM text order.
    pub embedded_parameters: Vec<ParameterSpec>,
}

/// Finalizes the From-Elements of resolved scopes.
pub struct PostProcessor<'a> {
    catalog: &'a dyn RelationCatalog,
    config: &'a CompilerConfig,
    renderer: &'a dyn FragmentRenderer,
    filters: &'a ActiveFilters,
}

impl<'a> PostProcessor<'a> {
    pub fn new(
        catalog: &'a dyn RelationCatalog,
        config: &'a CompilerConfig,
        renderer: &'a dyn FragmentRenderer,
        filters: &'a ActiveFilters,
    ) -> Self {
        Self {
            catalog,
            config,
            renderer,
            filters,
        }
    }

    /// Finalize every element of `scope` and rewrite its WHERE tree.
    #[instrument(skip_all, fields(scope = scope.0))]
    pub fn process(
        &self,
        statement: &mut Statement,
        plan: &mut PlanState,
        scope: ScopeId,
    ) -> Result<ScopeFragments> {
        let ids = plan.from.element_ids(scope);
        let subquery = plan.from.clause(scope).is_subquery();
        // Filter conditions may reach any table, so nothing can be omitted.
        let track_references = self.config.omit_unreferenced_tables && self.filters.is_empty();

        let mut filter_conditions = Vec::new();
        let mut bulk_restrictions = Vec::new();
        for id in &ids {
            let element = plan.from.element_mut(*id);
            if !track_references {
                element.reference_all_tables();
            }
            self.decide_subclasses(element, subquery);
            if element.dml_target {
                bulk_restrictions.extend(self.bulk_restrictions(element)?);
                element.state = ElementState::Joined;
                element.rendered = Some(RenderedFragment {
                    from_text: element.table.clone(),
                    where_text: String::new(),
                });
                continue;
            }
            self.restrict_discriminator(element)?;
            filter_conditions.extend(self.apply_filters(element)?);
            self.add_hierarchy_joins(element)?;
            let rendered = self.render_element(element);
            element.rendered = Some(rendered);
        }
        self.finish_projections(statement, plan, scope)?;

        let mut fragments = ScopeFragments::default();
        let mut theta_conditions = Vec::new();
        let mut from_parameters: HashMap<FromElementId, Vec<ParameterSpec>> = HashMap::new();
        let mut theta_parameters = Vec::new();
        for id in &ids {
            let element = plan.from.element_mut(*id);
            let Some(rendered) = element.rendered.as_mut() else {
                continue;
            };
            if !self.filters.is_empty() {
                let (from_text, params) = self.expand(&rendered.from_text)?;
                rendered.from_text = from_text;
                from_parameters.insert(*id, params);
                let (where_text, params) = self.expand(&rendered.where_text)?;
                rendered.where_text = where_text;
                theta_parameters.extend(params);
            }
            if !rendered.where_text.is_empty() {
                theta_conditions.push(rendered.where_text.clone());
            }
        }

        let filter_conditions = self.expand_all(filter_conditions, &mut fragments.group_parameters)?;
        let bulk_restrictions = self.expand_all(bulk_restrictions, &mut fragments.group_parameters)?;

        let (from_text, layout) = assemble_from_text(plan, &ids);
        fragments.from_text = from_text;
        // markers bind in the order the fragments appear in the FROM text
        for id in layout {
            if let Some(params) = from_parameters.remove(&id) {
                fragments.embedded_parameters.extend(params);
            }
        }
        fragments.embedded_parameters.extend(theta_parameters);
        inject_restrictions(
            statement,
            scope,
            [
                (SyntheticGroup::FilterConditions, filter_conditions),
                (SyntheticGroup::ThetaJoins, theta_conditions),
                (SyntheticGroup::Discriminator, bulk_restrictions),
            ],
        );
        Ok(fragments)
    }

    /// `include = requested && !subquery && !shallow`, overridden to `true`
    /// when a subclass-only property was dereferenced.
    fn decide_subclasses(&self, element: &mut FromElement, subquery: bool) {
        let requested = element.include_subclasses;
        let include =
            (requested && !subquery && !self.config.shallow) || element.subclass_property_ref;
        if include != requested {
            debug!(
                alias = %element.alias,
                include,
                subclass_property_ref = element.subclass_property_ref,
                "subclass inclusion changed"
            );
        }
        element.include_subclasses = include;
    }

    /// Append the property columns of every entity projected in `scope`.
    fn finish_projections(&self, statement: &mut Statement, plan: &PlanState, scope: ScopeId) -> Result<()> {
        for projection in plan.projections.iter().filter(|p| p.scope == scope) {
            let element = plan.from.element(projection.element);
            let Some(entity) = element.entity_name() else {
                continue;
            };
            let columns = self.entity_columns(element, entity)?;
            let node = statement.tree.node_mut(projection.node);
            let mut items: Vec<String> = node.rendered.take().into_iter().collect();
            items.extend(columns);
            node.rendered = Some(items.join(", "));
        }
        Ok(())
    }

    /// Property and discriminator columns of an entity element, across its
    /// superclass tables and, when subclasses are included, its subclasses.
    fn entity_columns(&self, element: &FromElement, entity: &str) -> Result<Vec<String>> {
        let own = self.catalog.require_entity(entity)?;
        let mut owners = vec![own];
        owners.extend(self.catalog.superclasses(entity)?);
        if element.include_subclasses {
            owners.extend(self.catalog.subclasses(entity));
        }

        let mut columns = Vec::new();
        if let Some(discriminator) = self.catalog.discriminator(entity)? {
            let root = self.catalog.hierarchy_root(entity)?;
            let index = self.catalog.table_index(entity, &root.name)?;
            columns.push(format!("{}.{}", element.table_alias(index), discriminator.column));
        }
        for meta in owners {
            let qualifier = element.table_alias(self.catalog.table_index(entity, &meta.name)?);
            for property in &meta.properties {
                let nested_member = property.name.contains('.');
                if nested_member || matches!(property.kind, PropertyKind::Collection { .. }) {
                    continue;
                }
                for column in &property.columns {
                    let column = format!("{}.{}", qualifier, column);
                    if !columns.contains(&column) {
                        columns.push(column);
                    }
                }
            }
        }
        Ok(columns)
    }

    /// Discriminator restriction for an element over a subclass of a
    /// single-table hierarchy.
    fn restrict_discriminator(&self, element: &mut FromElement) -> Result<()> {
        let Some(entity) = element.entity_name().map(str::to_string) else {
            return Ok(());
        };
        let Some(fragment) = self.catalog.filter_fragment(&entity, &element.alias, true)? else {
            return Ok(());
        };
        trace!(alias = %element.alias, restriction = %fragment, "discriminator restriction");
        let alias = element.alias.clone();
        let ansi = element.sequence.root.is_none() && !element.sequence.is_theta_style();
        if !(ansi && element.sequence.append_condition(&alias, fragment.clone())) {
            element.sequence.add_restriction(fragment);
        }
        Ok(())
    }

    /// Attach the conditions of enabled filters bound to the element's
    /// relation. Joins that stay ANSI carry them in their `on` clause; the
    /// rest are returned for the filter-conditions group.
    fn apply_filters(&self, element: &mut FromElement) -> Result<Vec<String>> {
        if self.filters.is_empty() {
            return Ok(Vec::new());
        }
        let mut conditions: Vec<(String, String)> = Vec::new();
        match &element.relation {
            ElementRelation::Entity { name } => {
                for (alias, binding) in self.entity_bindings(element, name)? {
                    conditions.push((alias.clone(), binding.render(&alias)));
                }
            }
            ElementRelation::Collection { role, .. } => {
                let collection = self.catalog.require_collection(role)?;
                let alias = element.collection_alias().to_string();
                for binding in self.filters.applicable(&collection.filters) {
                    conditions.push((alias.clone(), binding.render(&alias)));
                }
            }
        }

        let stays_ansi = element.fragment == FragmentKind::JoinFragment
            && !element.sequence.is_theta_style()
            && element.sequence.restrictions.is_empty();
        let mut group = Vec::new();
        for (alias, condition) in conditions {
            debug!(alias = %element.alias, condition = %condition, embedded = stays_ansi, "applying filter");
            if !(stays_ansi && element.sequence.append_condition(&alias, condition.clone())) {
                group.push(condition);
            }
        }
        Ok(group)
    }

    /// Enabled filter bindings of an entity and its superclasses, each with
    /// the alias of the table declaring it.
    fn entity_bindings(&self, element: &FromElement, entity: &str) -> Result<Vec<(String, FilterBinding)>> {
        let own = self.catalog.require_entity(entity)?;
        let mut out = Vec::new();
        for meta in std::iter::once(own).chain(self.catalog.superclasses(entity)?) {
            let index = self.catalog.table_index(entity, &meta.name)?;
            for binding in self.filters.applicable(&meta.filters) {
                out.push((element.table_alias(index), binding.clone()));
            }
        }
        Ok(out)
    }

    /// Join the superclass and subclass tables of a multi-table entity.
    ///
    /// Superclass tables are inner-joined when referenced (or always, for
    /// elements rendered with their full table chain); subclass tables are
    /// outer-joined when subclasses are included and the table is referenced.
    fn add_hierarchy_joins(&self, element: &mut FromElement) -> Result<()> {
        let Some(entity) = element.entity_name().map(str::to_string) else {
            return Ok(());
        };
        let tables = self.catalog.table_closure(&entity)?;
        let Some((own, related)) = tables.split_first() else {
            return Ok(());
        };
        let base = element.table_alias(0);
        for (offset, table) in related.iter().enumerate() {
            let index = offset + 1;
            let referenced = element.is_table_referenced(index);
            let kind = match table.role {
                TableRole::Superclass if referenced || element.use_from_fragment => JoinKind::Inner,
                TableRole::Subclass
                    if element.include_subclasses
                        && (referenced || element.subclass_property_ref) =>
                {
                    JoinKind::LeftOuter
                }
                _ => continue,
            };
            let alias = element.table_alias(index);
            trace!(element = %element.alias, table = %table.table, alias = %alias, "hierarchy join");
            let conditions = column_pairs(&base, &own.key_columns, &alias, &table.key_columns);
            element.sequence.add_step(
                JoinStep::new(table.table.clone(), alias, kind, conditions).within_hierarchy(),
            );
        }
        Ok(())
    }

    /// Render an element, flipping a join fragment that rendered theta style
    /// (or produced WHERE conditions) into a plain from fragment.
    fn render_element(&self, element: &mut FromElement) -> RenderedFragment {
        let rendered = self
            .renderer
            .render(&element.sequence, element.use_outer_join_fragment);
        let inconsistent = element.fragment == FragmentKind::JoinFragment
            && (element.sequence.is_theta_style() || !rendered.where_text.is_empty());
        if !inconsistent {
            return rendered;
        }
        debug!(alias = %element.alias, "join fragment rendered theta style, using from fragment");
        element.fragment = FragmentKind::FromFragment;
        element.state = ElementState::Correlated;
        element.sequence.set_theta_style(true);
        self.renderer
            .render(&element.sequence, element.use_outer_join_fragment)
    }

    /// Restrictions narrowing a bulk update/delete to the target's subtype,
    /// plus enabled filters, with alias qualifiers stripped.
    fn bulk_restrictions(&self, element: &FromElement) -> Result<Vec<String>> {
        let Some(entity) = element.entity_name().map(str::to_string) else {
            return Ok(Vec::new());
        };
        let meta = self.catalog.require_entity(&entity)?;
        let sentinel = meta
            .discriminator_value
            .as_ref()
            .is_some_and(DiscriminatorValue::is_sentinel);
        if sentinel && self.catalog.is_multi_table(&entity)? {
            return Err(SemanticError::InvalidDiscriminatorPath(entity));
        }

        let mut fragments = Vec::new();
        if let Some(fragment) = self.catalog.filter_fragment(&entity, &element.alias, true)? {
            fragments.push(fragment);
        }
        for (alias, binding) in self.entity_bindings(element, &entity)? {
            fragments.push(binding.render(&alias));
        }

        let table_count = self.catalog.table_closure(&entity)?.len();
        let qualifiers: Vec<String> = (0..table_count)
            .map(|i| format!("{}.", element.table_alias(i)))
            .collect();
        Ok(fragments
            .into_iter()
            .map(|fragment| {
                qualifiers
                    .iter()
                    .fold(fragment, |text, qualifier| text.replace(qualifier.as_str(), ""))
            })
            .collect())
    }

    fn expand(&self, text: &str) -> Result<(String, Vec<ParameterSpec>)> {
        self.filters.expand_parameters(text, self.catalog, self.config)
    }

    fn expand_all(&self, texts: Vec<String>, parameters: &mut Vec<ParameterSpec>) -> Result<Vec<String>> {
        if self.filters.is_empty() {
            return Ok(texts);
        }
        texts
            .into_iter()
            .map(|text| {
                let (text, params) = self.expand(&text)?;
                parameters.extend(params);
                Ok(text)
            })
            .collect()
    }
}

/// FROM text of a scope: from fragments separated by commas, each followed
/// by the join fragments hanging off it. Also returns the element ids in
/// the order their fragments appear in the text.
fn assemble_from_text(plan: &PlanState, ids: &[FromElementId]) -> (String, Vec<FromElementId>) {
    let mut groups: Vec<(String, Vec<FromElementId>)> = Vec::new();
    let mut group_of: HashMap<FromElementId, usize> = HashMap::new();
    for id in ids {
        let element = plan.from.element(*id);
        let Some(rendered) = &element.rendered else {
            continue;
        };
        if rendered.from_text.is_empty() {
            continue;
        }
        let target = match element.fragment {
            FragmentKind::FromFragment => None,
            FragmentKind::JoinFragment => element
                .origin
                .and_then(|origin| group_of.get(&origin).copied())
                .or_else(|| groups.len().checked_sub(1)),
        };
        match target {
            Some(group) => {
                let (text, members) = &mut groups[group];
                text.push(' ');
                text.push_str(&rendered.from_text);
                members.push(*id);
                group_of.insert(*id, group);
            }
            None => {
                groups.push((rendered.from_text.clone(), vec![*id]));
                group_of.insert(*id, groups.len() - 1);
            }
        }
    }
    let text = groups
        .iter()
        .map(|(text, _)| text.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let layout = groups.into_iter().flat_map(|(_, members)| members).collect();
    (text, layout)
}

/// Insert synthetic groups ahead of the scope's WHERE root, in the given
/// order, under a new `and` root.
fn inject_restrictions<const N: usize>(
    statement: &mut Statement,
    scope: ScopeId,
    groups: [(SyntheticGroup, Vec<String>); N],
) {
    let mut operands = Vec::new();
    for (group, fragments) in groups {
        if fragments.is_empty() {
            continue;
        }
        let text = fragments.join(" and ");
        debug!(scope = scope.0, ?group, restriction = %text, "injecting synthetic restriction");
        let id = statement
            .tree
            .add(NodeKind::Synthetic { group, fragments }, text.clone());
        let node = statement.tree.node_mut(id);
        node.rendered = Some(text);
        node.data_type = Some(SqlType::Boolean);
        node.resolved = true;
        operands.push(id);
    }
    if operands.is_empty() {
        return;
    }
    if let Some(existing) = statement.scope(scope).where_clause {
        operands.push(existing);
    }
    let root = if operands.len() == 1 {
        operands[0]
    } else {
        let root = statement.tree.and(operands);
        let node = statement.tree.node_mut(root);
        node.data_type = Some(SqlType::Boolean);
        node.resolved = true;
        root
    };
    statement.scope_mut(scope).where_clause = Some(root);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityMeta, SchemaBundle};
    use crate::from::JoinSequence;
    use crate::post::AnsiFragmentRenderer;
    use pretty_assertions::assert_eq;

    fn schema() -> SchemaBundle {
        SchemaBundle::new(1)
            .with_entity(EntityMeta::new("Order", "orders"))
            .with_entity(EntityMeta::new("Customer", "customer"))
            .with_entity(EntityMeta::new("LineItem", "line_item"))
    }

    fn entity(name: &str) -> ElementRelation {
        ElementRelation::Entity { name: name.into() }
    }

    fn root(plan: &mut PlanState, alias: &str, table: &str, name: &str) -> FromElementId {
        let mut element = FromElement::new(ScopeId::ROOT, alias, table, entity(name));
        element.sequence = JoinSequence::rooted(table, alias);
        plan.from.add_element(element)
    }

    fn joined(
        plan: &mut PlanState,
        origin: FromElementId,
        alias: &str,
        table: &str,
        name: &str,
        fk: &str,
    ) -> FromElementId {
        let origin_alias = plan.from.element(origin).alias.clone();
        let mut element = FromElement::new(ScopeId::ROOT, alias, table, entity(name));
        element.fragment = FragmentKind::JoinFragment;
        element.origin = Some(origin);
        element.sequence.add_step(JoinStep::new(
            table,
            alias,
            JoinKind::Inner,
            column_pairs(
                &origin_alias,
                &[fk.to_string()],
                alias,
                &["id".to_string()],
            ),
        ));
        plan.from.add_element(element)
    }

    fn process(statement: &mut Statement, plan: &mut PlanState) -> ScopeFragments {
        let schema = schema();
        let config = CompilerConfig::default();
        let filters = ActiveFilters::new();
        PostProcessor::new(&schema, &config, &AnsiFragmentRenderer, &filters)
            .process(statement, plan, ScopeId::ROOT)
            .unwrap()
    }

    #[test]
    fn test_join_fragment_with_restriction_becomes_from_fragment() {
        let mut statement = Statement::select();
        let mut plan = PlanState::new(&statement);
        let order = root(&mut plan, "order0_", "orders", "Order");
        let customer = joined(&mut plan, order, "customer1_", "customer", "Customer", "customer_id");
        plan.from
            .element_mut(customer)
            .sequence
            .add_restriction("customer1_.active = 1");

        let fragments = process(&mut statement, &mut plan);
        assert_eq!(fragments.from_text, "orders order0_, customer customer1_");

        let element = plan.from.element(customer);
        assert_eq!(element.fragment, FragmentKind::FromFragment);
        assert_eq!(element.state, ElementState::Correlated);

        let condition = statement.scope(ScopeId::ROOT).where_clause.unwrap();
        let node = statement.tree.node(condition);
        assert!(matches!(
            node.kind,
            NodeKind::Synthetic {
                group: SyntheticGroup::ThetaJoins,
                ..
            }
        ));
        assert_eq!(
            node.sql(),
            "order0_.customer_id=customer1_.id and customer1_.active = 1"
        );
    }

    #[test]
    fn test_join_fragments_follow_their_origin() {
        let mut statement = Statement::select();
        let mut plan = PlanState::new(&statement);
        let order = root(&mut plan, "order0_", "orders", "Order");
        root(&mut plan, "customer1_", "customer", "Customer");
        joined(&mut plan, order, "lineitem2_", "line_item", "LineItem", "item_id");

        let fragments = process(&mut statement, &mut plan);
        assert_eq!(
            fragments.from_text,
            "orders order0_ inner join line_item lineitem2_ on order0_.item_id=lineitem2_.id, \
             customer customer1_"
        );
        assert!(statement.scope(ScopeId::ROOT).where_clause.is_none());
        assert!(fragments.group_parameters.is_empty());
    }
}
