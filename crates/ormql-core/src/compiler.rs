//! Statement compilation: resolution, post-processing and rendering.

use std::collections::HashMap;
use std::sync::Arc;

use ormql_proto::{
    NodeKind, ParamRef, ParameterSource, ParameterSpec, ScopeId, SqlType, Statement,
    StatementKind,
};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::catalog::RelationCatalog;
use crate::config::CompilerConfig;
use crate::error::Result;
use crate::filter::ActiveFilters;
use crate::from::{FromElement, PlanState};
use crate::post::{AnsiFragmentRenderer, FragmentRenderer, PostProcessor, ScopeFragments};
use crate::resolve::{ExpressionRenderer, Resolver};

/// Rendered clauses of one scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledScope {
    pub scope: ScopeId,
    /// Select list, items separated by `, `.
    pub select: String,
    pub from_text: String,
    pub where_text: Option<String>,
}

impl CompiledScope {
    /// `select .. from .. [where ..]`
    pub fn query_text(&self) -> String {
        let mut sql = format!("select {} from {}", self.select, self.from_text);
        if let Some(condition) = &self.where_text {
            sql.push_str(" where ");
            sql.push_str(condition);
        }
        sql
    }
}

/// Output of a compilation, consumed by the execution layer.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledStatement {
    /// The annotated statement: every node carries its type and SQL text.
    pub statement: Statement,
    /// All From-Elements, indexed by `FromElementId`.
    pub elements: Vec<FromElement>,
    /// Scopes in pre-order, the outer query first.
    pub scopes: Vec<CompiledScope>,
    /// `target = value` texts of a bulk update.
    pub assignments: Vec<String>,
    /// Types of the outer select items; `None` for untyped items.
    pub return_types: Vec<Option<SqlType>>,
    /// Bind parameters in binding order.
    pub parameters: Vec<ParameterSpec>,
    pub query_spaces: Vec<String>,
    /// Source text of identifiers passed through unresolved.
    pub deferred_identifiers: Vec<String>,
}

impl CompiledStatement {
    pub fn scope(&self, scope: ScopeId) -> Option<&CompiledScope> {
        self.scopes.iter().find(|s| s.scope == scope)
    }

    pub fn from_text(&self) -> &str {
        self.scope(ScopeId::ROOT)
            .map(|s| s.from_text.as_str())
            .unwrap_or_default()
    }

    pub fn where_text(&self) -> Option<&str> {
        self.scope(ScopeId::ROOT)
            .and_then(|s| s.where_text.as_deref())
    }

    /// Element an alias in the query text was bound to.
    pub fn element_by_alias(&self, alias: &str) -> Option<&FromElement> {
        self.elements
            .iter()
            .find(|e| e.class_alias.as_deref() == Some(alias))
    }

    /// The complete SQL statement.
    pub fn sql(&self) -> String {
        let Some(root) = self.scope(ScopeId::ROOT) else {
            return String::new();
        };
        let restriction = root
            .where_text
            .as_ref()
            .map(|w| format!(" where {}", w))
            .unwrap_or_default();
        match self.statement.kind {
            StatementKind::Select => root.query_text(),
            StatementKind::Update => format!(
                "update {} set {}{}",
                root.from_text,
                self.assignments.join(", "),
                restriction
            ),
            StatementKind::Delete => format!("delete from {}{}", root.from_text, restriction),
        }
    }
}

/// Compiles parsed statements against a catalog.
///
/// A compiler is immutable once built and can be shared by concurrent
/// compilations; each call owns its own plan state.
pub struct QueryCompiler {
    catalog: Arc<dyn RelationCatalog>,
    config: CompilerConfig,
    renderer: Arc<dyn FragmentRenderer>,
}

impl QueryCompiler {
    /// Create a compiler rendering ANSI join syntax.
    pub fn new(catalog: Arc<dyn RelationCatalog>, config: CompilerConfig) -> Self {
        Self {
            catalog,
            config,
            renderer: Arc::new(AnsiFragmentRenderer),
        }
    }

    /// Replace the join fragment renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn FragmentRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a statement with the given filters enabled.
    #[instrument(skip_all, fields(kind = ?statement.kind, scopes = statement.scopes.len()))]
    pub fn compile(
        &self,
        mut statement: Statement,
        filters: &ActiveFilters,
    ) -> Result<CompiledStatement> {
        let catalog = self.catalog.as_ref();
        let mut plan = PlanState::new(&statement);

        let deferred = Resolver::new(catalog, &self.config, &mut statement, &mut plan)
            .resolve_statement()?;

        let order = statement.scopes_preorder();
        let processor = PostProcessor::new(catalog, &self.config, self.renderer.as_ref(), filters);
        let mut fragments: HashMap<ScopeId, ScopeFragments> = HashMap::new();

        // Innermost scopes first, so subquery nodes find their text.
        let mut subqueries: HashMap<ScopeId, String> = HashMap::new();
        let mut scopes = Vec::with_capacity(order.len());
        for scope in order.iter().rev() {
            let renderer = ExpressionRenderer::new(catalog, &self.config, &subqueries);
            settle_join_conditions(&renderer, &mut statement, &mut plan, *scope);
            let scope_fragments = processor.process(&mut statement, &mut plan, *scope)?;

            let spec = statement.scope(*scope).clone();
            let select: Vec<String> = spec
                .select
                .iter()
                .map(|item| renderer.render(&mut statement.tree, *item))
                .collect();
            let where_text = spec
                .where_clause
                .map(|condition| renderer.render(&mut statement.tree, condition));
            let compiled = CompiledScope {
                scope: *scope,
                select: select.join(", "),
                from_text: scope_fragments.from_text.clone(),
                where_text,
            };
            fragments.insert(*scope, scope_fragments);
            if spec.is_subquery() {
                debug!(scope = scope.0, sql = %compiled.query_text(), "rendered subquery");
                subqueries.insert(*scope, compiled.query_text());
            }
            scopes.push(compiled);
        }
        scopes.reverse();

        let renderer = ExpressionRenderer::new(catalog, &self.config, &subqueries);
        let assignments = statement
            .assignments
            .clone()
            .into_iter()
            .map(|a| {
                let target = renderer.render(&mut statement.tree, a.target);
                let value = renderer.render(&mut statement.tree, a.value);
                format!("{} = {}", target, value)
            })
            .collect();

        let parameters = self.collect_parameters(&statement, &order, &mut fragments);
        let return_types = statement
            .scope(ScopeId::ROOT)
            .select
            .iter()
            .map(|item| {
                let node = statement.tree.node(*item);
                node.data_type.clone().or_else(|| node.expected_type.clone())
            })
            .collect();
        let deferred_identifiers = deferred
            .iter()
            .map(|id| statement.tree.node(*id).text.clone())
            .collect();

        let compiled = CompiledStatement {
            elements: plan.from.into_elements(),
            scopes,
            assignments,
            return_types,
            parameters,
            query_spaces: plan.query_spaces.into_iter().collect(),
            deferred_identifiers,
            statement,
        };
        info!(
            elements = compiled.elements.len(),
            parameters = compiled.parameters.len(),
            "compiled statement"
        );
        Ok(compiled)
    }

    /// Binding order: filter-group parameters, then filter parameters
    /// embedded in join conditions, then query parameters by source position.
    fn collect_parameters(
        &self,
        statement: &Statement,
        order: &[ScopeId],
        fragments: &mut HashMap<ScopeId, ScopeFragments>,
    ) -> Vec<ParameterSpec> {
        let mut group = Vec::new();
        let mut embedded = Vec::new();
        for scope in order {
            if let Some(f) = fragments.get_mut(scope) {
                group.append(&mut f.group_parameters);
                embedded.append(&mut f.embedded_parameters);
            }
        }

        let mut ordinary: Vec<ParameterSpec> = statement
            .tree
            .iter()
            .filter(|(_, node)| node.rendered.is_some())
            .filter_map(|(id, node)| {
                let NodeKind::Parameter(param) = &node.kind else {
                    return None;
                };
                let source = match param {
                    ParamRef::Named(name) => ParameterSource::Named(name.clone()),
                    ParamRef::Positional(position) => ParameterSource::Positional(*position),
                };
                let column_span = node
                    .expected_type
                    .as_ref()
                    .map(|t| self.catalog.column_span(t))
                    .unwrap_or(1);
                Some(ParameterSpec {
                    source,
                    expected_type: node.expected_type.clone(),
                    column_span,
                    node: Some(id),
                    span: Some(node.span),
                })
            })
            .collect();
        ordinary.sort_by_key(|p| p.span);

        group.extend(embedded);
        group.extend(ordinary);
        group
    }
}

/// Render the `with` conditions and index selectors of a scope's joins.
/// Runs after the scope's subqueries are rendered, so their text is spliced in.
fn settle_join_conditions(
    renderer: &ExpressionRenderer<'_>,
    statement: &mut Statement,
    plan: &mut PlanState,
    scope: ScopeId,
) {
    for id in plan.from.element_ids(scope) {
        let sequence = &mut plan.from.element_mut(id).sequence;
        for pending in std::mem::take(&mut sequence.pending) {
            let text = renderer.render(&mut statement.tree, pending.node);
            sequence.settle(&pending, text);
        }
    }
}
