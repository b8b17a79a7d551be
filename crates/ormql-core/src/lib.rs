//! ORMQL Core - path resolution, join synthesis and type inference.
//!
//! This crate turns a parsed object query into relational SQL fragments:
//! property paths are bound to joined tables, implicit joins are synthesized
//! and memoized, expression types are inferred and pushed down to parameters,
//! and every scope is rendered to FROM/WHERE text with filters and
//! discriminator restrictions applied.

pub mod alias;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod error;
pub mod filter;
pub mod from;
pub mod join;
pub mod post;
pub mod resolve;

pub use catalog::{
    Catalog, CollectionElement, CollectionIndex, CollectionMeta, ConstantValue, Discriminator,
    DiscriminatorValue, EntityMeta, FilterBinding, FilterDef, FunctionDef, InheritanceStrategy,
    PropertyKind, PropertyMeta, RelationCatalog, ReturnRule, SchemaBundle,
};
pub use compiler::{CompiledScope, CompiledStatement, QueryCompiler};
pub use config::{CompilerConfig, DecimalFormat};
pub use error::{ErrorKind, Result, SemanticError};
pub use filter::ActiveFilters;
pub use from::{ElementState, FragmentKind, FromElement, PlanState};
pub use post::{AnsiFragmentRenderer, FragmentRenderer};

/// Re-export the shared statement and type definitions.
pub use ormql_proto as proto;
