//! Shared data types for the ORMQL object-query compiler.
//!
//! This crate defines the interface between the external parser, the
//! compiler and the execution layer:
//!
//! - [`ast`]: the index-addressed query tree the parser produces
//! - [`statement`]: statements, query scopes and FROM declarations
//! - [`types`]: the relational type lattice
//! - [`params`]: bind parameter specifications

pub mod ast;
pub mod params;
pub mod span;
pub mod statement;
pub mod types;

pub use ast::{
    ArithmeticOp, ComparisonOp, FromElementId, LiteralKind, LogicalOp, Node, NodeId, NodeKind,
    ParamRef, QueryTree, ScopeId, SyntheticGroup, UnaryOp,
};
pub use params::{placeholder_markers, ParameterSource, ParameterSpec};
pub use span::Span;
pub use statement::{Assignment, FromDecl, JoinKind, QuerySpec, Statement, StatementKind};
pub use types::SqlType;
