//! Relation catalog: entity, collection, function and filter metadata.
//!
//! The catalog is read-only during compilation. [`RelationCatalog`] is the
//! lookup facade the resolver depends on; [`SchemaBundle`] is the in-memory
//! implementation and [`Catalog`] publishes bundles to concurrent compilations.

mod catalog;
mod collection;
mod entity;
mod facade;
mod filter;
mod function;
mod property;
mod schema;

pub use catalog::Catalog;
pub use collection::{CollectionElement, CollectionIndex, CollectionMeta};
pub use entity::{Discriminator, DiscriminatorValue, EntityMeta, InheritanceStrategy};
pub use facade::{PropertyLookup, RelationCatalog, TableRef, TableRole};
pub use filter::{FilterBinding, FilterDef, FilterParam};
pub use function::{FunctionDef, FunctionRegistry, ReturnRule};
pub use property::{PropertyKind, PropertyMeta};
pub use schema::{ConstantValue, SchemaBundle};
