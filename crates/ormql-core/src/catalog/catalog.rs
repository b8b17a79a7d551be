//! Catalog manager holding the current schema snapshot.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::schema::SchemaBundle;
use crate::error::Result;

/// Holds the schema shared by all compilations.
///
/// The schema is replaced at startup or on redeploy; every compilation takes
/// an immutable [`snapshot`](Catalog::snapshot) and never observes a change
/// midway.
#[derive(Debug, Default)]
pub struct Catalog {
    current: RwLock<Arc<SchemaBundle>>,
}

impl Catalog {
    /// Create a catalog with an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog serving `bundle`.
    pub fn with_schema(bundle: SchemaBundle) -> Self {
        Self {
            current: RwLock::new(Arc::new(bundle)),
        }
    }

    /// Load a catalog from a serialized schema snapshot.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self> {
        Ok(Self::with_schema(SchemaBundle::from_bytes(bytes)?))
    }

    /// Get the current schema version.
    pub fn current_version(&self) -> u64 {
        self.current.read().version
    }

    /// Take an immutable handle on the current schema.
    pub fn snapshot(&self) -> Arc<SchemaBundle> {
        Arc::clone(&self.current.read())
    }

    /// Install a new schema. Returns the new version number.
    pub fn apply_schema(&self, mut bundle: SchemaBundle) -> u64 {
        let mut current = self.current.write();
        let new_version = current.version + 1;
        bundle.version = new_version;
        info!(
            version = new_version,
            entities = bundle.entities.len(),
            collections = bundle.collections.len(),
            "applied schema"
        );
        *current = Arc::new(bundle);
        new_version
    }

    /// Serialize the current schema.
    pub fn to_snapshot(&self) -> Result<Vec<u8>> {
        self.current.read().to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityMeta, RelationCatalog};

    #[test]
    fn test_apply_schema_bumps_version() {
        let catalog = Catalog::new();
        assert_eq!(catalog.current_version(), 0);

        let version =
            catalog.apply_schema(SchemaBundle::new(0).with_entity(EntityMeta::new("User", "users")));
        assert_eq!(version, 1);
        assert!(catalog.snapshot().find_entity("User").is_some());
    }

    #[test]
    fn test_snapshot_isolated_from_later_changes() {
        let catalog = Catalog::with_schema(
            SchemaBundle::new(1).with_entity(EntityMeta::new("User", "users")),
        );
        let before = catalog.snapshot();
        catalog.apply_schema(SchemaBundle::new(0));

        assert!(before.find_entity("User").is_some());
        assert!(catalog.snapshot().find_entity("User").is_none());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let catalog = Catalog::with_schema(
            SchemaBundle::new(3).with_entity(EntityMeta::new("User", "users")),
        );
        let bytes = catalog.to_snapshot().unwrap();
        let restored = Catalog::from_snapshot(&bytes).unwrap();
        assert_eq!(restored.current_version(), 3);
        assert!(restored.snapshot().find_entity("User").is_some());
    }
}
