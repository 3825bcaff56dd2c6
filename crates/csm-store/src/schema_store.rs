//! Schema container and version store
//!
//! Holds the immutable, numbered snapshots of every schema and exposes
//! lookup, reference resolution and chain traversal between versions. Chain
//! writes go through a per-container write lock; concurrent edits to the
//! same chain are rejected by the chain itself, never silently merged.

use crate::error::StoreError;
use csm_schema::{
    ContainerId, FieldTransform, SchemaChange, SchemaContainer, SchemaContainerVersion,
    SchemaKind, SchemaModel,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reference to a schema container version by name
///
/// Resolves to an exact version number or to the head ("latest") when no
/// number is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRef {
    /// Logical container name
    pub name: String,
    /// Exact version number; `None` means latest
    pub version: Option<u32>,
}

impl SchemaRef {
    /// Reference the latest version of a container
    #[inline]
    #[must_use]
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Reference an exact version of a container
    #[inline]
    #[must_use]
    pub fn exact(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
        }
    }
}

impl std::fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => write!(f, "{}@latest", self.name),
        }
    }
}

/// Store of schema containers and their version chains
#[derive(Debug, Default)]
pub struct SchemaStore {
    containers: DashMap<ContainerId, Arc<RwLock<SchemaContainer>>>,
    by_name: DashMap<(SchemaKind, String), ContainerId>,
}

impl SchemaStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new container with its initial version
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateContainer`] when the name is already
    /// taken within the kind's namespace.
    pub fn create_container(
        &self,
        name: impl Into<String>,
        kind: SchemaKind,
        initial: SchemaModel,
    ) -> Result<Arc<SchemaContainerVersion>, StoreError> {
        let name = name.into();
        let container = SchemaContainer::new(name.clone(), kind, initial);
        let id = container.id();
        let head = Arc::clone(container.head());

        if self.by_name.contains_key(&(kind, name.clone())) {
            return Err(StoreError::DuplicateContainer { kind, name });
        }
        self.by_name.insert((kind, name.clone()), id);
        self.containers.insert(id, Arc::new(RwLock::new(container)));
        tracing::debug!(%id, name = %name, %kind, "registered schema container");
        Ok(head)
    }

    /// Append a change to a container's chain, creating the successor
    /// version
    ///
    /// # Errors
    /// - [`StoreError::ContainerNotFound`] for an unknown container
    /// - [`StoreError::Chain`] when the chain rejects the append
    pub fn append_change(
        &self,
        container: ContainerId,
        at_version: u32,
        change: SchemaChange,
    ) -> Result<Arc<SchemaContainerVersion>, StoreError> {
        let entry = self
            .containers
            .get(&container)
            .ok_or(StoreError::ContainerNotFound(container))?;
        let operation = change.operation().kind();
        let mut chain = entry.write();
        let next = chain.append(at_version, change)?;
        tracing::debug!(
            container = %container,
            version = next.version(),
            operation,
            "appended schema change"
        );
        Ok(next)
    }

    /// All versions of a container, ascending by number
    ///
    /// # Errors
    /// Returns [`StoreError::ContainerNotFound`] for an unknown container.
    pub fn versions_of(
        &self,
        container: ContainerId,
    ) -> Result<Vec<Arc<SchemaContainerVersion>>, StoreError> {
        let entry = self
            .containers
            .get(&container)
            .ok_or(StoreError::ContainerNotFound(container))?;
        let chain = entry.read();
        Ok(chain.versions().to_vec())
    }

    /// The head version of a container
    ///
    /// # Errors
    /// Returns [`StoreError::ContainerNotFound`] for an unknown container.
    pub fn head(&self, container: ContainerId) -> Result<Arc<SchemaContainerVersion>, StoreError> {
        let entry = self
            .containers
            .get(&container)
            .ok_or(StoreError::ContainerNotFound(container))?;
        let chain = entry.read();
        Ok(Arc::clone(chain.head()))
    }

    /// A specific version of a container
    ///
    /// # Errors
    /// Returns [`StoreError::ContainerNotFound`] for an unknown container
    /// and [`StoreError::NotFound`] for a version outside the chain.
    pub fn version(
        &self,
        container: ContainerId,
        number: u32,
    ) -> Result<Arc<SchemaContainerVersion>, StoreError> {
        let entry = self
            .containers
            .get(&container)
            .ok_or(StoreError::ContainerNotFound(container))?;
        let chain = entry.read();
        chain
            .version(number)
            .map(Arc::clone)
            .ok_or_else(|| StoreError::NotFound {
                reference: format!("{}@{}", chain.name(), number),
            })
    }

    /// Kind of a container
    ///
    /// # Errors
    /// Returns [`StoreError::ContainerNotFound`] for an unknown container.
    pub fn kind_of(&self, container: ContainerId) -> Result<SchemaKind, StoreError> {
        let entry = self
            .containers
            .get(&container)
            .ok_or(StoreError::ContainerNotFound(container))?;
        let chain = entry.read();
        Ok(chain.kind())
    }

    /// Resolve a named reference to a version of the given kind
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] when the name is unknown under the
    /// kind or the version number is outside the chain.
    pub fn resolve_reference(
        &self,
        reference: &SchemaRef,
        kind: SchemaKind,
    ) -> Result<Arc<SchemaContainerVersion>, StoreError> {
        let id = self
            .by_name
            .get(&(kind, reference.name.clone()))
            .map(|entry| *entry.value())
            .ok_or_else(|| StoreError::NotFound {
                reference: reference.to_string(),
            })?;
        let entry = self
            .containers
            .get(&id)
            .ok_or(StoreError::ContainerNotFound(id))?;
        let chain = entry.read();
        match reference.version {
            Some(number) => chain
                .version(number)
                .map(Arc::clone)
                .ok_or_else(|| StoreError::NotFound {
                    reference: reference.to_string(),
                }),
            None => Ok(Arc::clone(chain.head())),
        }
    }

    /// Compose the ordered migration-script list between two versions
    ///
    /// # Errors
    /// - [`StoreError::ContainerNotFound`] for an unknown container
    /// - [`StoreError::Chain`] when the target is not forward-reachable
    pub fn compose_scripts(
        &self,
        container: ContainerId,
        from: u32,
        to: u32,
    ) -> Result<Vec<Arc<dyn FieldTransform>>, StoreError> {
        let entry = self
            .containers
            .get(&container)
            .ok_or(StoreError::ContainerNotFound(container))?;
        let chain = entry.read();
        Ok(chain.compose_scripts(from, to)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csm_schema::{ChainError, ChangeOperation, FieldSchema, FieldType};
    use pretty_assertions::assert_eq;

    fn article_model() -> SchemaModel {
        SchemaModel::new("article")
            .with_field(FieldSchema::new("title", FieldType::String).required())
    }

    fn add_field(key: &str) -> SchemaChange {
        SchemaChange::new(ChangeOperation::AddField {
            field: FieldSchema::new(key, FieldType::String),
            insert_after: None,
        })
    }

    #[test]
    fn create_and_resolve_latest() {
        let store = SchemaStore::new();
        let v1 = store
            .create_container("article", SchemaKind::Schema, article_model())
            .unwrap();
        store
            .append_change(v1.container_id(), 1, add_field("subtitle"))
            .unwrap();

        let resolved = store
            .resolve_reference(&SchemaRef::latest("article"), SchemaKind::Schema)
            .unwrap();
        assert_eq!(resolved.version(), 2);
    }

    #[test]
    fn resolve_exact_version() {
        let store = SchemaStore::new();
        let v1 = store
            .create_container("article", SchemaKind::Schema, article_model())
            .unwrap();
        store
            .append_change(v1.container_id(), 1, add_field("subtitle"))
            .unwrap();

        let resolved = store
            .resolve_reference(&SchemaRef::exact("article", 1), SchemaKind::Schema)
            .unwrap();
        assert_eq!(resolved.version(), 1);
    }

    #[test]
    fn resolve_unknown_name_fails() {
        let store = SchemaStore::new();
        let err = store
            .resolve_reference(&SchemaRef::latest("ghost"), SchemaKind::Schema)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn resolve_respects_kind_namespaces() {
        let store = SchemaStore::new();
        store
            .create_container("address", SchemaKind::Microschema, article_model())
            .unwrap();

        // The microschema name does not resolve in the schema namespace
        let err = store
            .resolve_reference(&SchemaRef::latest("address"), SchemaKind::Schema)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let resolved = store
            .resolve_reference(&SchemaRef::latest("address"), SchemaKind::Microschema)
            .unwrap();
        assert_eq!(resolved.version(), 1);
    }

    #[test]
    fn resolve_version_outside_chain_fails() {
        let store = SchemaStore::new();
        store
            .create_container("article", SchemaKind::Schema, article_model())
            .unwrap();
        let err = store
            .resolve_reference(&SchemaRef::exact("article", 9), SchemaKind::Schema)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn head_is_latest_version() {
        let store = SchemaStore::new();
        let v1 = store
            .create_container("article", SchemaKind::Schema, article_model())
            .unwrap();
        assert_eq!(store.head(v1.container_id()).unwrap().version(), 1);

        store
            .append_change(v1.container_id(), 1, add_field("subtitle"))
            .unwrap();
        assert_eq!(store.head(v1.container_id()).unwrap().version(), 2);
    }

    #[test]
    fn unknown_container_reported() {
        let store = SchemaStore::new();
        let err = store.versions_of(csm_schema::ContainerId::new()).unwrap_err();
        assert!(matches!(err, StoreError::ContainerNotFound(_)));
    }

    #[test]
    fn duplicate_name_rejected() {
        let store = SchemaStore::new();
        store
            .create_container("article", SchemaKind::Schema, article_model())
            .unwrap();
        assert!(
            store
                .create_container("article", SchemaKind::Schema, article_model())
                .is_err()
        );
    }

    #[test]
    fn versions_of_ascending() {
        let store = SchemaStore::new();
        let v1 = store
            .create_container("article", SchemaKind::Schema, article_model())
            .unwrap();
        store
            .append_change(v1.container_id(), 1, add_field("a"))
            .unwrap();
        store
            .append_change(v1.container_id(), 2, add_field("b"))
            .unwrap();

        let numbers: Vec<u32> = store
            .versions_of(v1.container_id())
            .unwrap()
            .iter()
            .map(|v| v.version())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn append_off_head_surfaces_chain_error() {
        let store = SchemaStore::new();
        let v1 = store
            .create_container("article", SchemaKind::Schema, article_model())
            .unwrap();
        store
            .append_change(v1.container_id(), 1, add_field("a"))
            .unwrap();

        let err = store
            .append_change(v1.container_id(), 1, add_field("b"))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Chain(ChainError::Broken { at: 1, head: 2 })
        ));
    }

    #[test]
    fn compose_scripts_through_store() {
        let store = SchemaStore::new();
        let v1 = store
            .create_container("article", SchemaKind::Schema, article_model())
            .unwrap();
        store
            .append_change(v1.container_id(), 1, add_field("a"))
            .unwrap();
        store
            .append_change(v1.container_id(), 2, add_field("b"))
            .unwrap();

        let scripts = store.compose_scripts(v1.container_id(), 1, 3).unwrap();
        assert_eq!(scripts.len(), 2);

        let err = store.compose_scripts(v1.container_id(), 3, 1).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Chain(ChainError::NoPath { from: 3, to: 1 })
        ));
    }
}
