//! Schema containers and their version chains
//!
//! The chain is stored as a vector indexed by version number rather than as
//! pointer-linked nodes: a new version is always appended at `head + 1`, so
//! contiguity and the no-branch/no-cycle invariants hold structurally and
//! forward traversal is O(1) per step.

use crate::change::{FieldTransform, SchemaChange};
use crate::error::ChainError;
use crate::model::SchemaModel;
use crate::types::{ContainerId, SchemaKind};
use std::sync::Arc;

/// Immutable snapshot of a schema at one version
///
/// # Invariants
/// - `version` starts at 1 and increases by exactly 1 per successor
/// - Never mutated after creation
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaContainerVersion {
    container: ContainerId,
    version: u32,
    model: Arc<SchemaModel>,
}

impl SchemaContainerVersion {
    /// Owning container identity
    #[inline]
    #[must_use]
    pub fn container_id(&self) -> ContainerId {
        self.container
    }

    /// Version number
    #[inline]
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The field-definition model of this snapshot
    #[inline]
    #[must_use]
    pub fn model(&self) -> &Arc<SchemaModel> {
        &self.model
    }

    /// Presented schema name at this version
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.model.name
    }
}

/// Logical, named schema owning an ordered chain of versions
///
/// `changes[n - 1]` is the change leading from version `n` to version
/// `n + 1`; a version with no entry there is the head.
#[derive(Debug)]
pub struct SchemaContainer {
    id: ContainerId,
    name: String,
    kind: SchemaKind,
    versions: Vec<Arc<SchemaContainerVersion>>,
    changes: Vec<SchemaChange>,
}

impl SchemaContainer {
    /// Create a container with its initial version (version 1)
    #[must_use]
    pub fn new(name: impl Into<String>, kind: SchemaKind, initial: SchemaModel) -> Self {
        let id = ContainerId::new();
        let first = Arc::new(SchemaContainerVersion {
            container: id,
            version: 1,
            model: Arc::new(initial),
        });
        Self {
            id,
            name: name.into(),
            kind,
            versions: vec![first],
            changes: Vec::new(),
        }
    }

    /// Stable container identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Logical container name (stable; renames affect the model's presented
    /// name, not this identity)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Container kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    /// Latest version (the one with no outgoing change)
    #[inline]
    #[must_use]
    pub fn head(&self) -> &Arc<SchemaContainerVersion> {
        self.versions
            .last()
            .unwrap_or_else(|| unreachable!("a container always has version 1"))
    }

    /// Look up a version by number
    #[inline]
    #[must_use]
    pub fn version(&self, number: u32) -> Option<&Arc<SchemaContainerVersion>> {
        if number == 0 {
            return None;
        }
        self.versions.get(number as usize - 1)
    }

    /// All versions, ascending by number
    #[inline]
    #[must_use]
    pub fn versions(&self) -> &[Arc<SchemaContainerVersion>] {
        &self.versions
    }

    /// The outgoing change of a version, if one exists
    #[inline]
    #[must_use]
    pub fn change_from(&self, version: u32) -> Option<&SchemaChange> {
        if version == 0 {
            return None;
        }
        self.changes.get(version as usize - 1)
    }

    /// Append a change at the head, creating the successor version
    ///
    /// # Errors
    /// - [`ChainError::Broken`] when `at_version` already has an outgoing
    ///   change (branching is never permitted)
    /// - [`ChainError::UnknownVersion`] when `at_version` does not exist
    /// - [`ChainError::InvalidChange`] when the operation does not fit the
    ///   head model
    pub fn append(
        &mut self,
        at_version: u32,
        change: SchemaChange,
    ) -> Result<Arc<SchemaContainerVersion>, ChainError> {
        let head = self.head().version();
        if at_version < head {
            return Err(ChainError::Broken {
                at: at_version,
                head,
            });
        }
        if at_version > head {
            return Err(ChainError::UnknownVersion(at_version));
        }

        let next_model = change.operation().apply_to_model(self.head().model())?;
        let next = Arc::new(SchemaContainerVersion {
            container: self.id,
            version: head + 1,
            model: Arc::new(next_model),
        });
        self.changes.push(change);
        self.versions.push(Arc::clone(&next));
        Ok(next)
    }

    /// The ordered changes connecting `from` to `to`
    ///
    /// # Errors
    /// - [`ChainError::UnknownVersion`] when either endpoint does not exist
    /// - [`ChainError::NoPath`] when `to` is not forward-reachable from
    ///   `from` (in this representation: `to < from`)
    pub fn changes_between(&self, from: u32, to: u32) -> Result<&[SchemaChange], ChainError> {
        let head = self.head().version();
        for v in [from, to] {
            if v == 0 || v > head {
                return Err(ChainError::UnknownVersion(v));
            }
        }
        if to < from {
            return Err(ChainError::NoPath { from, to });
        }
        Ok(&self.changes[from as usize - 1..to as usize - 1])
    }

    /// Compose the ordered migration-script list for a forward walk
    ///
    /// `compose_scripts(v1, v3)` equals `compose_scripts(v1, v2)` followed
    /// by `compose_scripts(v2, v3)` for any chain `v1 -> v2 -> v3`; equal
    /// endpoints compose to the empty list.
    ///
    /// # Errors
    /// Same conditions as [`Self::changes_between`].
    pub fn compose_scripts(
        &self,
        from: u32,
        to: u32,
    ) -> Result<Vec<Arc<dyn FieldTransform>>, ChainError> {
        Ok(self
            .changes_between(from, to)?
            .iter()
            .map(SchemaChange::migration_script)
            .collect())
    }
}
