//! Search-index mapping seam
//!
//! The full-text index itself is an external collaborator; this module owns
//! only the interface used to push an updated type mapping after a schema
//! version pin. Mapping failures are reported but never roll back the pin.

use async_trait::async_trait;
use csm_schema::{ProjectId, ReleaseId, SchemaContainerVersion, SchemaModel};
use csm_store::EditState;
use parking_lot::Mutex;

/// Failure pushing a mapping update
#[derive(Debug, Clone, thiserror::Error)]
pub enum IndexError {
    /// The index rejected or never received the mapping
    #[error("mapping update failed for index '{index}': {reason}")]
    MappingUpdate {
        /// Target index name
        index: String,
        /// Failure detail
        reason: String,
    },
}

/// Interface to the search index's mapping administration
#[async_trait]
pub trait SearchIndex: Send + Sync + std::fmt::Debug {
    /// Push the field mapping of a schema version to one index
    ///
    /// # Errors
    /// Returns [`IndexError`] when the index is unreachable or rejects the
    /// mapping; callers log and continue.
    async fn update_mapping(
        &self,
        index_name: &str,
        type_key: &str,
        model: &SchemaModel,
    ) -> Result<(), IndexError>;
}

/// Name of the per-release content index for one edit scope
#[must_use]
pub fn index_name(project: ProjectId, release: ReleaseId, state: EditState) -> String {
    format!("node-{project}-{release}-{state}")
}

/// Type key of a schema version within an index
#[must_use]
pub fn type_key(version: &SchemaContainerVersion) -> String {
    format!("{}-{}", version.name(), version.version())
}

/// Index implementation that drops every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIndex;

#[async_trait]
impl SearchIndex for NoopIndex {
    async fn update_mapping(
        &self,
        _index_name: &str,
        _type_key: &str,
        _model: &SchemaModel,
    ) -> Result<(), IndexError> {
        Ok(())
    }
}

/// One recorded mapping update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingUpdate {
    /// Target index name
    pub index_name: String,
    /// Type key within the index
    pub type_key: String,
    /// Name of the schema the mapping was derived from
    pub schema_name: String,
}

/// Index implementation that records updates for inspection
#[derive(Debug, Default)]
pub struct RecordingIndex {
    updates: Mutex<Vec<MappingUpdate>>,
}

impl RecordingIndex {
    /// Create an empty recorder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded updates, in call order
    #[must_use]
    pub fn updates(&self) -> Vec<MappingUpdate> {
        self.updates.lock().clone()
    }
}

#[async_trait]
impl SearchIndex for RecordingIndex {
    async fn update_mapping(
        &self,
        index_name: &str,
        type_key: &str,
        model: &SchemaModel,
    ) -> Result<(), IndexError> {
        self.updates.lock().push(MappingUpdate {
            index_name: index_name.to_string(),
            type_key: type_key.to_string(),
            schema_name: model.name.clone(),
        });
        Ok(())
    }
}
