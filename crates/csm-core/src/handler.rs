//! Release handler — the caller-facing facade
//!
//! Wires the registry, the schema store, the orchestrator and the search
//! index seam into the operations exposed to callers: querying assigned
//! versions, batch version assignment and the (unsupported) release
//! deletion. Permission checks belong to the request layer above.

use crate::error::CoreError;
use crate::index::{index_name, type_key, SearchIndex};
use crate::job::{JobHandle, MigrationJob};
use crate::orchestrator::MigrationOrchestrator;
use crate::registry::{AssignDecision, Release, ReleaseRegistry};
use csm_schema::{JobId, ProjectId, ReleaseId, SchemaContainerVersion, SchemaKind};
use csm_store::{EditState, SchemaRef, SchemaStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One assigned schema version, as exposed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersionRef {
    /// Schema name at the pinned version
    pub name: String,
    /// Pinned version number
    pub version: u32,
}

/// Result of a batch assignment
///
/// `versions` is the post-update set of pinned versions; `jobs` holds one
/// handle per migration actually dispatched (no-ops and first-use pins
/// dispatch none).
#[derive(Debug)]
pub struct AssignmentResult {
    /// Pinned versions after the batch, ordered by schema name
    pub versions: Vec<SchemaVersionRef>,
    /// Handles of the dispatched migration jobs
    pub jobs: Vec<JobHandle>,
}

/// Caller-facing facade over the versioning core
#[derive(Debug)]
pub struct ReleaseHandler {
    registry: Arc<ReleaseRegistry>,
    schemas: Arc<SchemaStore>,
    orchestrator: Arc<MigrationOrchestrator>,
    index: Arc<dyn SearchIndex>,
}

impl ReleaseHandler {
    /// Create the handler
    #[inline]
    #[must_use]
    pub fn new(
        registry: Arc<ReleaseRegistry>,
        schemas: Arc<SchemaStore>,
        orchestrator: Arc<MigrationOrchestrator>,
        index: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            registry,
            schemas,
            orchestrator,
            index,
        }
    }

    /// The release registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ReleaseRegistry {
        &self.registry
    }

    /// The migration orchestrator
    #[inline]
    #[must_use]
    pub fn orchestrator(&self) -> &MigrationOrchestrator {
        &self.orchestrator
    }

    /// Register a release for a project
    #[inline]
    pub fn create_release(&self, project: ProjectId, name: impl Into<String>) -> Arc<Release> {
        self.registry.create_release(project, name)
    }

    /// Schema versions currently assigned to a release
    ///
    /// # Errors
    /// Returns [`CoreError::ReleaseNotFound`] for an unknown release.
    pub fn schema_versions(&self, release: ReleaseId) -> Result<Vec<SchemaVersionRef>, CoreError> {
        self.assigned_versions(release, SchemaKind::Schema)
    }

    /// Microschema versions currently assigned to a release
    ///
    /// # Errors
    /// Returns [`CoreError::ReleaseNotFound`] for an unknown release.
    pub fn microschema_versions(
        &self,
        release: ReleaseId,
    ) -> Result<Vec<SchemaVersionRef>, CoreError> {
        self.assigned_versions(release, SchemaKind::Microschema)
    }

    /// Assign a batch of schema versions to a release
    ///
    /// References resolve before any mutation; assignments then apply in
    /// order and fail fast. Assignments committed before a failure stay
    /// committed — there is no batch rollback.
    ///
    /// # Errors
    /// - [`CoreError::Store`] when a reference does not resolve (detected
    ///   before any pin moves)
    /// - [`CoreError::Downgrade`] / [`CoreError::MigrationInFlight`] from
    ///   the first offending assignment
    pub async fn assign_schema_versions(
        &self,
        project: ProjectId,
        release: ReleaseId,
        references: &[SchemaRef],
    ) -> Result<AssignmentResult, CoreError> {
        self.assign_versions(project, release, references, SchemaKind::Schema)
            .await
    }

    /// Assign a batch of microschema versions to a release
    ///
    /// Same contract as [`Self::assign_schema_versions`], evaluated
    /// independently per container; no index mappings are touched on this
    /// path.
    ///
    /// # Errors
    /// See [`Self::assign_schema_versions`].
    pub async fn assign_microschema_versions(
        &self,
        project: ProjectId,
        release: ReleaseId,
        references: &[SchemaRef],
    ) -> Result<AssignmentResult, CoreError> {
        self.assign_versions(project, release, references, SchemaKind::Microschema)
            .await
    }

    /// Release deletion is an unsupported operation
    ///
    /// # Errors
    /// Always returns [`CoreError::NotImplemented`].
    pub fn delete_release(&self, release: ReleaseId) -> Result<(), CoreError> {
        self.registry.delete_release(release)
    }

    async fn assign_versions(
        &self,
        project: ProjectId,
        release: ReleaseId,
        references: &[SchemaRef],
        kind: SchemaKind,
    ) -> Result<AssignmentResult, CoreError> {
        // Resolve the whole batch first: an unresolved reference fails the
        // request before any pin has moved.
        let mut targets = Vec::with_capacity(references.len());
        for reference in references {
            targets.push(self.schemas.resolve_reference(reference, kind)?);
        }

        let mut jobs = Vec::new();
        for target in targets {
            if let Some(handle) = self.assign_one(project, release, &target, kind).await? {
                jobs.push(handle);
            }
        }

        Ok(AssignmentResult {
            versions: self.assigned_versions(release, kind)?,
            jobs,
        })
    }

    /// Assign one resolved version: pin, dispatch, then mapping updates
    async fn assign_one(
        &self,
        project: ProjectId,
        release: ReleaseId,
        target: &Arc<SchemaContainerVersion>,
        kind: SchemaKind,
    ) -> Result<Option<JobHandle>, CoreError> {
        let job_id = JobId::new();
        match self.registry.assign_version(release, target, job_id)? {
            AssignDecision::NoOp => Ok(None),
            AssignDecision::FirstUse => {
                if kind == SchemaKind::Schema {
                    self.update_mappings(project, release, target).await;
                }
                Ok(None)
            }
            AssignDecision::Upgraded { from, lease } => {
                let job = MigrationJob::with_id(
                    job_id,
                    project,
                    release,
                    target.container_id(),
                    kind,
                    from,
                    target.version(),
                );
                let handle = self.orchestrator.dispatch(job, lease)?;
                if kind == SchemaKind::Schema {
                    self.update_mappings(project, release, target).await;
                }
                Ok(Some(handle))
            }
        }
    }

    /// Push the version's mapping to the draft and published indices
    ///
    /// Mapping failures are reported and logged; the pin stays.
    async fn update_mappings(
        &self,
        project: ProjectId,
        release: ReleaseId,
        version: &Arc<SchemaContainerVersion>,
    ) {
        let key = type_key(version);
        for state in [EditState::Draft, EditState::Published] {
            let name = index_name(project, release, state);
            if let Err(err) = self
                .index
                .update_mapping(&name, &key, version.model())
                .await
            {
                tracing::warn!(index = %name, %err, "index mapping update failed");
            }
        }
    }

    fn assigned_versions(
        &self,
        release: ReleaseId,
        kind: SchemaKind,
    ) -> Result<Vec<SchemaVersionRef>, CoreError> {
        let mut versions = Vec::new();
        for (container, pinned) in self.registry.pinned(release)? {
            if self.schemas.kind_of(container)? != kind {
                continue;
            }
            let version = self.schemas.version(container, pinned)?;
            versions.push(SchemaVersionRef {
                name: version.name().to_string(),
                version: pinned,
            });
        }
        versions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(versions)
    }
}
