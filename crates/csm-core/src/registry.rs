//! Release version registry
//!
//! Tracks, per release and per schema container, the single currently
//! pinned version and enforces the monotonic-upgrade invariant. All reads
//! and writes of one pin are serialized through the pin map's entry lock,
//! so the no-downgrade rule holds under concurrent assignment requests.

use crate::error::CoreError;
use crate::orchestrator::{MigrationLease, MigrationLeases};
use csm_schema::{ContainerId, JobId, ProjectId, ReleaseId, SchemaContainerVersion};
use dashmap::DashMap;
use std::sync::Arc;

/// A named, independently versioned content scope within a project
///
/// Releases are created once per project lifecycle event and never deleted;
/// deletion is an unsupported operation at the registry level.
#[derive(Debug)]
pub struct Release {
    id: ReleaseId,
    name: String,
    project: ProjectId,
    pins: DashMap<ContainerId, u32>,
}

impl Release {
    /// Release identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> ReleaseId {
        self.id
    }

    /// Release name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning project
    #[inline]
    #[must_use]
    pub fn project(&self) -> ProjectId {
        self.project
    }
}

/// Outcome of a pin assignment, decided under the pin's entry lock
#[derive(Debug)]
pub enum AssignDecision {
    /// No version was pinned before; the pin was recorded, no migration
    FirstUse,
    /// Target equals the current pin; nothing changed, no migration
    NoOp,
    /// Pin moved forward; the caller must dispatch the migration job
    Upgraded {
        /// Previously pinned version
        from: u32,
        /// Held single-writer lease for the (release, container) pair
        lease: MigrationLease,
    },
}

/// Registry of releases and their pinned schema versions
#[derive(Debug)]
pub struct ReleaseRegistry {
    releases: DashMap<ReleaseId, Arc<Release>>,
    leases: Arc<MigrationLeases>,
}

impl ReleaseRegistry {
    /// Create a registry sharing the orchestrator's lease table
    #[inline]
    #[must_use]
    pub fn new(leases: Arc<MigrationLeases>) -> Self {
        Self {
            releases: DashMap::new(),
            leases,
        }
    }

    /// Register a new release for a project
    pub fn create_release(&self, project: ProjectId, name: impl Into<String>) -> Arc<Release> {
        let release = Arc::new(Release {
            id: ReleaseId::new(),
            name: name.into(),
            project,
            pins: DashMap::new(),
        });
        self.releases.insert(release.id, Arc::clone(&release));
        tracing::info!(release = %release.id, name = %release.name, "created release");
        release
    }

    /// Look up a release
    ///
    /// # Errors
    /// Returns [`CoreError::ReleaseNotFound`] for an unknown identity.
    pub fn get(&self, release: ReleaseId) -> Result<Arc<Release>, CoreError> {
        self.releases
            .get(&release)
            .map(|r| Arc::clone(r.value()))
            .ok_or(CoreError::ReleaseNotFound(release))
    }

    /// Currently pinned version of a container within a release
    ///
    /// # Errors
    /// Returns [`CoreError::ReleaseNotFound`] for an unknown release.
    pub fn current_version(
        &self,
        release: ReleaseId,
        container: ContainerId,
    ) -> Result<Option<u32>, CoreError> {
        let release = self.get(release)?;
        Ok(release.pins.get(&container).map(|pin| *pin))
    }

    /// All pinned (container, version) pairs of a release
    ///
    /// # Errors
    /// Returns [`CoreError::ReleaseNotFound`] for an unknown release.
    pub fn pinned(&self, release: ReleaseId) -> Result<Vec<(ContainerId, u32)>, CoreError> {
        let release = self.get(release)?;
        Ok(release
            .pins
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect())
    }

    /// Assign a target version to a release, enforcing monotonicity
    ///
    /// Runs entirely under the pin's entry lock:
    /// 1. no pin yet — record the target, no migration (first use)
    /// 2. current > target — [`CoreError::Downgrade`], state unchanged
    /// 3. current == target — idempotent no-op, no migration
    /// 4. current < target — acquire the pair's migration lease, then move
    ///    the pin forward; the caller dispatches the job under `job_id`
    ///
    /// # Errors
    /// - [`CoreError::ReleaseNotFound`] for an unknown release
    /// - [`CoreError::Downgrade`] when the target is older than the pin
    /// - [`CoreError::MigrationInFlight`] while the pair's previous
    ///   migration is still running (the pin is left unchanged)
    pub fn assign_version(
        &self,
        release: ReleaseId,
        target: &Arc<SchemaContainerVersion>,
        job_id: JobId,
    ) -> Result<AssignDecision, CoreError> {
        use dashmap::mapref::entry::Entry;

        let release_ref = self.get(release)?;
        let container = target.container_id();

        let decision = match release_ref.pins.entry(container) {
            Entry::Vacant(slot) => {
                slot.insert(target.version());
                tracing::info!(
                    %release,
                    %container,
                    version = target.version(),
                    "pinned initial schema version"
                );
                Ok(AssignDecision::FirstUse)
            }
            Entry::Occupied(mut slot) => {
                let current = *slot.get();
                if current > target.version() {
                    return Err(CoreError::Downgrade {
                        name: target.name().to_string(),
                        current,
                        target: target.version(),
                    });
                }
                if current == target.version() {
                    return Ok(AssignDecision::NoOp);
                }
                let lease =
                    MigrationLeases::try_acquire(&self.leases, release, container, job_id)?;
                slot.insert(target.version());
                tracing::info!(
                    %release,
                    %container,
                    from = current,
                    to = target.version(),
                    "moved schema version pin forward"
                );
                Ok(AssignDecision::Upgraded {
                    from: current,
                    lease,
                })
            }
        };
        decision
    }

    /// Release deletion is an unsupported operation
    ///
    /// # Errors
    /// Always returns [`CoreError::NotImplemented`].
    pub fn delete_release(&self, _release: ReleaseId) -> Result<(), CoreError> {
        Err(CoreError::NotImplemented("release deletion"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csm_schema::{FieldSchema, FieldType, SchemaContainer, SchemaKind, SchemaModel};
    use csm_schema::{ChangeOperation, SchemaChange};

    fn two_version_schema() -> SchemaContainer {
        let model = SchemaModel::new("article")
            .with_field(FieldSchema::new("title", FieldType::String).required());
        let mut container = SchemaContainer::new("article", SchemaKind::Schema, model);
        container
            .append(
                1,
                SchemaChange::new(ChangeOperation::AddField {
                    field: FieldSchema::new("subtitle", FieldType::String),
                    insert_after: None,
                }),
            )
            .unwrap();
        container
    }

    fn registry() -> ReleaseRegistry {
        ReleaseRegistry::new(Arc::new(MigrationLeases::new()))
    }

    #[test]
    fn first_use_pins_directly() {
        let registry = registry();
        let release = registry.create_release(ProjectId::new(), "initial");
        let schema = two_version_schema();
        let v1 = Arc::clone(schema.version(1).unwrap());

        let decision = registry
            .assign_version(release.id(), &v1, JobId::new())
            .unwrap();
        assert!(matches!(decision, AssignDecision::FirstUse));
        assert_eq!(
            registry.current_version(release.id(), schema.id()).unwrap(),
            Some(1)
        );
    }

    #[test]
    fn downgrade_rejected_and_pin_unchanged() {
        let registry = registry();
        let release = registry.create_release(ProjectId::new(), "initial");
        let schema = two_version_schema();
        let v2 = Arc::clone(schema.version(2).unwrap());
        let v1 = Arc::clone(schema.version(1).unwrap());

        registry
            .assign_version(release.id(), &v2, JobId::new())
            .unwrap();

        let err = registry
            .assign_version(release.id(), &v1, JobId::new())
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Downgrade {
                current: 2,
                target: 1,
                ..
            }
        ));
        assert_eq!(
            registry.current_version(release.id(), schema.id()).unwrap(),
            Some(2)
        );
    }

    #[test]
    fn equal_assignment_is_noop() {
        let registry = registry();
        let release = registry.create_release(ProjectId::new(), "initial");
        let schema = two_version_schema();
        let v1 = Arc::clone(schema.version(1).unwrap());

        registry
            .assign_version(release.id(), &v1, JobId::new())
            .unwrap();
        let decision = registry
            .assign_version(release.id(), &v1, JobId::new())
            .unwrap();
        assert!(matches!(decision, AssignDecision::NoOp));
    }

    #[test]
    fn upgrade_acquires_the_pair_lease() {
        let leases = Arc::new(MigrationLeases::new());
        let registry = ReleaseRegistry::new(Arc::clone(&leases));
        let release = registry.create_release(ProjectId::new(), "initial");
        let schema = two_version_schema();
        let v1 = Arc::clone(schema.version(1).unwrap());
        let v2 = Arc::clone(schema.version(2).unwrap());

        registry
            .assign_version(release.id(), &v1, JobId::new())
            .unwrap();
        let decision = registry
            .assign_version(release.id(), &v2, JobId::new())
            .unwrap();
        let AssignDecision::Upgraded { from, lease } = decision else {
            panic!("expected an upgrade decision");
        };
        assert_eq!(from, 1);
        assert!(leases.is_held(release.id(), schema.id()));
        drop(lease);
        assert!(!leases.is_held(release.id(), schema.id()));
    }

    #[test]
    fn upgrade_blocked_while_lease_held() {
        let leases = Arc::new(MigrationLeases::new());
        let registry = ReleaseRegistry::new(Arc::clone(&leases));
        let release = registry.create_release(ProjectId::new(), "initial");

        let model = SchemaModel::new("article")
            .with_field(FieldSchema::new("title", FieldType::String).required());
        let mut schema = SchemaContainer::new("article", SchemaKind::Schema, model);
        for at in 1..3 {
            schema
                .append(
                    at,
                    SchemaChange::new(ChangeOperation::AddField {
                        field: FieldSchema::new(format!("extra_{at}"), FieldType::String),
                        insert_after: None,
                    }),
                )
                .unwrap();
        }

        let v1 = Arc::clone(schema.version(1).unwrap());
        let v2 = Arc::clone(schema.version(2).unwrap());
        let v3 = Arc::clone(schema.version(3).unwrap());

        registry
            .assign_version(release.id(), &v1, JobId::new())
            .unwrap();
        let AssignDecision::Upgraded { lease, .. } = registry
            .assign_version(release.id(), &v2, JobId::new())
            .unwrap()
        else {
            panic!("expected an upgrade decision");
        };

        // A further upgrade on the same pair is refused and the pin stays
        let err = registry
            .assign_version(release.id(), &v3, JobId::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::MigrationInFlight { .. }));
        assert_eq!(
            registry.current_version(release.id(), schema.id()).unwrap(),
            Some(2)
        );

        // Once the running migration finishes, the upgrade goes through
        drop(lease);
        assert!(matches!(
            registry
                .assign_version(release.id(), &v3, JobId::new())
                .unwrap(),
            AssignDecision::Upgraded { from: 2, .. }
        ));
    }

    #[test]
    fn delete_release_is_not_implemented() {
        let registry = registry();
        let release = registry.create_release(ProjectId::new(), "initial");
        let err = registry.delete_release(release.id()).unwrap_err();
        assert!(matches!(err, CoreError::NotImplemented(_)));
    }

    #[test]
    fn unknown_release_reported() {
        let registry = registry();
        let err = registry
            .current_version(ReleaseId::new(), ContainerId::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::ReleaseNotFound(_)));
    }
}
