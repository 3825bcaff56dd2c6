//! Asynchronous migration orchestrator
//!
//! Owns the migration work queue and executes jobs off the request path:
//! - one consumer loop drains the queue and spawns one task per job, capped
//!   by the configured concurrency limit
//! - a lease keyed by (release, container) enforces the single-writer rule:
//!   at most one in-flight job per pair, full parallelism across pairs
//! - each container rewrite is a single atomic unit at the store seam; the
//!   job as a whole is not atomic and replay must be idempotent

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::job::{
    validate_transition, ContainerFailure, JobHandle, JobState, MigrationJob, MigrationReport,
};
use chrono::Utc;
use csm_schema::{ContainerId, FieldError, FieldTransform, JobId, ReleaseId,
    SchemaContainerVersion,
};
use csm_store::{ContainerStore, FieldContainer, SchemaStore, StoreError};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Semaphore};

/// Leases enforcing the single-writer rule per (release, container) pair
#[derive(Debug, Default)]
pub struct MigrationLeases {
    held: DashMap<(ReleaseId, ContainerId), JobId>,
}

impl MigrationLeases {
    /// Create an empty lease table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lease for a pair
    ///
    /// # Errors
    /// Returns [`CoreError::MigrationInFlight`] while another job holds the
    /// pair.
    pub fn try_acquire(
        leases: &Arc<Self>,
        release: ReleaseId,
        container: ContainerId,
        job: JobId,
    ) -> Result<MigrationLease, CoreError> {
        use dashmap::mapref::entry::Entry;
        match leases.held.entry((release, container)) {
            Entry::Occupied(_) => Err(CoreError::MigrationInFlight { release, container }),
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(MigrationLease {
                    leases: Arc::clone(leases),
                    key: (release, container),
                })
            }
        }
    }

    /// Whether a pair currently holds a lease
    #[inline]
    #[must_use]
    pub fn is_held(&self, release: ReleaseId, container: ContainerId) -> bool {
        self.held.contains_key(&(release, container))
    }
}

/// Held lease for one (release, container) pair; released on drop
#[derive(Debug)]
pub struct MigrationLease {
    leases: Arc<MigrationLeases>,
    key: (ReleaseId, ContainerId),
}

impl Drop for MigrationLease {
    fn drop(&mut self) {
        self.leases.held.remove(&self.key);
    }
}

struct QueuedJob {
    job: MigrationJob,
    lease: MigrationLease,
    state_tx: watch::Sender<JobState>,
    report_tx: oneshot::Sender<MigrationReport>,
}

/// The migration orchestrator
///
/// Dispatch is fire-and-forget: the caller gets a [`JobHandle`] back
/// immediately and the rewrite happens on worker tasks. There is no retry
/// loop and no cancellation; a failed job must be re-submitted.
#[derive(Debug)]
pub struct MigrationOrchestrator {
    queue: mpsc::UnboundedSender<QueuedJob>,
    reports: Arc<DashMap<JobId, MigrationReport>>,
}

impl std::fmt::Debug for QueuedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedJob").field("job", &self.job).finish()
    }
}

impl MigrationOrchestrator {
    /// Create the orchestrator and start its consumer loop
    #[must_use]
    pub fn new(
        config: &CoreConfig,
        schemas: Arc<SchemaStore>,
        containers: Arc<dyn ContainerStore>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let reports = Arc::new(DashMap::new());
        let runner = Arc::new(JobRunner {
            schemas,
            containers,
            reports: Arc::clone(&reports),
        });
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        tokio::spawn(consume(queue_rx, runner, limiter));
        Self {
            queue: queue_tx,
            reports,
        }
    }

    /// Enqueue a job, returning its handle without waiting for execution
    ///
    /// # Errors
    /// Returns [`CoreError::OrchestratorStopped`] when the consumer loop is
    /// gone.
    pub fn dispatch(&self, job: MigrationJob, lease: MigrationLease) -> Result<JobHandle, CoreError> {
        let (state_tx, state_rx) = watch::channel(JobState::Queued);
        let (report_tx, report_rx) = oneshot::channel();
        let handle = JobHandle::new(job.clone(), state_rx, report_rx);

        tracing::info!(
            job = %job.id,
            topic = %job.topic,
            release = %job.release,
            container = %job.container,
            from = job.from_version,
            to = job.to_version,
            "dispatching migration job"
        );
        self.queue
            .send(QueuedJob {
                job,
                lease,
                state_tx,
                report_tx,
            })
            .map_err(|_| CoreError::OrchestratorStopped)?;
        Ok(handle)
    }

    /// Look up the report of a terminated job
    #[inline]
    #[must_use]
    pub fn report(&self, job: JobId) -> Option<MigrationReport> {
        self.reports.get(&job).map(|r| r.clone())
    }
}

async fn consume(
    mut queue: mpsc::UnboundedReceiver<QueuedJob>,
    runner: Arc<JobRunner>,
    limiter: Arc<Semaphore>,
) {
    while let Some(queued) = queue.recv().await {
        let Ok(permit) = Arc::clone(&limiter).acquire_owned().await else {
            break;
        };
        let runner = Arc::clone(&runner);
        tokio::spawn(async move {
            let _permit = permit;
            runner.run(queued).await;
        });
    }
}

#[derive(Debug)]
struct JobRunner {
    schemas: Arc<SchemaStore>,
    containers: Arc<dyn ContainerStore>,
    reports: Arc<DashMap<JobId, MigrationReport>>,
}

impl JobRunner {
    async fn run(&self, queued: QueuedJob) {
        let QueuedJob {
            job,
            lease,
            state_tx,
            report_tx,
        } = queued;

        if let Err(err) = validate_transition(JobState::Queued, JobState::Running) {
            tracing::error!(job = %job.id, %err, "refusing to start job");
            return;
        }
        let _ = state_tx.send(JobState::Running);
        tracing::info!(job = %job.id, "migration job running");

        let report = self.execute(&job).await;
        let terminal = report.state;
        if let Err(err) = validate_transition(JobState::Running, terminal) {
            tracing::error!(job = %job.id, %err, "invalid terminal state");
        }

        match terminal {
            JobState::Completed => tracing::info!(
                job = %job.id,
                migrated = report.migrated,
                skipped = report.skipped,
                failed = report.failed.len(),
                "migration job completed"
            ),
            JobState::Failed => tracing::error!(
                job = %job.id,
                error = report.error.as_deref().unwrap_or("unknown"),
                "migration job failed"
            ),
            JobState::Queued | JobState::Running => {}
        }

        self.reports.insert(job.id, report.clone());
        let _ = state_tx.send(terminal);
        let _ = report_tx.send(report);
        drop(lease);
    }

    /// Execute the rewrite for one job and build its report
    async fn execute(&self, job: &MigrationJob) -> MigrationReport {
        let scripts = match self
            .schemas
            .compose_scripts(job.container, job.from_version, job.to_version)
        {
            Ok(scripts) => scripts,
            Err(err) => return failed_report(job, 0, 0, Vec::new(), err.to_string()),
        };
        let target = match self.schemas.version(job.container, job.to_version) {
            Ok(target) => target,
            Err(err) => return failed_report(job, 0, 0, Vec::new(), err.to_string()),
        };
        let candidates = match self
            .containers
            .live_at(job.release, job.container, job.from_version)
            .await
        {
            Ok(candidates) => candidates,
            Err(err) => return failed_report(job, 0, 0, Vec::new(), err.to_string()),
        };

        let mut migrated = 0usize;
        let mut skipped = 0usize;
        let mut failed: Vec<ContainerFailure> = Vec::new();

        for (position, container) in candidates.iter().enumerate() {
            // Idempotent replay: containers already rewritten are no work
            if container.version() == job.to_version {
                skipped += 1;
                continue;
            }

            match rewrite(container, &scripts, &target) {
                Ok(replacement) => match self
                    .containers
                    .replace(container.row(), replacement)
                    .await
                {
                    Ok(_) => migrated += 1,
                    Err(StoreError::RowNotFound(_)) => {
                        // The row vanished under us (concurrent replay of a
                        // re-submitted job); equivalent to already migrated.
                        skipped += 1;
                    }
                    Err(err) => {
                        return failed_report(
                            job,
                            migrated,
                            skipped,
                            failed,
                            format!("aborted at container {position}: {err}"),
                        );
                    }
                },
                Err(err) => {
                    tracing::warn!(
                        job = %job.id,
                        row = %container.row(),
                        %err,
                        "container failed migration"
                    );
                    failed.push(ContainerFailure {
                        row: container.row(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        MigrationReport {
            job: job.id,
            state: JobState::Completed,
            migrated,
            skipped,
            failed,
            error: None,
            finished_at: Utc::now(),
        }
    }
}

/// Apply the composed scripts to one container, producing its successor
///
/// Values unaffected by any operation are copied unchanged; the result must
/// type-check against the target version's model.
fn rewrite(
    container: &FieldContainer,
    scripts: &[Arc<dyn FieldTransform>],
    target: &Arc<SchemaContainerVersion>,
) -> Result<FieldContainer, FieldError> {
    let mut fields = container.fields().clone();
    for script in scripts {
        script.apply(&mut fields)?;
    }
    container.replace_all_fields(fields, Arc::clone(target))
}

fn failed_report(
    job: &MigrationJob,
    migrated: usize,
    skipped: usize,
    failed: Vec<ContainerFailure>,
    error: String,
) -> MigrationReport {
    MigrationReport {
        job: job.id,
        state: JobState::Failed,
        migrated,
        skipped,
        failed,
        error: Some(error),
        finished_at: Utc::now(),
    }
}
