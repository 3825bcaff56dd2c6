//! Migration job descriptors, state machine and handles
//!
//! A job is the unit of asynchronous work that rewrites field containers
//! from one schema version to another. Its lifecycle is the fixed path
//! `Queued -> Running -> {Completed, Failed}` with no retry loop: a failed
//! job is reported and must be re-submitted by a caller.

use chrono::{DateTime, Utc};
use csm_schema::{ContainerId, JobId, ProjectId, ReleaseId, RowId, SchemaKind};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};

/// Named migration topic a job is routed through
///
/// Schema and microschema migrations flow through separate topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationTopic {
    /// Schema container migrations
    Schemas,
    /// Microschema container migrations
    Microschemas,
}

impl From<SchemaKind> for MigrationTopic {
    fn from(kind: SchemaKind) -> Self {
        match kind {
            SchemaKind::Schema => Self::Schemas,
            SchemaKind::Microschema => Self::Microschemas,
        }
    }
}

impl std::fmt::Display for MigrationTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schemas => write!(f, "schemas"),
            Self::Microschemas => write!(f, "microschemas"),
        }
    }
}

/// Typed migration job descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationJob {
    /// Job identity
    pub id: JobId,
    /// Owning project
    pub project: ProjectId,
    /// Release whose containers are rewritten
    pub release: ReleaseId,
    /// Schema container being migrated
    pub container: ContainerId,
    /// Routing topic
    pub topic: MigrationTopic,
    /// Source version
    pub from_version: u32,
    /// Target version
    pub to_version: u32,
    /// Time the job was accepted
    pub queued_at: DateTime<Utc>,
}

impl MigrationJob {
    /// Create a job descriptor with a pre-allocated identity
    #[must_use]
    pub fn with_id(
        id: JobId,
        project: ProjectId,
        release: ReleaseId,
        container: ContainerId,
        kind: SchemaKind,
        from_version: u32,
        to_version: u32,
    ) -> Self {
        Self {
            id,
            project,
            release,
            container,
            topic: MigrationTopic::from(kind),
            from_version,
            to_version,
            queued_at: Utc::now(),
        }
    }
}

/// Job lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted, waiting for a worker
    Queued,
    /// Rewrite in progress
    Running,
    /// Terminal: all containers processed
    Completed,
    /// Terminal: aborted by an infrastructure failure
    Failed,
}

impl JobState {
    /// Whether the state is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// States reachable from a given state
#[must_use]
pub fn allowed_transitions(from: JobState) -> Vec<JobState> {
    use JobState::{Completed, Failed, Queued, Running};
    match from {
        Queued => vec![Running],
        Running => vec![Completed, Failed],
        Completed | Failed => vec![],
    }
}

/// Attempted transition outside the job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal job state transition: {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// State the job was in
    pub from: JobState,
    /// State that was requested
    pub to: JobState,
}

/// Validate a job state transition
///
/// # Errors
/// Returns [`IllegalTransition`] when `to` is not reachable from `from`.
pub fn validate_transition(from: JobState, to: JobState) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

/// One container that failed migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerFailure {
    /// Row identity of the failed container
    pub row: RowId,
    /// Failure reason, e.g. an impossible coercion
    pub reason: String,
}

/// Result of one migration job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Job identity
    pub job: JobId,
    /// Terminal state the job reached
    pub state: JobState,
    /// Containers rewritten to the target version
    pub migrated: usize,
    /// Containers already at the target version (idempotent replay)
    pub skipped: usize,
    /// Containers that failed individually; never job-fatal
    pub failed: Vec<ContainerFailure>,
    /// Abort reason for `Failed` jobs, including the position reached
    pub error: Option<String>,
    /// Completion time
    pub finished_at: DateTime<Utc>,
}

impl MigrationReport {
    /// Whether the job ran to completion (per-container failures permitted)
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == JobState::Completed
    }
}

/// Caller-side handle to a dispatched job
///
/// The pin is recorded before the handle exists; readers may observe the new
/// pin while the job is still queued or running. The handle only observes —
/// dropping it never cancels the job.
#[derive(Debug)]
pub struct JobHandle {
    job: MigrationJob,
    state: watch::Receiver<JobState>,
    report: oneshot::Receiver<MigrationReport>,
}

impl JobHandle {
    pub(crate) fn new(
        job: MigrationJob,
        state: watch::Receiver<JobState>,
        report: oneshot::Receiver<MigrationReport>,
    ) -> Self {
        Self { job, state, report }
    }

    /// The dispatched descriptor
    #[inline]
    #[must_use]
    pub fn job(&self) -> &MigrationJob {
        &self.job
    }

    /// Current job state
    #[inline]
    #[must_use]
    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Wait for the job to reach a terminal state and return its report
    ///
    /// # Errors
    /// Returns [`crate::CoreError::JobInterrupted`] when the worker died
    /// without reporting.
    pub async fn await_terminal(self) -> Result<MigrationReport, crate::CoreError> {
        self.report
            .await
            .map_err(|_| crate::CoreError::JobInterrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_is_a_fixed_path() {
        assert!(validate_transition(JobState::Queued, JobState::Running).is_ok());
        assert!(validate_transition(JobState::Running, JobState::Completed).is_ok());
        assert!(validate_transition(JobState::Running, JobState::Failed).is_ok());
    }

    #[test]
    fn no_retry_and_no_skip() {
        assert!(validate_transition(JobState::Queued, JobState::Completed).is_err());
        assert!(validate_transition(JobState::Failed, JobState::Running).is_err());
        assert!(validate_transition(JobState::Completed, JobState::Queued).is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn topic_follows_kind() {
        assert_eq!(
            MigrationTopic::from(SchemaKind::Schema),
            MigrationTopic::Schemas
        );
        assert_eq!(
            MigrationTopic::from(SchemaKind::Microschema),
            MigrationTopic::Microschemas
        );
    }

    #[test]
    fn descriptor_carries_the_full_tuple() {
        let job = MigrationJob::with_id(
            JobId::new(),
            ProjectId::new(),
            ReleaseId::new(),
            ContainerId::new(),
            SchemaKind::Schema,
            1,
            3,
        );
        assert_eq!(job.from_version, 1);
        assert_eq!(job.to_version, 3);
        assert_eq!(job.topic, MigrationTopic::Schemas);
    }
}
