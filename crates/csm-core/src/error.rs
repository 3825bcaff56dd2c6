//! Error types for the versioning core
//!
//! Split along the propagation boundary:
//! - validation errors (`Downgrade`, unresolved references, in-flight
//!   conflicts) are detected before any mutation and returned synchronously
//! - migration errors surface asynchronously in the job report and are
//!   never rolled back automatically

use crate::job::IllegalTransition;
use csm_schema::{ChainError, ContainerId, ReleaseId};
use csm_store::StoreError;

/// Main error type of the versioning core
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Target version is older than the currently pinned one
    #[error(
        "cannot downgrade schema '{name}': currently assigned version {current}, \
         rejected target version {target}"
    )]
    Downgrade {
        /// Schema name as presented by the rejected target version
        name: String,
        /// Currently pinned version number
        current: u32,
        /// Rejected target version number
        target: u32,
    },

    /// A migration for this (release, container) pair is still running
    #[error("migration already in flight for release {release} and schema container {container}")]
    MigrationInFlight {
        /// Release half of the pair
        release: ReleaseId,
        /// Container half of the pair
        container: ContainerId,
    },

    /// Release identity unknown to the registry
    #[error("release {0} does not exist")]
    ReleaseNotFound(ReleaseId),

    /// Operation is intentionally unsupported
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// Store-level failure (unresolved reference or infrastructure)
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Version-chain violation
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// Job state machine violation
    #[error(transparent)]
    JobState(#[from] IllegalTransition),

    /// Orchestrator consumer task is gone; dispatch impossible
    #[error("migration orchestrator is not running")]
    OrchestratorStopped,

    /// Job terminated without delivering a report
    #[error("job result channel closed before completion")]
    JobInterrupted,
}

impl CoreError {
    /// Whether the failure is user-correctable (bad request) rather than a
    /// server-side fault
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Downgrade { .. }
            | Self::MigrationInFlight { .. }
            | Self::ReleaseNotFound(_)
            | Self::NotImplemented(_) => true,
            Self::Store(err) => !err.is_infrastructure(),
            Self::Chain(_)
            | Self::JobState(_)
            | Self::OrchestratorStopped
            | Self::JobInterrupted => false,
        }
    }
}
