//! CSM Core - release version registry and migration orchestrator
//!
//! The orchestration layer of the workspace:
//! - Pins schema versions to releases with a strict no-downgrade rule
//! - Dispatches asynchronous migration jobs off the request path
//! - Rewrites field containers from one schema version to the next
//! - Pushes search-index mapping updates through a pluggable seam
//!
//! # Example
//!
//! ```rust,ignore
//! use csm_core::{CoreConfig, MigrationLeases, MigrationOrchestrator, ReleaseHandler,
//!     ReleaseRegistry};
//! use csm_core::index::NoopIndex;
//! use csm_store::{MemoryContainerStore, SchemaRef, SchemaStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), csm_core::CoreError> {
//! let schemas = Arc::new(SchemaStore::new());
//! let containers = Arc::new(MemoryContainerStore::new());
//! let leases = Arc::new(MigrationLeases::new());
//! let registry = Arc::new(ReleaseRegistry::new(Arc::clone(&leases)));
//! let orchestrator = Arc::new(MigrationOrchestrator::new(
//!     &CoreConfig::new(),
//!     Arc::clone(&schemas),
//!     containers,
//! ));
//! let handler = ReleaseHandler::new(registry, schemas, orchestrator, Arc::new(NoopIndex));
//!
//! let release = handler.create_release(csm_schema::ProjectId::new(), "initial");
//! let result = handler
//!     .assign_schema_versions(release.project(), release.id(), &[SchemaRef::latest("article")])
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod config;
pub mod error;
pub mod handler;
pub mod index;
pub mod job;
pub mod orchestrator;
pub mod registry;

// Re-exports for convenience
pub use config::CoreConfig;
pub use error::CoreError;
pub use handler::{AssignmentResult, ReleaseHandler, SchemaVersionRef};
pub use index::{IndexError, MappingUpdate, NoopIndex, RecordingIndex, SearchIndex};
pub use job::{
    ContainerFailure, JobHandle, JobState, MigrationJob, MigrationReport, MigrationTopic,
};
pub use orchestrator::{MigrationLease, MigrationLeases, MigrationOrchestrator};
pub use registry::{AssignDecision, Release, ReleaseRegistry};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the versioning core
    pub use crate::{
        CoreConfig, CoreError, JobState, MigrationLeases, MigrationOrchestrator, MigrationReport,
        ReleaseHandler, ReleaseRegistry, SchemaVersionRef,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
