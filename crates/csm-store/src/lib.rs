//! CSM Store - schema/version store and field container storage seam
//!
//! Sits between the data model and the orchestration layer:
//! - [`SchemaStore`] holds containers and their version chains
//! - [`FieldContainer`] is the stored unit of content field data
//! - [`ContainerStore`] is the seam to the durable storage engine, with
//!   [`MemoryContainerStore`] as the in-process reference implementation

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod content;
pub mod error;
pub mod schema_store;
pub mod store;

// Re-exports for convenience
pub use content::{EditState, FieldContainer};
pub use error::StoreError;
pub use schema_store::{SchemaRef, SchemaStore};
pub use store::{ContainerStore, MemoryContainerStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
