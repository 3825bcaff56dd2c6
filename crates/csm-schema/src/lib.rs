//! CSM Schema - versioned field-schema model
//!
//! The leaf data-model crate of the workspace:
//! - Field types, definitions and values with total coercion rules
//! - Immutable schema models and version snapshots
//! - The schema change chain with auto-derived migration scripts
//!
//! # Example
//!
//! ```rust
//! use csm_schema::{
//!     ChangeOperation, FieldSchema, FieldType, SchemaChange, SchemaContainer, SchemaKind,
//!     SchemaModel,
//! };
//!
//! let model = SchemaModel::new("article")
//!     .with_field(FieldSchema::new("title", FieldType::String).required());
//! let mut container = SchemaContainer::new("article", SchemaKind::Schema, model);
//!
//! let v2 = container
//!     .append(
//!         1,
//!         SchemaChange::new(ChangeOperation::AddField {
//!             field: FieldSchema::new("subtitle", FieldType::String),
//!             insert_after: None,
//!         }),
//!     )
//!     .unwrap();
//! assert_eq!(v2.version(), 2);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod chain;
pub mod change;
pub mod error;
pub mod field;
pub mod model;
pub mod types;

// Re-exports for convenience
pub use chain::{SchemaContainer, SchemaContainerVersion};
pub use change::{AutoScript, ChangeOperation, FieldTransform, SchemaChange};
pub use error::{ChainError, FieldError, ModelError};
pub use field::{FieldMap, FieldSchema, FieldType, FieldValue};
pub use model::SchemaModel;
pub use types::{ContainerId, ContentId, JobId, ProjectId, ReleaseId, RowId, SchemaKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
