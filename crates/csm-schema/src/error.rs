//! Error types for the schema model
//!
//! Three layers, matching where a failure is detected:
//! - [`FieldError`] — value-level: coercion and type-check failures
//! - [`ModelError`] — applying a change operation to a schema model
//! - [`ChainError`] — structural violations of the version chain

use crate::field::FieldType;

/// Value-level failures
///
/// These are per-container during migration: collected, never job-fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    /// Value cannot be coerced into the target type
    #[error("field '{key}': cannot coerce {value_kind} value to {target}")]
    Coercion {
        /// Field key
        key: String,
        /// Kind of the stored value
        value_kind: &'static str,
        /// Requested target type
        target: FieldType,
    },

    /// Stored value does not match the declared type
    #[error("field '{key}': value does not match declared type {expected}")]
    TypeMismatch {
        /// Field key
        key: String,
        /// Declared type
        expected: FieldType,
    },

    /// Required field has no value
    #[error("required field '{key}' has no value")]
    MissingRequired {
        /// Field key
        key: String,
    },

    /// Value present for a key the schema does not define
    #[error("field '{key}' is not defined by the schema")]
    UnknownField {
        /// Field key
        key: String,
    },

    /// Custom migration script rejected the container
    #[error("migration script failed: {0}")]
    ScriptFailed(String),
}

/// Failures applying a change operation to a schema model
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Field key already defined
    #[error("field '{key}' already exists")]
    DuplicateField {
        /// Field key
        key: String,
    },

    /// Field key not defined
    #[error("field '{key}' does not exist")]
    UnknownField {
        /// Field key
        key: String,
    },

    /// Schema name must be non-empty
    #[error("schema name must not be empty")]
    EmptyName,
}

/// Structural violations of the version chain
///
/// These indicate schema-graph corruption or an unreachable target and are
/// surfaced as server errors, never user-correctable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// Version already has an outgoing change (no branching)
    #[error("version {at} already has a successor (head is {head}); chains never branch")]
    Broken {
        /// Version the append was attempted at
        at: u32,
        /// Current head version
        head: u32,
    },

    /// Target version is not forward-reachable from the source
    #[error("no forward path from version {from} to version {to}")]
    NoPath {
        /// Source version
        from: u32,
        /// Target version
        to: u32,
    },

    /// Version number does not exist in the chain
    #[error("version {0} does not exist")]
    UnknownVersion(u32),

    /// The change cannot be applied to the predecessor model
    #[error("invalid change: {0}")]
    InvalidChange(#[from] ModelError),
}
