//! Error types for the store layer

use csm_schema::{ChainError, ContainerId, RowId, SchemaKind};

/// Store-level failures
///
/// `NotFound` variants are user-correctable (bad reference in a request);
/// `Unavailable` is the infrastructure failure that aborts a running
/// migration job.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Schema reference did not resolve
    #[error("schema reference '{reference}' could not be resolved")]
    NotFound {
        /// The unresolved reference, rendered for diagnostics
        reference: String,
    },

    /// No container registered under this identity
    #[error("schema container {0} does not exist")]
    ContainerNotFound(ContainerId),

    /// A container with this name already exists within the kind namespace
    #[error("{kind} '{name}' is already registered")]
    DuplicateContainer {
        /// Container kind namespace
        kind: SchemaKind,
        /// Logical container name
        name: String,
    },

    /// No field container row under this identity
    #[error("field container row {0} does not exist")]
    RowNotFound(RowId),

    /// Backing storage unreachable; the current unit of work must abort
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Version-chain violation bubbled up from the schema layer
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
}

impl StoreError {
    /// Whether the failure is an infrastructure fault rather than a bad
    /// request
    #[inline]
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_classification() {
        assert!(StoreError::Unavailable("down".into()).is_infrastructure());
        assert!(
            !StoreError::NotFound {
                reference: "article@3".into()
            }
            .is_infrastructure()
        );
    }
}
