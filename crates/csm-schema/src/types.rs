//! Identifier types shared across the workspace
//!
//! All identifiers are ULID newtypes (sortable, collision-free) following
//! one pattern: `new()`, `Default`, `Display`, serde support.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a new random identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Unique project identifier
    ProjectId
);
id_type!(
    /// Unique release identifier
    ReleaseId
);
id_type!(
    /// Unique schema container identifier (stable across versions)
    ContainerId
);
id_type!(
    /// Unique content item identifier
    ContentId
);
id_type!(
    /// Unique field container row identifier
    RowId
);
id_type!(
    /// Unique migration job identifier
    JobId
);

/// Kind of a schema container
///
/// Schema and microschema containers share the full versioning contract but
/// live in separate namespaces and migrate through separate topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    /// Top-level content schema
    Schema,
    /// Embedded microschema
    Microschema,
}

impl std::fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema => write!(f, "schema"),
            Self::Microschema => write!(f, "microschema"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(ContainerId::new(), ContainerId::new());
        assert_ne!(ReleaseId::new(), ReleaseId::new());
    }

    #[test]
    fn id_display_roundtrip() {
        let id = RowId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 26);
    }

    #[test]
    fn schema_kind_display() {
        assert_eq!(SchemaKind::Schema.to_string(), "schema");
        assert_eq!(SchemaKind::Microschema.to_string(), "microschema");
    }
}
