//! Content field containers
//!
//! A [`FieldContainer`] holds the field data for one content item, one
//! language, one edit state, scoped to one release and bound to exactly one
//! schema version. Containers are immutable units: migration supersedes them
//! with a new container instead of mutating in place.

use csm_schema::{
    ContentId, FieldError, FieldMap, FieldValue, ReleaseId, RowId, SchemaContainerVersion,
    ContainerId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Edit state of a field container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditState {
    /// Work-in-progress content
    Draft,
    /// Published content
    Published,
}

impl std::fmt::Display for EditState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Published => write!(f, "published"),
        }
    }
}

/// The versioned, per-language unit of stored field data
///
/// # Invariants
/// - `fields` type-check against the bound version's model at construction
/// - Never mutated; [`Self::replace_all_fields`] produces the successor
#[derive(Debug, Clone)]
pub struct FieldContainer {
    row: RowId,
    content: ContentId,
    language: String,
    state: EditState,
    release: ReleaseId,
    schema_version: Arc<SchemaContainerVersion>,
    fields: FieldMap,
}

impl FieldContainer {
    /// Create a container, validating the fields against the bound version
    ///
    /// # Errors
    /// Returns [`FieldError`] when the fields do not type-check against the
    /// version's model.
    pub fn new(
        content: ContentId,
        language: impl Into<String>,
        state: EditState,
        release: ReleaseId,
        schema_version: Arc<SchemaContainerVersion>,
        fields: FieldMap,
    ) -> Result<Self, FieldError> {
        schema_version.model().validate_fields(&fields)?;
        Ok(Self {
            row: RowId::new(),
            content,
            language: language.into(),
            state,
            release,
            schema_version,
            fields,
        })
    }

    /// Row identity of this container
    #[inline]
    #[must_use]
    pub fn row(&self) -> RowId {
        self.row
    }

    /// Owning content item
    #[inline]
    #[must_use]
    pub fn content_id(&self) -> ContentId {
        self.content
    }

    /// Language tag
    #[inline]
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Edit state
    #[inline]
    #[must_use]
    pub fn state(&self) -> EditState {
        self.state
    }

    /// Owning release
    #[inline]
    #[must_use]
    pub fn release(&self) -> ReleaseId {
        self.release
    }

    /// The schema version this container is bound to
    #[inline]
    #[must_use]
    pub fn schema_version(&self) -> &Arc<SchemaContainerVersion> {
        &self.schema_version
    }

    /// Identity of the bound schema container
    #[inline]
    #[must_use]
    pub fn container_id(&self) -> ContainerId {
        self.schema_version.container_id()
    }

    /// Bound schema version number
    #[inline]
    #[must_use]
    pub fn version(&self) -> u32 {
        self.schema_version.version()
    }

    /// The raw field map
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Read a field value, validated against the owning version's definition
    ///
    /// Returns `None` for a key the model does not define or an optional
    /// field without a value.
    ///
    /// # Errors
    /// - [`FieldError::MissingRequired`] when a required field has no value
    /// - [`FieldError::TypeMismatch`] when the stored value does not match
    ///   the declared type
    pub fn field_value(&self, key: &str) -> Result<Option<&FieldValue>, FieldError> {
        let Some(def) = self.schema_version.model().field(key) else {
            return Ok(None);
        };
        match self.fields.get(key) {
            Some(value) => {
                if value.matches(&def.field_type) {
                    Ok(Some(value))
                } else {
                    Err(FieldError::TypeMismatch {
                        key: key.to_string(),
                        expected: def.field_type.clone(),
                    })
                }
            }
            None => {
                if def.required {
                    Err(FieldError::MissingRequired {
                        key: key.to_string(),
                    })
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Produce the successor container bound to a new version
    ///
    /// Orchestrator-only path: the new container keeps content identity,
    /// language, state and release, gets a fresh row identity, and validates
    /// the new fields against the new version.
    ///
    /// # Errors
    /// Returns [`FieldError`] when `new_fields` do not type-check against
    /// `new_version`.
    pub fn replace_all_fields(
        &self,
        new_fields: FieldMap,
        new_version: Arc<SchemaContainerVersion>,
    ) -> Result<FieldContainer, FieldError> {
        new_version.model().validate_fields(&new_fields)?;
        Ok(Self {
            row: RowId::new(),
            content: self.content,
            language: self.language.clone(),
            state: self.state,
            release: self.release,
            schema_version: new_version,
            fields: new_fields,
        })
    }
}
