//! Schema models — one immutable field-definition list per version

use crate::error::FieldError;
use crate::field::{FieldMap, FieldSchema};
use serde::{Deserialize, Serialize};

/// One version's complete field-definition list plus container-level
/// attributes
///
/// # Invariants
/// - Field keys are unique
/// - Never mutated after being bound to a version; change operations produce
///   a new model instead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    /// Presented schema name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Key of the field used as display value
    pub display_field: Option<String>,
    /// Ordered field definitions
    pub fields: Vec<FieldSchema>,
}

impl SchemaModel {
    /// Create an empty model
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            display_field: None,
            fields: Vec::new(),
        }
    }

    /// Append a field definition
    #[inline]
    #[must_use]
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Set the description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the display field key
    #[inline]
    #[must_use]
    pub fn with_display_field(mut self, key: impl Into<String>) -> Self {
        self.display_field = Some(key.into());
        self
    }

    /// Look up a field definition by key
    #[inline]
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Position of a field key in the ordered list
    #[inline]
    #[must_use]
    pub fn field_position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.key == key)
    }

    /// Type-check a field map against this model
    ///
    /// Every present value must match its declared type, every required
    /// field must carry a value, and no value may exist for an undeclared
    /// key.
    ///
    /// # Errors
    /// Returns the first [`FieldError`] encountered, in schema field order.
    pub fn validate_fields(&self, fields: &FieldMap) -> Result<(), FieldError> {
        for def in &self.fields {
            match fields.get(&def.key) {
                Some(value) => {
                    if !value.matches(&def.field_type) {
                        return Err(FieldError::TypeMismatch {
                            key: def.key.clone(),
                            expected: def.field_type.clone(),
                        });
                    }
                }
                None => {
                    if def.required {
                        return Err(FieldError::MissingRequired {
                            key: def.key.clone(),
                        });
                    }
                }
            }
        }
        for key in fields.keys() {
            if self.field(key).is_none() {
                return Err(FieldError::UnknownField { key: key.clone() });
            }
        }
        Ok(())
    }
}
