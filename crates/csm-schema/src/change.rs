//! Schema change operations and migration scripts
//!
//! A [`SchemaChange`] links one version to its immediate successor. Its
//! operation is a closed tagged enum, so both the model transformation and
//! the auto-derived migration script are total functions over the operation
//! set. A custom [`FieldTransform`] can override the auto script per change.

use crate::error::{FieldError, ModelError};
use crate::field::{FieldMap, FieldSchema, FieldType};
use crate::model::SchemaModel;
use std::fmt::Debug;
use std::sync::Arc;

/// Closed set of schema diff operations
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOperation {
    /// Add a new field definition
    AddField {
        /// The definition to add
        field: FieldSchema,
        /// Insert after this key; appended at the end when absent
        insert_after: Option<String>,
    },

    /// Remove a field definition; stored values for the key are dropped
    RemoveField {
        /// Field key
        key: String,
    },

    /// Change a field's declared type; stored values are coerced
    ChangeFieldType {
        /// Field key
        key: String,
        /// New declared type
        new_type: FieldType,
    },

    /// Update a field's required flag and/or label
    UpdateField {
        /// Field key
        key: String,
        /// New required flag, unchanged when absent
        required: Option<bool>,
        /// New label, unchanged when absent
        label: Option<String>,
    },

    /// Rename the presented schema name
    RenameSchema {
        /// New name
        new_name: String,
    },

    /// Update container-level attributes
    UpdateSchemaProperties {
        /// New description, unchanged when absent
        description: Option<String>,
        /// New display field key, unchanged when absent
        display_field: Option<String>,
    },
}

impl ChangeOperation {
    /// Stable lowercase name of the operation kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddField { .. } => "addfield",
            Self::RemoveField { .. } => "removefield",
            Self::ChangeFieldType { .. } => "changefieldtype",
            Self::UpdateField { .. } => "updatefield",
            Self::RenameSchema { .. } => "rename",
            Self::UpdateSchemaProperties { .. } => "updateschema",
        }
    }

    /// Derive the successor model from a predecessor model
    ///
    /// # Errors
    /// Returns [`ModelError`] when the operation does not fit the
    /// predecessor (duplicate key, unknown key, empty name).
    pub fn apply_to_model(&self, model: &SchemaModel) -> Result<SchemaModel, ModelError> {
        let mut next = model.clone();
        match self {
            Self::AddField {
                field,
                insert_after,
            } => {
                if next.field(&field.key).is_some() {
                    return Err(ModelError::DuplicateField {
                        key: field.key.clone(),
                    });
                }
                let position = match insert_after {
                    Some(after) => {
                        let at = next
                            .field_position(after)
                            .ok_or_else(|| ModelError::UnknownField { key: after.clone() })?;
                        at + 1
                    }
                    None => next.fields.len(),
                };
                next.fields.insert(position, field.clone());
            }
            Self::RemoveField { key } => {
                let at = next
                    .field_position(key)
                    .ok_or_else(|| ModelError::UnknownField { key: key.clone() })?;
                next.fields.remove(at);
                if next.display_field.as_deref() == Some(key.as_str()) {
                    next.display_field = None;
                }
            }
            Self::ChangeFieldType { key, new_type } => {
                let field = next
                    .fields
                    .iter_mut()
                    .find(|f| f.key == *key)
                    .ok_or_else(|| ModelError::UnknownField { key: key.clone() })?;
                field.field_type = new_type.clone();
            }
            Self::UpdateField {
                key,
                required,
                label,
            } => {
                let field = next
                    .fields
                    .iter_mut()
                    .find(|f| f.key == *key)
                    .ok_or_else(|| ModelError::UnknownField { key: key.clone() })?;
                if let Some(required) = required {
                    field.required = *required;
                }
                if let Some(label) = label {
                    field.label = Some(label.clone());
                }
            }
            Self::RenameSchema { new_name } => {
                if new_name.trim().is_empty() {
                    return Err(ModelError::EmptyName);
                }
                next.name = new_name.clone();
            }
            Self::UpdateSchemaProperties {
                description,
                display_field,
            } => {
                if let Some(description) = description {
                    next.description = Some(description.clone());
                }
                if let Some(display_field) = display_field {
                    if next.field(display_field).is_none() {
                        return Err(ModelError::UnknownField {
                            key: display_field.clone(),
                        });
                    }
                    next.display_field = Some(display_field.clone());
                }
            }
        }
        Ok(next)
    }
}

/// Transformation applied to a container's field map during migration
///
/// Implementations must be deterministic; the orchestrator may replay them
/// against the same input when a job is re-submitted.
pub trait FieldTransform: Send + Sync + Debug {
    /// Rewrite the field map in place
    ///
    /// # Errors
    /// Returns [`FieldError`] when this container cannot be transformed;
    /// the failure is per-container and never aborts the surrounding job.
    fn apply(&self, fields: &mut FieldMap) -> Result<(), FieldError>;

    /// Describe the transformation for logs and reports
    fn describe(&self) -> String;
}

/// Auto-derived migration script for one change operation
///
/// The mapping is fixed per operation kind: remove-field strips the key,
/// change-field-type coerces the value, all definition-only operations leave
/// stored values untouched (absent optional values read as none).
#[derive(Debug, Clone)]
pub struct AutoScript {
    operation: ChangeOperation,
}

impl AutoScript {
    /// Create the auto script for an operation
    #[inline]
    #[must_use]
    pub fn new(operation: ChangeOperation) -> Self {
        Self { operation }
    }
}

impl FieldTransform for AutoScript {
    fn apply(&self, fields: &mut FieldMap) -> Result<(), FieldError> {
        match &self.operation {
            ChangeOperation::RemoveField { key } => {
                fields.shift_remove(key);
                Ok(())
            }
            ChangeOperation::ChangeFieldType { key, new_type } => {
                if let Some(value) = fields.get(key) {
                    let coerced = value.coerce(key, new_type)?;
                    fields.insert(key.clone(), coerced);
                }
                Ok(())
            }
            ChangeOperation::AddField { .. }
            | ChangeOperation::UpdateField { .. }
            | ChangeOperation::RenameSchema { .. }
            | ChangeOperation::UpdateSchemaProperties { .. } => Ok(()),
        }
    }

    fn describe(&self) -> String {
        match &self.operation {
            ChangeOperation::AddField { field, .. } => format!("addfield:{}", field.key),
            ChangeOperation::RemoveField { key } => format!("removefield:{key}"),
            ChangeOperation::ChangeFieldType { key, new_type } => {
                format!("changefieldtype:{key}->{new_type}")
            }
            ChangeOperation::UpdateField { key, .. } => format!("updatefield:{key}"),
            ChangeOperation::RenameSchema { new_name } => format!("rename:{new_name}"),
            ChangeOperation::UpdateSchemaProperties { .. } => "updateschema".to_string(),
        }
    }
}

/// Directed link from one schema version to its immediate successor
///
/// Owns the diff operation and, optionally, a custom migration script that
/// overrides the auto-derived one.
#[derive(Debug, Clone)]
pub struct SchemaChange {
    operation: ChangeOperation,
    custom_script: Option<Arc<dyn FieldTransform>>,
}

impl SchemaChange {
    /// Create a change with the auto-derived migration script
    #[inline]
    #[must_use]
    pub fn new(operation: ChangeOperation) -> Self {
        Self {
            operation,
            custom_script: None,
        }
    }

    /// Override the migration script for this change
    #[inline]
    #[must_use]
    pub fn with_custom_script(mut self, script: Arc<dyn FieldTransform>) -> Self {
        self.custom_script = Some(script);
        self
    }

    /// The diff operation
    #[inline]
    #[must_use]
    pub fn operation(&self) -> &ChangeOperation {
        &self.operation
    }

    /// Whether a custom script override is set
    #[inline]
    #[must_use]
    pub fn has_custom_script(&self) -> bool {
        self.custom_script.is_some()
    }

    /// The migration script: the custom override if set, else the auto
    /// script synthesized from the operation
    #[must_use]
    pub fn migration_script(&self) -> Arc<dyn FieldTransform> {
        match &self.custom_script {
            Some(script) => Arc::clone(script),
            None => Arc::new(AutoScript::new(self.operation.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldValue;

    fn base_model() -> SchemaModel {
        SchemaModel::new("article")
            .with_display_field("title")
            .with_field(FieldSchema::new("title", FieldType::String).required())
            .with_field(FieldSchema::new("count", FieldType::Number))
    }

    #[test]
    fn add_field_appends() {
        let op = ChangeOperation::AddField {
            field: FieldSchema::new("subtitle", FieldType::String),
            insert_after: None,
        };
        let next = op.apply_to_model(&base_model()).unwrap();
        assert_eq!(next.fields.len(), 3);
        assert_eq!(next.fields[2].key, "subtitle");
    }

    #[test]
    fn add_field_positions_after_key() {
        let op = ChangeOperation::AddField {
            field: FieldSchema::new("subtitle", FieldType::String),
            insert_after: Some("title".into()),
        };
        let next = op.apply_to_model(&base_model()).unwrap();
        assert_eq!(next.fields[1].key, "subtitle");
    }

    #[test]
    fn add_field_rejects_duplicate() {
        let op = ChangeOperation::AddField {
            field: FieldSchema::new("title", FieldType::String),
            insert_after: None,
        };
        assert!(matches!(
            op.apply_to_model(&base_model()),
            Err(ModelError::DuplicateField { .. })
        ));
    }

    #[test]
    fn remove_field_clears_display_field() {
        let op = ChangeOperation::RemoveField { key: "title".into() };
        let next = op.apply_to_model(&base_model()).unwrap();
        assert!(next.field("title").is_none());
        assert_eq!(next.display_field, None);
    }

    #[test]
    fn remove_field_rejects_unknown() {
        let op = ChangeOperation::RemoveField { key: "nope".into() };
        assert!(matches!(
            op.apply_to_model(&base_model()),
            Err(ModelError::UnknownField { .. })
        ));
    }

    #[test]
    fn change_field_type_updates_definition() {
        let op = ChangeOperation::ChangeFieldType {
            key: "count".into(),
            new_type: FieldType::String,
        };
        let next = op.apply_to_model(&base_model()).unwrap();
        assert_eq!(next.field("count").unwrap().field_type, FieldType::String);
    }

    #[test]
    fn update_field_flags_and_label() {
        let op = ChangeOperation::UpdateField {
            key: "count".into(),
            required: Some(true),
            label: Some("Count".into()),
        };
        let next = op.apply_to_model(&base_model()).unwrap();
        let field = next.field("count").unwrap();
        assert!(field.required);
        assert_eq!(field.label.as_deref(), Some("Count"));
    }

    #[test]
    fn update_schema_properties() {
        let op = ChangeOperation::UpdateSchemaProperties {
            description: Some("Articles".into()),
            display_field: Some("count".into()),
        };
        let next = op.apply_to_model(&base_model()).unwrap();
        assert_eq!(next.description.as_deref(), Some("Articles"));
        assert_eq!(next.display_field.as_deref(), Some("count"));
    }

    #[test]
    fn update_schema_properties_rejects_unknown_display_field() {
        let op = ChangeOperation::UpdateSchemaProperties {
            description: None,
            display_field: Some("ghost".into()),
        };
        assert!(matches!(
            op.apply_to_model(&base_model()),
            Err(ModelError::UnknownField { .. })
        ));
    }

    #[test]
    fn rename_rejects_empty() {
        let op = ChangeOperation::RenameSchema { new_name: "  ".into() };
        assert!(matches!(
            op.apply_to_model(&base_model()),
            Err(ModelError::EmptyName)
        ));
    }

    #[test]
    fn auto_script_remove_field_strips_value() {
        let change = SchemaChange::new(ChangeOperation::RemoveField { key: "count".into() });
        let mut fields = FieldMap::new();
        fields.insert("title".into(), FieldValue::String("Hello".into()));
        fields.insert("count".into(), FieldValue::Number(2.0));

        change.migration_script().apply(&mut fields).unwrap();
        assert!(!fields.contains_key("count"));
        assert!(fields.contains_key("title"));
    }

    #[test]
    fn auto_script_remove_field_tolerates_absent_value() {
        let change = SchemaChange::new(ChangeOperation::RemoveField { key: "count".into() });
        let mut fields = FieldMap::new();
        fields.insert("title".into(), FieldValue::String("Hello".into()));

        change.migration_script().apply(&mut fields).unwrap();
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn auto_script_change_type_coerces() {
        let change = SchemaChange::new(ChangeOperation::ChangeFieldType {
            key: "count".into(),
            new_type: FieldType::String,
        });
        let mut fields = FieldMap::new();
        fields.insert("count".into(), FieldValue::Number(7.0));

        change.migration_script().apply(&mut fields).unwrap();
        assert_eq!(fields.get("count"), Some(&FieldValue::String("7".into())));
    }

    #[test]
    fn auto_script_change_type_fails_on_impossible_coercion() {
        let change = SchemaChange::new(ChangeOperation::ChangeFieldType {
            key: "count".into(),
            new_type: FieldType::Date,
        });
        let mut fields = FieldMap::new();
        fields.insert("count".into(), FieldValue::Number(7.0));

        let err = change.migration_script().apply(&mut fields).unwrap_err();
        assert!(matches!(err, FieldError::Coercion { .. }));
    }

    #[test]
    fn auto_script_add_field_leaves_values_untouched() {
        let change = SchemaChange::new(ChangeOperation::AddField {
            field: FieldSchema::new("subtitle", FieldType::String),
            insert_after: None,
        });
        let mut fields = FieldMap::new();
        fields.insert("title".into(), FieldValue::String("Hello".into()));

        change.migration_script().apply(&mut fields).unwrap();
        assert_eq!(fields.len(), 1);
    }

    #[derive(Debug)]
    struct UppercaseTitle;

    impl FieldTransform for UppercaseTitle {
        fn apply(&self, fields: &mut FieldMap) -> Result<(), FieldError> {
            if let Some(FieldValue::String(s)) = fields.get("title") {
                let upper = s.to_uppercase();
                fields.insert("title".into(), FieldValue::String(upper));
            }
            Ok(())
        }

        fn describe(&self) -> String {
            "custom:uppercase-title".to_string()
        }
    }

    #[test]
    fn custom_script_overrides_auto() {
        let change = SchemaChange::new(ChangeOperation::UpdateField {
            key: "title".into(),
            required: None,
            label: Some("Title".into()),
        })
        .with_custom_script(Arc::new(UppercaseTitle));

        assert!(change.has_custom_script());

        let mut fields = FieldMap::new();
        fields.insert("title".into(), FieldValue::String("hello".into()));
        change.migration_script().apply(&mut fields).unwrap();
        assert_eq!(
            fields.get("title"),
            Some(&FieldValue::String("HELLO".into()))
        );
    }
}
