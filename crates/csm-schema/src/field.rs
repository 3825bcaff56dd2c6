//! Field types, definitions and values
//!
//! A schema version is a list of [`FieldSchema`] definitions; stored content
//! is a [`FieldMap`] of [`FieldValue`]s that must type-check against those
//! definitions. Coercion between field types is a total function over the
//! closed [`FieldType`] set.

use crate::error::FieldError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered map from field key to stored value
///
/// Field order is meaningful (it mirrors the schema's field order in
/// serialized form), hence an insertion-ordered map.
pub type FieldMap = IndexMap<String, FieldValue>;

/// Closed set of field types
///
/// The set is fixed and exhaustively known; migration-script generation and
/// value coercion are total functions over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Plain text
    String,
    /// HTML markup
    Html,
    /// Floating point number
    Number,
    /// Boolean flag
    Boolean,
    /// UTC timestamp
    Date,
    /// Homogeneous list of the inner type
    List(Box<FieldType>),
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Html => write!(f, "html"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::Date => write!(f, "date"),
            Self::List(inner) => write!(f, "list<{inner}>"),
        }
    }
}

/// Definition of one field within a schema version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field key, unique within the schema
    pub key: String,
    /// Declared type
    pub field_type: FieldType,
    /// Whether a value must be present in every container
    pub required: bool,
    /// Optional human-readable label
    pub label: Option<String>,
}

impl FieldSchema {
    /// Create an optional field definition
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            field_type,
            required: false,
            label: None,
        }
    }

    /// Mark the field as required
    #[inline]
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Stored field value, tagged to mirror [`FieldType`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldValue {
    /// Plain text value
    String(String),
    /// HTML value
    Html(String),
    /// Numeric value
    Number(f64),
    /// Boolean value
    Boolean(bool),
    /// Timestamp value
    Date(DateTime<Utc>),
    /// List value
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Short name of the value kind, for diagnostics
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Html(_) => "html",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::Date(_) => "date",
            Self::List(_) => "list",
        }
    }

    /// Check the value against a declared type
    ///
    /// An empty list matches any list type.
    #[must_use]
    pub fn matches(&self, ty: &FieldType) -> bool {
        match (self, ty) {
            (Self::String(_), FieldType::String)
            | (Self::Html(_), FieldType::Html)
            | (Self::Number(_), FieldType::Number)
            | (Self::Boolean(_), FieldType::Boolean)
            | (Self::Date(_), FieldType::Date) => true,
            (Self::List(items), FieldType::List(inner)) => {
                items.iter().all(|item| item.matches(inner))
            }
            _ => false,
        }
    }

    /// Attempt to coerce the value into a target type
    ///
    /// Returns `None` when no lossless conversion exists. The rules are
    /// deterministic: numbers and booleans render to text, text parses back
    /// where the format allows it, string and html convert freely, dates use
    /// RFC 3339 text form, lists coerce element-wise.
    #[must_use]
    pub fn try_coerce(&self, target: &FieldType) -> Option<FieldValue> {
        if self.matches(target) {
            return Some(self.clone());
        }
        match (self, target) {
            (Self::String(s), FieldType::Html) => Some(Self::Html(s.clone())),
            (Self::Html(s), FieldType::String) => Some(Self::String(s.clone())),
            (Self::Number(n), FieldType::String) => Some(Self::String(format_number(*n))),
            (Self::Number(n), FieldType::Html) => Some(Self::Html(format_number(*n))),
            (Self::Boolean(b), FieldType::String) => Some(Self::String(b.to_string())),
            (Self::Date(d), FieldType::String) => Some(Self::String(d.to_rfc3339())),
            (Self::String(s) | Self::Html(s), FieldType::Number) => {
                s.trim().parse::<f64>().ok().map(Self::Number)
            }
            (Self::String(s) | Self::Html(s), FieldType::Boolean) => match s.trim() {
                "true" => Some(Self::Boolean(true)),
                "false" => Some(Self::Boolean(false)),
                _ => None,
            },
            (Self::String(s) | Self::Html(s), FieldType::Date) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| Self::Date(d.with_timezone(&Utc))),
            (Self::List(items), FieldType::List(inner)) => items
                .iter()
                .map(|item| item.try_coerce(inner))
                .collect::<Option<Vec<_>>>()
                .map(Self::List),
            _ => None,
        }
    }

    /// Coerce the value into a target type
    ///
    /// # Errors
    /// Returns [`FieldError::Coercion`] when no conversion exists; `key`
    /// names the field for diagnostics.
    pub fn coerce(&self, key: &str, target: &FieldType) -> Result<FieldValue, FieldError> {
        self.try_coerce(target).ok_or_else(|| FieldError::Coercion {
            key: key.to_string(),
            value_kind: self.kind(),
            target: target.clone(),
        })
    }
}

fn format_number(n: f64) -> String {
    // Render integral floats without the trailing ".0"
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
