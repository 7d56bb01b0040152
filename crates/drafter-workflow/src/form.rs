//! Form state
//!
//! The accumulated field values of one wizard instance. Fields are declared
//! up front; a field keeps the kind of value it was declared with.

use crate::blocks::ContentBlocks;
use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured list item, such as a keyword definition or a cited document
pub type Record = BTreeMap<String, String>;

/// Build a record from key/value pairs
#[must_use]
pub fn record<const N: usize>(pairs: [(&str, &str); N]) -> Record {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Value of one form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    List(Vec<String>),
    Records(Vec<Record>),
    Blocks(ContentBlocks),
}

impl FieldValue {
    /// Empty text value
    #[inline]
    #[must_use]
    pub fn empty_text() -> Self {
        Self::Text(String::new())
    }

    /// Kind name, for diagnostics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Flag(_) => "flag",
            Self::List(_) => "list",
            Self::Records(_) => "records",
            Self::Blocks(_) => "blocks",
        }
    }

    /// Check if the value carries no content
    ///
    /// Blank text, empty lists and block lists without text are empty.
    /// Flags are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Flag(_) => false,
            Self::List(items) => items.is_empty(),
            Self::Records(items) => items.is_empty(),
            Self::Blocks(blocks) => !blocks.has_text(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<bool> for FieldValue {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

impl From<ContentBlocks> for FieldValue {
    fn from(blocks: ContentBlocks) -> Self {
        Self::Blocks(blocks)
    }
}

/// Field name to value map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormState {
    fields: BTreeMap<String, FieldValue>,
}

impl FormState {
    /// Create empty form
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With declared field
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Value of a field
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Check if a field is declared
    #[inline]
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Text of a field, empty when absent or not text
    #[must_use]
    pub fn text(&self, field: &str) -> &str {
        match self.fields.get(field) {
            Some(FieldValue::Text(text)) => text,
            _ => "",
        }
    }

    /// Flag of a field, false when absent or not a flag
    #[must_use]
    pub fn flag(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(FieldValue::Flag(true)))
    }

    /// Items of a list field
    #[must_use]
    pub fn list(&self, field: &str) -> &[String] {
        match self.fields.get(field) {
            Some(FieldValue::List(items)) => items,
            _ => &[],
        }
    }

    /// Items of a records field
    #[must_use]
    pub fn records(&self, field: &str) -> &[Record] {
        match self.fields.get(field) {
            Some(FieldValue::Records(items)) => items,
            _ => &[],
        }
    }

    /// Content blocks of a blocks field
    #[must_use]
    pub fn blocks(&self, field: &str) -> Option<&ContentBlocks> {
        match self.fields.get(field) {
            Some(FieldValue::Blocks(blocks)) => Some(blocks),
            _ => None,
        }
    }

    /// Check if a field is absent or carries no content
    #[must_use]
    pub fn is_empty(&self, field: &str) -> bool {
        self.fields.get(field).map_or(true, FieldValue::is_empty)
    }

    /// Replace the value of a declared field
    ///
    /// # Errors
    /// - `WorkflowError::UnknownField` if the field is not declared
    /// - `WorkflowError::WrongKind` if the value kind differs
    pub fn set(&mut self, field: &str, value: FieldValue) -> Result<(), WorkflowError> {
        let slot = self.slot(field)?;
        if slot.kind() != value.kind() {
            return Err(WorkflowError::WrongKind {
                field: field.to_string(),
                expected: slot.kind(),
                actual: value.kind(),
            });
        }
        *slot = value;
        Ok(())
    }

    /// Mutable access to a declared field
    ///
    /// # Errors
    /// - `WorkflowError::UnknownField` if the field is not declared
    pub(crate) fn slot(&mut self, field: &str) -> Result<&mut FieldValue, WorkflowError> {
        self.fields
            .get_mut(field)
            .ok_or_else(|| WorkflowError::UnknownField(field.to_string()))
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}
