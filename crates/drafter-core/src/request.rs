//! Generation request types
//!
//! A [`GenerationRequest`] is the validated, immutable form of the wire
//! payload accepted by the generation endpoint.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Substituted when no existing problems were supplied
pub const EXISTING_PROBLEMS_PLACEHOLDER: &str = "（未提供具体问题，请根据通用情况分析）";

/// Unvalidated request payload as received over the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPayload {
    /// Invention name
    #[serde(default)]
    pub invention_name: Option<String>,
    /// Technical field
    #[serde(default)]
    pub technical_field: Option<String>,
    /// Known problems of the prior art
    #[serde(default)]
    pub existing_problems: Option<String>,
}

/// Validated generation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    invention_name: String,
    technical_field: String,
    existing_problems: Option<String>,
}

impl GenerationRequest {
    /// Prompt field name for the invention name
    pub const INVENTION_NAME: &'static str = "inventionName";
    /// Prompt field name for the technical field
    pub const TECHNICAL_FIELD: &'static str = "technicalField";
    /// Prompt field name for the existing problems
    pub const EXISTING_PROBLEMS: &'static str = "existingProblems";

    /// Create request from the two required fields
    ///
    /// # Errors
    /// - `ValidationError::MissingFields` if either value is blank
    pub fn new(
        invention_name: impl Into<String>,
        technical_field: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::from_payload(GenerationPayload {
            invention_name: Some(invention_name.into()),
            technical_field: Some(technical_field.into()),
            existing_problems: None,
        })
    }

    /// Validate a wire payload
    ///
    /// Absent and whitespace-only values are both treated as missing.
    /// A blank `existingProblems` is treated as absent.
    ///
    /// # Errors
    /// - `ValidationError::MissingFields` naming every missing required field
    pub fn from_payload(payload: GenerationPayload) -> Result<Self, ValidationError> {
        let mut missing = Vec::new();

        let invention_name = non_blank(payload.invention_name);
        if invention_name.is_none() {
            missing.push(Self::INVENTION_NAME);
        }
        let technical_field = non_blank(payload.technical_field);
        if technical_field.is_none() {
            missing.push(Self::TECHNICAL_FIELD);
        }

        match (invention_name, technical_field) {
            (Some(invention_name), Some(technical_field)) => Ok(Self {
                invention_name,
                technical_field,
                existing_problems: non_blank(payload.existing_problems),
            }),
            _ => Err(ValidationError::MissingFields(missing)),
        }
    }

    /// With existing problems
    #[inline]
    #[must_use]
    pub fn with_existing_problems(mut self, problems: impl Into<String>) -> Self {
        self.existing_problems = non_blank(Some(problems.into()));
        self
    }

    /// Invention name
    #[inline]
    #[must_use]
    pub fn invention_name(&self) -> &str {
        &self.invention_name
    }

    /// Technical field
    #[inline]
    #[must_use]
    pub fn technical_field(&self) -> &str {
        &self.technical_field
    }

    /// Existing problems, or the generic-analysis placeholder
    #[inline]
    #[must_use]
    pub fn existing_problems(&self) -> &str {
        self.existing_problems
            .as_deref()
            .unwrap_or(EXISTING_PROBLEMS_PLACEHOLDER)
    }

    /// Fields for prompt rendering, keyed by placeholder name
    #[must_use]
    pub fn prompt_fields(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (Self::INVENTION_NAME.to_string(), self.invention_name.clone()),
            (Self::TECHNICAL_FIELD.to_string(), self.technical_field.clone()),
            (
                Self::EXISTING_PROBLEMS.to_string(),
                self.existing_problems().to_string(),
            ),
        ])
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
