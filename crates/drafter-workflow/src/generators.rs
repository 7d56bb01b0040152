//! Field generators
//!
//! A generator snapshots the inputs it needs from the form synchronously
//! and returns a detached job. The job owns its inputs, so it can run on
//! another task while the form keeps changing.

use crate::error::WorkflowError;
use crate::form::{FieldValue, FormState};
use drafter_core::{GenerationClient, GenerationPayload, GenerationRequest, PromptTemplate};
use futures::future::{self, BoxFuture};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Detached generation job
pub type GenerationJob = BoxFuture<'static, Result<FieldValue, WorkflowError>>;

/// Produces the value of one form field
pub trait FieldGenerator: Send + Sync {
    /// Build a job from the current form
    ///
    /// Returns `None` when the form lacks the inputs generation needs.
    fn prepare(&self, form: &FormState) -> Option<GenerationJob>;
}

/// Drafts the background section through the model
#[derive(Debug, Clone)]
pub struct BackgroundGenerator {
    client: GenerationClient,
}

impl BackgroundGenerator {
    /// Create generator
    #[inline]
    #[must_use]
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }
}

impl FieldGenerator for BackgroundGenerator {
    fn prepare(&self, form: &FormState) -> Option<GenerationJob> {
        let payload = GenerationPayload {
            invention_name: Some(form.text(GenerationRequest::INVENTION_NAME).to_string()),
            technical_field: Some(form.text(GenerationRequest::TECHNICAL_FIELD).to_string()),
            existing_problems: Some(form.text(GenerationRequest::EXISTING_PROBLEMS).to_string()),
        };
        let request = GenerationRequest::from_payload(payload).ok()?;
        let client = self.client.clone();

        Some(Box::pin(async move {
            let text = client.invoke(&request).await?;
            Ok(FieldValue::Text(text))
        }))
    }
}

/// Fills a template from the text fields of the form
#[derive(Debug, Clone)]
pub struct TemplateGenerator {
    template: PromptTemplate,
}

impl TemplateGenerator {
    /// Create generator
    #[inline]
    #[must_use]
    pub fn new(template: PromptTemplate) -> Self {
        Self { template }
    }
}

impl FieldGenerator for TemplateGenerator {
    fn prepare(&self, form: &FormState) -> Option<GenerationJob> {
        let fields: BTreeMap<String, String> = form
            .iter()
            .filter_map(|(name, value)| match value {
                FieldValue::Text(text) => Some((name.to_string(), text.clone())),
                _ => None,
            })
            .collect();
        let text = self.template.render(&fields).ok()?;
        Some(Box::pin(future::ready(Ok(FieldValue::Text(text)))))
    }
}

type Compute = dyn Fn(&FormState) -> Option<FieldValue> + Send + Sync;

/// Derives a value synchronously from the form
#[derive(Clone)]
pub struct ComputedGenerator {
    compute: Arc<Compute>,
}

impl ComputedGenerator {
    /// Create generator from a derivation
    #[must_use]
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn(&FormState) -> Option<FieldValue> + Send + Sync + 'static,
    {
        Self {
            compute: Arc::new(compute),
        }
    }
}

impl FieldGenerator for ComputedGenerator {
    fn prepare(&self, form: &FormState) -> Option<GenerationJob> {
        let value = (self.compute)(form)?;
        Some(Box::pin(future::ready(Ok(value))))
    }
}

impl fmt::Debug for ComputedGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedGenerator").finish_non_exhaustive()
    }
}
