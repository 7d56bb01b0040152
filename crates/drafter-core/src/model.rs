//! Chat model abstraction
//!
//! A [`ChatModel`] opens one call against a language model and yields its
//! output as text chunks. Retry and timeout policy live in
//! [`GenerationClient`](crate::GenerationClient), not here.

use crate::error::ModelError;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Text chunks from a single model call
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

/// One model invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Target model identifier
    pub model: String,
    /// Rendered prompt, sent as a single user message
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Ask for incremental output
    pub stream: bool,
}

impl ModelRequest {
    /// Create request
    #[inline]
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: 0.4,
            stream: true,
        }
    }

    /// With temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// With streaming flag
    #[inline]
    #[must_use]
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Chat model backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Open a call and return its output stream
    ///
    /// Resolves once the call is established; output arrives through the
    /// returned stream. A backend asked for non-streaming output yields the
    /// whole answer as one chunk.
    ///
    /// # Errors
    /// - `ModelError` if the call could not be established
    async fn open(&self, request: &ModelRequest) -> Result<ChunkStream, ModelError>;
}
