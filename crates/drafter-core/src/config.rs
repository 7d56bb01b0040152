//! Generation configuration
//!
//! Configuration is fixed at client construction and never read from the
//! process environment here; binaries resolve it and pass it in.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Model call policy for a [`GenerationClient`](crate::GenerationClient)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Target model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum wait for data from a single model call, in milliseconds
    pub timeout_ms: u64,
    /// Automatic retries of the initial connection attempt
    pub max_retries: u32,
    /// Base delay between attempts, multiplied by the attempt number
    pub retry_backoff_ms: u64,
    /// Ask the model to stream partial output
    pub streaming: bool,
}

impl GenerationConfig {
    /// Create configuration for a model with default policy
    #[inline]
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// With temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With max retries
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// With retry backoff
    #[inline]
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With streaming flag
    #[inline]
    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before the given retry attempt (1-based)
    #[inline]
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }

    /// Total attempts allowed for the initial connection
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Check configuration consistency
    ///
    /// # Errors
    /// - `ConfigError::MissingModel` if the model identifier is blank
    /// - `ConfigError::Temperature` if temperature is outside `0.0..=2.0`
    /// - `ConfigError::ZeroTimeout` if the timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingModel);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Temperature(self.temperature.to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.4,
            timeout_ms: 120_000,
            max_retries: 3,
            retry_backoff_ms: 1_000,
            streaming: true,
        }
    }
}

/// Connection settings for an OpenAI-compatible provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
}

impl ProviderConfig {
    /// Create provider configuration
    #[inline]
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Chat completions endpoint URL
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new("https://api.openai.com/v1", "")
    }
}

// The API key stays out of logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
