//! Error types for the generation pipeline
//!
//! Provides error handling for:
//! - Request validation (caller-visible, never retried)
//! - Prompt rendering (configuration faults)
//! - Model calls (transport, upstream status, payload decoding)
//! - Generation as a whole (timeouts, exhausted retries, interrupted streams)

use std::time::Duration;

/// Request validation failure
///
/// Raised before any model call is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// One or more required fields are absent or blank
    #[error("missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

impl ValidationError {
    /// Names of the offending fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[&'static str] {
        match self {
            Self::MissingFields(fields) => fields,
        }
    }
}

/// A template placeholder had no corresponding field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("template placeholder `{placeholder}` has no value")]
pub struct MissingFieldError {
    /// Name of the unresolved placeholder
    pub placeholder: String,
}

impl MissingFieldError {
    /// Create error for placeholder
    #[inline]
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
        }
    }
}

/// Invalid configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Model identifier is empty
    #[error("model identifier must not be empty")]
    MissingModel,

    /// Temperature outside the accepted range
    #[error("temperature {0} is outside 0.0..=2.0")]
    Temperature(String),

    /// Timeout of zero
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,

    /// HTTP client could not be built
    #[error("http client construction failed: {0}")]
    HttpClient(String),
}

/// Failure of a single underlying model call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Connection, TLS or I/O failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream answered with a non-success status
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Upstream payload could not be decoded
    #[error("malformed upstream payload: {0}")]
    Decode(String),
}

impl ModelError {
    /// Check if a fresh attempt may succeed
    ///
    /// Transport faults, request timeouts, conflicts, rate limiting and
    /// server errors are transient. Other client errors and undecodable
    /// payloads are not.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => matches!(status, 408 | 409 | 429 | 500..=599),
            Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Generation failure as seen by callers of the client
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Prompt could not be rendered
    #[error("prompt rendering failed: {0}")]
    Prompt(#[from] MissingFieldError),

    /// No data arrived within the request timeout on any attempt
    #[error("no data from model within {after:?} ({attempts} attempt(s))")]
    Timeout { after: Duration, attempts: u32 },

    /// The model call failed before producing output
    #[error("model call failed after {attempts} attempt(s): {source}")]
    Upstream {
        attempts: u32,
        #[source]
        source: ModelError,
    },

    /// The model failed after output had been produced
    #[error("stream interrupted after {chunks} chunk(s): {source}")]
    Interrupted {
        chunks: usize,
        #[source]
        source: ModelError,
    },

    /// The model stopped sending data after output had been produced
    #[error("stream stalled after {chunks} chunk(s): no data within {after:?}")]
    Stalled { chunks: usize, after: Duration },
}

impl GenerationError {
    /// Check if the failure happened after output was produced
    ///
    /// Such failures are terminal for the request: partial output cannot
    /// be taken back.
    #[inline]
    #[must_use]
    pub fn is_mid_stream(&self) -> bool {
        matches!(self, Self::Interrupted { .. } | Self::Stalled { .. })
    }

    /// Underlying model error, if any
    #[inline]
    #[must_use]
    pub fn model_error(&self) -> Option<&ModelError> {
        match self {
            Self::Upstream { source, .. } | Self::Interrupted { source, .. } => Some(source),
            _ => None,
        }
    }
}
