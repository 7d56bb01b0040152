//! Error types for workflow operations
//!
//! Gate violations are not errors: they are reported through
//! [`Transition`](crate::Transition). Errors here cover misuse of the
//! engine (unknown fields, wrong value kinds, malformed definitions) and
//! failed generations.

use drafter_core::GenerationError;

/// Content block editing failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    /// The sole remaining block cannot be removed
    #[error("at least one content block must remain")]
    LastBlock,

    /// No block carries the given id
    #[error("unknown content block: {0}")]
    UnknownBlock(String),

    /// Operation applies to another block kind
    #[error("content block {0} is not an image block")]
    NotImage(String),

    /// Block ids must be unique within a list
    #[error("duplicate content block id: {0}")]
    DuplicateId(String),

    /// A block list must never be empty
    #[error("content block list is empty")]
    Empty,
}

/// Workflow engine error
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Field is not part of the form
    #[error("unknown form field: {0}")]
    UnknownField(String),

    /// Field holds a different kind of value
    #[error("field `{field}` holds {actual}, expected {expected}")]
    WrongKind {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Content block edit rejected
    #[error("content block edit rejected: {0}")]
    Block(#[from] BlockError),

    /// Workflow definition is malformed
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// No step generates the field
    #[error("no generator for field: {0}")]
    NoGenerator(String),

    /// The form lacks the inputs the generator needs
    #[error("inputs for `{0}` are incomplete")]
    MissingInputs(String),

    /// Machine created outside a Tokio runtime
    #[error("workflow machine requires a tokio runtime")]
    NoRuntime,

    /// Generation job panicked
    #[error("generation panicked: {0}")]
    Panicked(String),

    /// Model-backed generation failed
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
}

impl WorkflowError {
    /// Check if the error is caused by the host rather than the engine
    #[inline]
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownField(_)
                | Self::WrongKind { .. }
                | Self::Block(_)
                | Self::NoGenerator(_)
                | Self::MissingInputs(_)
        )
    }
}
