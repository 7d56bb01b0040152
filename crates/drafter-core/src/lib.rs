//! Drafter Core - streaming text generation for patent drafting
//!
//! The generation pipeline:
//! - Validates structured drafting parameters ([`GenerationRequest`])
//! - Renders them into a prompt ([`PromptTemplate`])
//! - Invokes a chat model in streaming mode ([`ChatModel`])
//! - Owns retry and timeout policy around the model call ([`GenerationClient`])
//!
//! # Example
//!
//! ```rust,ignore
//! use drafter_core::{GenerationClient, GenerationConfig, GenerationRequest, OpenAiChatModel, ProviderConfig};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let model = OpenAiChatModel::new(ProviderConfig::new("https://api.example.com/v1", "key"))?;
//! let client = GenerationClient::new(Arc::new(model), GenerationConfig::new("gpt-4o-mini"))?;
//!
//! let request = GenerationRequest::new("一种数据存证方法", "区块链技术")?;
//! let mut chunks = client.stream(&request).await?;
//! while let Some(chunk) = chunks.next().await {
//!     print!("{}", chunk?);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod openai;
pub mod prompt;
pub mod request;

pub use client::{GenerationClient, GenerationStream};
pub use config::{GenerationConfig, ProviderConfig};
pub use error::{ConfigError, GenerationError, MissingFieldError, ModelError, ValidationError};
pub use model::{ChatModel, ChunkStream, ModelRequest};
pub use openai::{OpenAiChatModel, SseDecoder, SseEvent};
pub use prompt::{background_template, render, PromptTemplate, BACKGROUND_TEMPLATE};
pub use request::{GenerationPayload, GenerationRequest, EXISTING_PROBLEMS_PLACEHOLDER};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the generation pipeline
    pub use crate::{
        ChatModel, GenerationClient, GenerationConfig, GenerationError, GenerationRequest,
        GenerationStream, PromptTemplate,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
