//! Drafter Server - HTTP boundary of the generation pipeline
//!
//! Serves one streaming endpoint:
//! - Validates the drafting parameters before any model call
//! - Streams model output chunk by chunk as `text/plain`
//! - Reports pre-stream failures as JSON `{ "error": ... }`
//!
//! # Example
//!
//! ```rust,ignore
//! use drafter_server::{GenerationEndpoint, ServerConfig};
//!
//! # async fn example(client: drafter_core::GenerationClient) -> Result<(), warp::Error> {
//! let endpoint = GenerationEndpoint::new(client);
//! let (addr, server) = endpoint.bind(ServerConfig::default().bind, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })?;
//! println!("listening on {addr}");
//! server.await;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod endpoint;

pub use config::{ServerConfig, ServerConfigError, DEFAULT_BIND};
pub use endpoint::{ErrorBody, GenerationEndpoint, BACKGROUND_PATH};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
