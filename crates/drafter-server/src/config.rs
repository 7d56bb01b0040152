//! Server configuration
//!
//! Loaded from an optional TOML file. The binary applies command-line and
//! environment overrides on top.

use drafter_core::{ConfigError, GenerationConfig, ProviderConfig};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Default listen address
pub const DEFAULT_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000);

/// Server configuration error
#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Generation settings are invalid
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Top-level server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Model call policy
    pub generation: GenerationConfig,
    /// OpenAI-compatible backend
    pub provider: ProviderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            generation: GenerationConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse from TOML text
    ///
    /// # Errors
    /// - `ServerConfigError::Parse` on malformed TOML or unknown value types
    pub fn from_toml(text: &str) -> Result<Self, ServerConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// - `ServerConfigError::Read` if the file cannot be read
    /// - `ServerConfigError::Parse` if it does not parse
    pub fn load(path: &Path) -> Result<Self, ServerConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ServerConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// With listen address
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// With generation settings
    #[must_use]
    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// With backend settings
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    /// Validate generation settings
    ///
    /// # Errors
    /// - `ServerConfigError::Invalid` as for [`GenerationConfig::validate`]
    pub fn validate(&self) -> Result<(), ServerConfigError> {
        self.generation.validate()?;
        Ok(())
    }
}
