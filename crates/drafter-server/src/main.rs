//! `drafter-server` binary
//!
//! Reads an optional TOML config, applies flag and environment overrides,
//! and serves the generation endpoint until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use drafter_core::{GenerationClient, OpenAiChatModel};
use drafter_server::{GenerationEndpoint, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "drafter-server", version, about = "Streaming patent background generation server")]
struct Cli {
    /// TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(long, env = "DRAFTER_BIND")]
    bind: Option<SocketAddr>,

    /// Chat model identifier
    #[arg(long, env = "OPENAI_CHAT_MODEL")]
    model: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn server_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(model) = &self.model {
            config.generation.model.clone_from(model);
        }
        if let Some(base_url) = &self.base_url {
            config.provider.base_url.clone_from(base_url);
        }
        if let Some(api_key) = &self.api_key {
            config.provider.api_key.clone_from(api_key);
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = cli.server_config()?;
    let model = OpenAiChatModel::new(config.provider.clone()).context("creating model client")?;
    let client = GenerationClient::new(Arc::new(model), config.generation.clone())
        .context("creating generation client")?;

    let endpoint = GenerationEndpoint::new(client);
    let (addr, server) = endpoint
        .bind(config.bind, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .with_context(|| format!("binding {}", config.bind))?;

    info!(%addr, model = %config.generation.model, "Drafter server listening");
    server.await;
    info!("Drafter server stopped");
    Ok(())
}
