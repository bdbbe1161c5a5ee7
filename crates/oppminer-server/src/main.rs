//! oppminer API server binary.
//!
//! Loads configuration, opens the store, and serves the trigger surface.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use oppminer_core::config::Config;
use oppminer_core::error::ConfigError;
use oppminer_core::llm::openai::OpenAiProvider;
use oppminer_core::pipeline::Pacing;
use oppminer_core::store;

use oppminer_server::build_router;
use oppminer_server::state::AppState;

/// oppminer API server: mines post clusters for product opportunities.
#[derive(Parser)]
#[command(name = "oppminer-server", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "~/.oppminer/config.toml")]
    config: String,

    /// Override the configured port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the configured host address.
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config_path = store::expand_tilde(&cli.config);
    let mut config = Config::load(Some(&config_path))?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }

    // A missing API key only blocks jobs, not the read surface; anything
    // else wrong with the config is fatal.
    match config.validate() {
        Ok(()) => {}
        Err(ConfigError::MissingField { ref field }) if field == "llm.api_key" => {
            tracing::warn!("llm.api_key not configured; jobs will fail until it is set");
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(
        db = %config.storage.db_path,
        host = %config.server.host,
        port = config.server.port,
        ideation_model = %config.llm.ideation_model,
        "starting oppminer server"
    );

    let pool = store::init_db(&config.storage.db_path).await?;

    let provider = Arc::new(OpenAiProvider::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
    ));

    let state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        provider,
        pacing: Pacing::default(),
        started_at: Instant::now(),
    });

    let router = build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}
