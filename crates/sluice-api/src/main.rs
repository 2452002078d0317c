//! Sluice API server
//!
//! Serves agent management endpoints and streams agent answers to clients
//! as they are produced.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sluice_api::{AppState, router};
use sluice_common::ServerConfig;
use sluice_llm::{GenaiEngine, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for the Sluice API server
#[derive(Parser, Debug)]
#[clap(name = "sluice-api", about = "Streaming agent answer server")]
struct Args {
    /// Path to a TOML config file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config)
    #[clap(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[clap(short, long)]
    port: Option<u16>,

    /// Log filter when RUST_LOG is unset (overrides config)
    #[clap(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sluice API server...");
    if config.providers.is_empty() {
        warn!("No model providers configured; every stream will fail provider lookup");
    }
    for provider in &config.providers {
        info!(provider = %provider.provider, api_base = ?provider.api_base, "provider configured");
    }

    let tools = Arc::new(ToolRegistry::with_builtins());
    let engine = Arc::new(GenaiEngine::new(tools.clone()));
    let state = AppState::new(&config, engine, tools)?;
    info!(agents = config.agents.len(), "seed agents loaded");

    let shutdown = state.shutdown.clone();
    let app = router(state, Duration::from_secs(config.request_timeout_secs));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C, cancelling every open stream so connections can drain.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, closing open streams");
    shutdown.cancel();
}
