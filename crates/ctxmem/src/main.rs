//! ctxmem - Tiered Agent Memory CLI
//!
//! Drives the memory orchestrator from the terminal: append turns, cache
//! document context, consolidate, and render the budgeted prompt context.

use anyhow::{Context, Result};
use clap::Parser;
use ctxmem_sdk::{SDK, SDKConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout carries command output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("ctxmem=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(SDKConfig::config_path);
    let config = SDKConfig::load_from(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::debug!(path = %config_path.display(), "Loaded configuration");

    // Config commands never touch the stores
    if let Commands::Config(cmd) = cli.command {
        return commands::config::execute(cmd, &config, &config_path);
    }

    let sdk = SDK::new(config).context("Failed to initialize memory stores")?;
    let result = commands::execute(cli.command, &sdk, cli.json).await;

    // Let background consolidation finish before the runtime goes away
    sdk.shutdown().await;
    result
}
