mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use storefront_session::config::AppConfig;
use storefront_session::SessionManager;
use tracing_subscriber::EnvFilter;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("storefront_session=debug,info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
            .with_env(|key| std::env::var(key).ok()),
        None => AppConfig::load(),
    };
    tracing::debug!(api = %config.api_base_url, "Using backend");

    let manager = SessionManager::from_config(&config)?;
    manager.bootstrap().await;

    commands::execute(&manager, cli.command).await
}
