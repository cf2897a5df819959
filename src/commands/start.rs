use anyhow::Result;
use colored::Colorize;
use offerte_engine::{config, server};
use std::path::Path;
use tracing::info;

/// Execute the start command
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting Offerte engine...".green());

    let cfg = config::load_config(config_path)?;
    info!("Configuration loaded from {}", config_path.display());

    server::start_server(cfg).await
}
