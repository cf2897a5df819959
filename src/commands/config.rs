use anyhow::Result;
use colored::Colorize;
use offerte_engine::config;
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the effective configuration, defaults and environment included
pub fn show(config_path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!("Loading configuration for display");

    let cfg = config::load_config(config_path)?;

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&cfg)?;
    println!("{}", toml_string);

    info!("Configuration displayed successfully");
    Ok(())
}

/// Execute the config validate command
pub fn validate(config_path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!("Validating configuration file");

    let cfg = config::load_config(config_path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  Catalog: {:?} ({})", cfg.catalog.source, cfg.catalog.path);
    println!("  Storage: {:?} ({})", cfg.storage.backend, cfg.storage.database_path);
    println!(
        "  Metrics: {}",
        if cfg.metrics.enabled {
            cfg.metrics.endpoint.as_str()
        } else {
            "disabled"
        }
    );

    info!("Configuration validation successful");
    Ok(())
}
