use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use offerte_engine::{config, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Logging settings come from the config file when it loads; commands
    // report load errors themselves
    let (log_level, log_format) = match config::load_config(&args.config) {
        Ok(cfg) => (cfg.server.log_level, cfg.server.log_format),
        Err(_) => ("info".to_string(), "text".to_string()),
    };
    init_tracing(&log_level, &log_format);

    match args.get_command() {
        cli::Commands::Start => {
            commands::start::execute(&args.config).await?;
        }
        cli::Commands::Test => {
            commands::test::execute(&args.config).await?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&args.config)?,
            cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
        },
        cli::Commands::Catalog { import } => {
            commands::catalog::execute(&args.config, import).await?;
        }
        cli::Commands::Calculate { input, json } => {
            commands::calculate::execute(&args.config, &input, json).await?;
        }
        cli::Commands::Quotes { action } => match action {
            cli::QuoteCommands::List => commands::quotes::list(&args.config).await?,
            cli::QuoteCommands::Show { quote_number } => {
                commands::quotes::show(&args.config, &quote_number).await?
            }
            cli::QuoteCommands::Delete { quote_number } => {
                commands::quotes::delete(&args.config, &quote_number).await?
            }
        },
        cli::Commands::Version => {
            println!("Offerte engine v{}", env!("CARGO_PKG_VERSION"));
            println!("Rust {}", env!("CARGO_PKG_RUST_VERSION"));
        }
    }

    Ok(())
}
