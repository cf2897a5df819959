use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "offerte", version, about = "Offerte cost calculation engine")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the engine server (default)
    Start,

    /// Test configuration and catalog validity
    Test,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show the configured categories and rates
    Catalog {
        /// Import this catalog TOML file into the database first
        #[arg(long)]
        import: Option<PathBuf>,
    },

    /// Price a quote described by a JSON file
    Calculate {
        /// JSON file with category_entries, overrides, expenses, discount_percent
        input: PathBuf,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stored quote management commands
    Quotes {
        #[command(subcommand)]
        action: QuoteCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display current configuration
    Show,

    /// Validate configuration file
    Validate,
}

#[derive(Subcommand, Debug, Clone)]
pub enum QuoteCommands {
    /// List stored quotes, newest first
    List,

    /// Show the stored prices and totals of a quote
    Show { quote_number: String },

    /// Delete a stored quote
    Delete { quote_number: String },
}

impl Cli {
    /// Get the command to execute, defaulting to Start if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start)
    }
}
