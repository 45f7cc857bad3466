//! apilimits CLI - check and watch API rate limits
//!
//! A command-line front end for the limit fetcher, the persisted quota cache
//! and the refresh scheduler.

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use apilimits_core::LimitsConfig;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "apilimits")]
#[command(author, version, about = "Check and watch API rate limits", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Override database path (or set APILIMITS_DB_PATH env var)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// API key sent as the bearer token
    #[arg(long, env = "APILIMITS_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Override the quota-check endpoint (or set APILIMITS_ENDPOINT env var)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the limits once and report them
    Check,

    /// Show the last known limits
    Status,

    /// Keep the limits fresh and print every change
    Watch(commands::watch::WatchArgs),

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = LimitsConfig::from_env()?;
    if let Some(db_path) = &cli.db {
        config.db_path = Some(db_path.clone());
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint_url = endpoint.clone();
        config = config.validate()?;
    }

    // Create context for commands
    let ctx = commands::Context {
        config,
        format: cli.format,
        quiet: cli.quiet,
        token: cli.token.filter(|t| !t.is_empty()),
        overrides: commands::Overrides {
            db: cli.db.is_some(),
            endpoint: cli.endpoint.is_some(),
        },
    };

    // Execute command
    match cli.command {
        Commands::Check => commands::check::execute(&ctx).await,
        Commands::Status => commands::status::execute(&ctx).await,
        Commands::Watch(args) => commands::watch::execute(&ctx, args).await,
        Commands::Config { action } => commands::config::execute(&ctx, action).await,
    }
}
