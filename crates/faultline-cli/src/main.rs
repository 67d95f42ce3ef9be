//! Faultline CLI - Command-line interface for Faultline
//!
//! Provides commands for:
//! - Sending a report to the configured endpoint
//! - Inspecting, flushing and pruning the offline queue
//! - Viewing, validating and creating the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use faultline_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    completions::CompletionsCommand, config::ConfigCommand, queue::QueueCommand,
    send::SendCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "faultline", version, about = "Crash and error report delivery")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Send a report
    Send(SendCommand),
    /// Inspect and manage the offline queue
    #[command(subcommand)]
    Queue(QueueCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Log level from `-v`, falling back to the configured level.
fn log_level(verbose: u8, config_path: &std::path::Path) -> String {
    match verbose {
        0 => Config::load_or_default(config_path).logging.level,
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    // Logs go to stderr so JSON output stays parseable
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(cli.verbose, &config_path)));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Send(cmd) => cmd.execute(&config_path, format).await,
        Commands::Queue(cmd) => cmd.execute(&config_path, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}
