//! SourceBridge CLI - Command-line interface for SourceBridge
//!
//! Provides commands for:
//! - Connecting Dropbox and Google Drive accounts
//! - Listing and downloading provider files
//! - Ingesting files into a chat session's knowledge base
//! - Managing configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sourcebridge_core::config::{Config, LoggingConfig};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod notifier;
mod output;

use commands::{
    auth::AuthCommand, completions::CompletionsCommand, config::ConfigCommand,
    files::FilesCommand, ingest::IngestCommand,
};
use context::AppContext;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "sourcebridge",
    version,
    about = "Ingest Dropbox and Google Drive files into chat knowledge bases"
)]
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

    /// Credential profile (overrides auth.profile)
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Connect, disconnect and inspect provider accounts
    #[command(subcommand)]
    Auth(AuthCommand),
    /// List or download provider files
    #[command(subcommand)]
    Files(FilesCommand),
    /// Ingest provider files into a chat session
    Ingest(IngestCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

fn init_tracing(verbose: u8, logging: &LoggingConfig) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    init_tracing(cli.verbose, &config.logging);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = AppContext::new(config, config_path, cli.profile.clone())?;

    match cli.command {
        Commands::Auth(cmd) => cmd.execute(&ctx, format).await,
        Commands::Files(cmd) => cmd.execute(&ctx, format).await,
        Commands::Ingest(cmd) => cmd.execute(&ctx, format).await,
        Commands::Config(cmd) => cmd.execute(&ctx, format).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}
