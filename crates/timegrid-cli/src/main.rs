//! TimeGrid CLI - Command-line host for the offline core
//!
//! Provides commands for:
//! - Queueing writes and draining them to the API
//! - Inspecting the queue, the offline view, and storage usage
//! - Managing the cached session
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use timegrid_core::config::Config;

mod commands;
mod output;
mod runtime;

use commands::{
    config::ConfigCommand, list::ListCommand, queue::QueueCommand, quota::QuotaCommand,
    session::SessionCommand, status::StatusCommand, sync::SyncCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "timegrid", version, about = "Offline-first time tracking client")]
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

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show connectivity, queue, and session status
    Status(StatusCommand),
    /// Inspect or add queued operations
    #[command(subcommand)]
    Queue(QueueCommand),
    /// Drain the queue to the API
    Sync(SyncCommand),
    /// List entities as seen offline (cached plus pending creates)
    List(ListCommand),
    /// Show storage usage of the resolved backend
    Quota(QuotaCommand),
    /// Manage the cached session
    #[command(subcommand)]
    Session(SessionCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn init_tracing(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);
    init_tracing(cli.verbose, &config);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Status(cmd) => cmd.execute(config, format).await,
        Commands::Queue(cmd) => cmd.execute(config, format).await,
        Commands::Sync(cmd) => cmd.execute(config, format).await,
        Commands::List(cmd) => cmd.execute(config, format).await,
        Commands::Quota(cmd) => cmd.execute(config, format).await,
        Commands::Session(cmd) => cmd.execute(config, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, config, format).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use timegrid_core::domain::OperationKind;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_queue_add() {
        let cli = Cli::try_parse_from([
            "timegrid",
            "-vv",
            "queue",
            "add",
            "update",
            "project",
            r#"{"id":"7","name":"Renamed"}"#,
            "--offline",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Queue(QueueCommand::Add {
                kind,
                entity,
                offline,
                ..
            }) => {
                assert_eq!(kind, OperationKind::Update);
                assert_eq!(entity, "project");
                assert!(offline);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_operation_kind() {
        assert!(Cli::try_parse_from(["timegrid", "queue", "add", "upsert", "project", "{}"]).is_err());
    }
}
