//! dbupdates CLI - apply change-event files to the configured stores

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dbupdates::DbUpdatesConfig;
use std::path::PathBuf;
use std::sync::Arc;

mod commands;

#[derive(Parser)]
#[command(name = "dbupdates")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "./dbupdates.json")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered processors and the configured namespaces
    Processors,

    /// Apply a JSON-lines file of change events through the dispatcher
    Apply {
        /// One record per line: {"namespace", "key", "partition", "position", "payload"}
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the current state of a room
    RoomState {
        #[arg(short, long)]
        room: String,

        /// Sync API database to read from
        #[arg(short, long, default_value = "syncapi")]
        database: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = DbUpdatesConfig::from_json_file(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    let config = Arc::new(config);

    match cli.command {
        Commands::Processors => commands::processors::execute(config)?,
        Commands::Apply { input } => commands::apply::execute(config, input)?,
        Commands::RoomState { room, database } => {
            commands::room_state::execute(config, &database, &room)?
        }
    }

    Ok(())
}
