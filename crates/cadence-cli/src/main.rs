//! Cadence CLI - segmented focus timers and notes from the terminal

mod app;
mod cli;
mod commands;
mod config;
mod error;


use std::env;
use std::sync::Arc;

use cadence_core::alert::{LogAlert, SharedAlert};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::cli::{Cli, Commands, TimerCommands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::note::run_note;
use crate::commands::stats::run_stats;
use crate::commands::sync::run_sync;
use crate::commands::timer::{run_timer, TerminalBell};
use crate::config::{resolve_db_path, CliConfig, ENV_DB_PATH};
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "cadence=info,cadence_core=warn";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();

    // Commands that never touch the database
    let command = match cli.command {
        Some(Commands::Completions { shell, output }) => {
            return run_completions(shell, output.as_deref());
        }
        Some(command) => command,
        None => Commands::Timer {
            command: TimerCommands::List {
                all: false,
                json: false,
            },
        },
    };

    let config = CliConfig::load()?.with_overrides(|key| env::var(key).ok())?;
    let command = match command {
        Commands::Config { command } => return run_config(command, &config),
        other => other,
    };

    let db_path = resolve_db_path(cli.db_path, env::var(ENV_DB_PATH).ok())?;
    let alert: SharedAlert = match &command {
        Commands::Timer {
            command: TimerCommands::Run { quiet: false, .. },
        } => Arc::new(TerminalBell),
        _ => Arc::new(LogAlert),
    };
    let app = App::open(&db_path, &config, alert)?;

    match command {
        Commands::Timer { command } => run_timer(command, &app).await,
        Commands::Note { command } => run_note(command, &app).await,
        Commands::Stats { json } => run_stats(&app, json),
        Commands::Sync => run_sync(&app).await,
        Commands::Auth { command } => run_auth(command, &config, &app).await,
        Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
    }
}
