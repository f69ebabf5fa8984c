//! tapfarm - Headless Daemon
//!
//! Runs one session per account found in `SESSIONS_DIR`, spread over the
//! proxies in `PROXIES_FILE`, until Ctrl+C / SIGTERM or an update restart.
//! Configuration comes from `.env` and the process environment.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;

mod cli;
mod commands;
mod server_utils;
mod summary;

use cli::{Cli, Commands};
use tapfarm_core::modules::config::load_config_from;
use tapfarm_core::modules::logger::{init_logging, WorkerGuard};
use tapfarm_types::FarmConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config_from(&cli.env_file, None).context("Failed to load configuration")?;
    let log_guard = init_logging(config.debug_logging, Path::new(&config.log_dir))?;

    match cli.command {
        None => run(config, false, log_guard).await,
        Some(Commands::Run { json }) => run(config, json, log_guard).await,
        Some(Commands::Accounts(cmd)) => commands::handle_account_command(cmd, &config),
        Some(Commands::Proxies(cmd)) => commands::handle_proxy_command(cmd, &config).await,
        Some(Commands::Config(cmd)) => commands::handle_config_command(cmd, &config),
        Some(Commands::Backup) => commands::handle_backup(&config),
    }
}

async fn run(config: FarmConfig, json: bool, log_guard: WorkerGuard) -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tapfarm starting");
    let summary = commands::run_farm(config, json).await?;

    if summary.restart_requested {
        drop(log_guard);
        server_utils::restart_process()?;
    }
    Ok(())
}
