use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use tapfarm_core::modules::accounts::{AccountSource, SessionDirSource};
use tapfarm_core::modules::proxies::{check_proxy, FileProxySource, ProxyCheck, ProxySource};
use tapfarm_core::modules::session_backup::SessionBackupManager;
use tapfarm_core::modules::update::HttpUpdateChecker;
use tapfarm_core::{HttpAccountClient, Orchestrator};
use tapfarm_types::{ExitSummary, FarmConfig};

use crate::cli::{AccountCommands, ConfigCommands, ProxyCommands};
use crate::server_utils::shutdown_token;
use crate::summary::print_summary;

fn account_source(config: &FarmConfig) -> SessionDirSource {
    SessionDirSource::new(&config.sessions_dir)
        .with_blacklist(config.blacklist())
        .with_reference_id(&config.ref_id)
}

/// Run the farm until every session ends or a shutdown signal arrives.
pub async fn run_farm(config: FarmConfig, json: bool) -> Result<ExitSummary> {
    let client = HttpAccountClient::new(&config.game_api_url, &config.ref_id, config.request_timeout());
    let accounts = account_source(&config);
    let proxies = FileProxySource::new(&config.proxies_file);

    let mut orchestrator = Orchestrator::new(config.clone(), Arc::new(client))
        .with_backups(SessionBackupManager::new(&config.sessions_dir));
    if let (Some(url), Some(_)) = (&config.update_url, config.check_update_interval()) {
        let checker = HttpUpdateChecker::new(url, config.request_timeout())
            .context("Failed to build update checker")?;
        orchestrator = orchestrator.with_update_checker(Arc::new(checker));
    }

    let summary = orchestrator.run_from_sources(&accounts, &proxies, shutdown_token()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(summary)
}

pub fn handle_account_command(cmd: AccountCommands, config: &FarmConfig) -> Result<()> {
    match cmd {
        AccountCommands::List { json } => list_accounts(config, json),
    }
}

fn list_accounts(config: &FarmConfig, json: bool) -> Result<()> {
    let accounts = account_source(config).load_accounts()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
        return Ok(());
    }

    if accounts.is_empty() {
        println!("{}", "No session files found.".yellow());
        return Ok(());
    }

    let backups = SessionBackupManager::new(&config.sessions_dir);
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Account", "Session file", "Backup", "Status"]);

    for acc in &accounts {
        let status = if acc.blacklisted {
            Cell::new("Blacklisted").fg(Color::Red)
        } else {
            Cell::new("Active").fg(Color::Green)
        };
        table.add_row(vec![
            Cell::new(&acc.id),
            Cell::new(acc.credential.display()),
            Cell::new(if backups.backup_exists(&acc.id) { "yes" } else { "no" }),
            status,
        ]);
    }

    println!("{table}");
    let active = accounts.iter().filter(|a| !a.blacklisted).count();
    println!("\n{} accounts total, {} active", accounts.len(), active);
    Ok(())
}

pub async fn handle_proxy_command(cmd: ProxyCommands, config: &FarmConfig) -> Result<()> {
    match cmd {
        ProxyCommands::Check { json, probe_url, timeout } => {
            check_proxies(config, json, &probe_url, Duration::from_secs(timeout)).await
        },
    }
}

async fn check_proxies(config: &FarmConfig, json: bool, probe_url: &str, timeout: Duration) -> Result<()> {
    let proxies = FileProxySource::new(&config.proxies_file).load_proxies()?;
    if proxies.is_empty() {
        println!("{}", "No proxies configured.".yellow());
        return Ok(());
    }

    let mut set = JoinSet::new();
    for (index, endpoint) in proxies.into_iter().enumerate() {
        let probe_url = probe_url.to_string();
        set.spawn(async move { (index, check_proxy(&endpoint, &probe_url, timeout).await) });
    }
    let mut checks: Vec<(usize, ProxyCheck)> = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        checks.push(joined.context("Proxy probe task failed")?);
    }
    checks.sort_by_key(|(index, _)| *index);
    let checks: Vec<ProxyCheck> = checks.into_iter().map(|(_, check)| check).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&checks)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Proxy", "Status", "Latency", "Error"]);
    for check in &checks {
        let status = if check.reachable {
            Cell::new("OK").fg(Color::Green)
        } else {
            Cell::new("FAIL").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(&check.endpoint),
            status,
            Cell::new(check.latency_ms.map_or_else(|| "-".to_string(), |ms| format!("{ms} ms"))),
            Cell::new(check.error.as_deref().unwrap_or("")),
        ]);
    }

    println!("{table}");
    let alive = checks.iter().filter(|c| c.reachable).count();
    println!("\n{}/{} proxies reachable", alive, checks.len());
    Ok(())
}

pub fn handle_config_command(cmd: ConfigCommands, config: &FarmConfig) -> Result<()> {
    match cmd {
        ConfigCommands::Show { json } => show_config(config, json),
    }
}

fn show_config(config: &FarmConfig, json: bool) -> Result<()> {
    let redacted = config.redacted();
    if json {
        println!("{}", serde_json::to_string_pretty(&redacted)?);
        return Ok(());
    }

    println!("{}", "Configuration:".cyan().bold());
    if let serde_json::Value::Object(map) = serde_json::to_value(&redacted)? {
        for (key, value) in map {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => "-".to_string(),
                other => other.to_string(),
            };
            println!("  {} = {}", key.to_uppercase(), value);
        }
    }
    Ok(())
}

pub fn handle_backup(config: &FarmConfig) -> Result<()> {
    let manager = SessionBackupManager::new(&config.sessions_dir);
    let count = manager.create_all_backups()?;
    println!(
        "{} {} session files backed up to {}",
        "✓".green(),
        count,
        manager.backup_dir().display()
    );
    Ok(())
}
