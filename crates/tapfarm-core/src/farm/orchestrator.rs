//! Orchestrator: builds the pool and registry, runs every session, and
//! produces the exit summary.
//!
//! ```text
//! load ─▶ ProxyPool + SessionRegistry ─▶ spawn runners (JoinSet)
//!                                              │
//!          shutdown / update ─▶ cancel ────────┤
//!                                              ▼
//!                       drain ─▶ grace expired? abort stragglers
//!                                              │
//!                                              ▼
//!                            housekeeping ─▶ ExitSummary
//! ```

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tapfarm_types::{
    Account, AccountSummary, ExitSummary, FarmConfig, ProxyEndpoint, SessionEndReason,
    SessionState, StatsEvent,
};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::proxy_pool::ProxyPool;
use super::registry::SessionRegistry;
use super::runner::{RunnerContext, RunnerSettings, RunnerStatus, SessionOutcome, SessionRunner};
use super::stats::StatsAggregator;
use crate::client::AccountClient;
use crate::error::AppResult;
use crate::modules::accounts::AccountSource;
use crate::modules::proxies::ProxySource;
use crate::modules::session_backup::SessionBackupManager;
use crate::modules::update::{check_for_update, UpdateChecker, CURRENT_VERSION};

/// Runs all sessions of one farm invocation.
pub struct Orchestrator {
    config: FarmConfig,
    client: Arc<dyn AccountClient>,
    update_checker: Option<Arc<dyn UpdateChecker>>,
    backups: Option<SessionBackupManager>,
    stats: Arc<StatsAggregator>,
}

struct Spawned {
    account_id: String,
    status: watch::Receiver<RunnerStatus>,
}

impl Orchestrator {
    pub fn new(config: FarmConfig, client: Arc<dyn AccountClient>) -> Self {
        Self {
            config,
            client,
            update_checker: None,
            backups: None,
            stats: Arc::new(StatsAggregator::new()),
        }
    }

    /// Poll `checker` every `CHECK_UPDATE_INTERVAL` while sessions run.
    #[must_use]
    pub fn with_update_checker(mut self, checker: Arc<dyn UpdateChecker>) -> Self {
        self.update_checker = Some(checker);
        self
    }

    /// Enable session backups and invalid-session housekeeping.
    #[must_use]
    pub fn with_backups(mut self, backups: SessionBackupManager) -> Self {
        self.backups = Some(backups);
        self
    }

    pub fn config(&self) -> &FarmConfig {
        &self.config
    }

    /// Live statistics, readable while [`Orchestrator::run`] is in progress.
    pub fn stats(&self) -> Arc<StatsAggregator> {
        Arc::clone(&self.stats)
    }

    /// Load accounts and proxies from their sources, then [`Orchestrator::run`].
    pub async fn run_from_sources(
        &self,
        accounts: &dyn AccountSource,
        proxies: &dyn ProxySource,
        shutdown: CancellationToken,
    ) -> AppResult<ExitSummary> {
        let accounts = accounts.load_accounts()?;
        let proxies = if self.config.use_proxy { proxies.load_proxies()? } else { Vec::new() };
        self.run(accounts, proxies, shutdown).await
    }

    /// Run every eligible account until all sessions end or `shutdown` fires.
    ///
    /// Only configuration errors abort the run; per-account failures end up
    /// in the summary.
    pub async fn run(
        &self,
        accounts: Vec<Account>,
        proxies: Vec<ProxyEndpoint>,
        shutdown: CancellationToken,
    ) -> AppResult<ExitSummary> {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("run", run_id = %run_id);
        self.run_inner(run_id, accounts, proxies, shutdown).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: String,
        accounts: Vec<Account>,
        proxies: Vec<ProxyEndpoint>,
        shutdown: CancellationToken,
    ) -> AppResult<ExitSummary> {
        let started_at = Utc::now();
        let order: Vec<String> = accounts.iter().map(|a| a.id.clone()).collect();

        let endpoints = if self.config.use_proxy { proxies } else { Vec::new() };
        let pool = Arc::new(ProxyPool::new(endpoints, self.config.sessions_per_proxy)?);
        let registry =
            SessionRegistry::build(accounts, &pool, &self.config.blacklist(), self.config.use_proxy);

        if self.config.auto_backup_sessions {
            if let Some(backups) = &self.backups {
                if let Err(e) = backups.create_all_backups() {
                    tracing::error!("Session backup failed: {}", e);
                }
            }
        }

        let (entries, blacklisted) = registry.into_parts();
        let total = entries.len();
        tracing::info!(
            sessions = total,
            proxies = pool.len(),
            sessions_per_proxy = pool.capacity(),
            "Farm starting"
        );

        let cancel = shutdown.child_token();
        let ctx = RunnerContext {
            pool: Arc::clone(&pool),
            client: Arc::clone(&self.client),
            stats: Arc::clone(&self.stats),
            settings: RunnerSettings::from_config(&self.config),
            cancel: cancel.clone(),
        };

        let mut set = JoinSet::new();
        let mut spawned = Vec::with_capacity(total);
        for entry in entries {
            let runner = SessionRunner::new(entry, total, ctx.clone());
            let account_id = runner.account_id().to_string();
            let span = tracing::info_span!("session", account = %account_id);
            spawned.push(Spawned { account_id, status: runner.subscribe() });
            set.spawn(runner.run().instrument(span));
        }

        let restart_requested = Arc::new(AtomicBool::new(false));
        let watcher = self.spawn_update_watcher(&cancel, &restart_requested);

        let mut outcomes = HashMap::with_capacity(total);
        tokio::select! {
            () = drain(&mut set, &mut outcomes) => {},
            () = cancel.cancelled() => {},
        }

        if !set.is_empty() {
            let grace = self.config.shutdown_grace_period();
            tracing::info!(
                remaining = set.len(),
                grace_secs = grace.as_secs(),
                "Shutting down sessions"
            );
            if tokio::time::timeout(grace, drain(&mut set, &mut outcomes)).await.is_err() {
                tracing::warn!(remaining = set.len(), "Grace period expired, aborting sessions");
                set.abort_all();
                drain(&mut set, &mut outcomes).await;
            }
        }

        if let Some(watcher) = watcher {
            watcher.abort();
        }

        for runner in &spawned {
            if !outcomes.contains_key(&runner.account_id) {
                let outcome = self.reap(runner, &pool, cancel.is_cancelled());
                outcomes.insert(outcome.account_id.clone(), outcome);
            }
        }

        self.housekeeping(outcomes.values());

        let summary = build_summary(
            run_id,
            started_at,
            &order,
            &outcomes,
            &blacklisted,
            &self.stats,
            restart_requested.load(Ordering::SeqCst),
        );
        tracing::info!(
            accounts = summary.accounts.len(),
            stopped = summary.count_in(SessionState::Stopped),
            failed = summary.count_in(SessionState::Failed),
            pending = summary.count_in(SessionState::Pending),
            restart = summary.restart_requested,
            "Farm finished"
        );
        Ok(summary)
    }

    /// Account for a runner that never returned: release whatever proxy it
    /// last held and close its stats.
    fn reap(&self, runner: &Spawned, pool: &ProxyPool, cancelled: bool) -> SessionOutcome {
        let status = runner.status.borrow().clone();
        if let Some(lease) = &status.proxy {
            pool.release(lease.id, &runner.account_id);
        }

        let reason = if cancelled {
            SessionEndReason::ShutdownForced
        } else {
            SessionEndReason::RepeatedErrors("session task panicked".to_string())
        };
        tracing::warn!(account = %runner.account_id, reason = %reason, "Session reaped");
        self.stats.record(&runner.account_id, StatsEvent::SessionEnded(reason.clone()));

        SessionOutcome {
            account_id: runner.account_id.clone(),
            final_state: reason.final_state(),
            proxy: status.proxy.map(|lease| lease.endpoint),
            reason,
            cycles: self.stats.get(&runner.account_id).map_or(0, |r| r.cycles_completed),
        }
    }

    fn spawn_update_watcher(
        &self,
        cancel: &CancellationToken,
        restart_requested: &Arc<AtomicBool>,
    ) -> Option<tokio::task::JoinHandle<()>> {
        let interval = self.config.check_update_interval()?;
        let checker = self.update_checker.clone()?;
        let auto_update = self.config.auto_update;
        let cancel = cancel.clone();
        let restart_requested = Arc::clone(restart_requested);

        let task = async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(interval) => {},
                    () = cancel.cancelled() => return,
                }

                match check_for_update(checker.as_ref(), CURRENT_VERSION).await {
                    Ok(Some(version)) if auto_update => {
                        tracing::info!(current = CURRENT_VERSION, latest = %version, "Update available, restarting");
                        restart_requested.store(true, Ordering::SeqCst);
                        cancel.cancel();
                        return;
                    },
                    Ok(Some(version)) => {
                        tracing::info!(current = CURRENT_VERSION, latest = %version, "Update available");
                    },
                    Ok(None) => tracing::debug!("No update available"),
                    Err(e) => tracing::warn!("Update check failed: {}", e),
                }
            }
        };
        Some(tokio::spawn(task.instrument(tracing::info_span!("update_watcher"))))
    }

    /// Restore or quarantine credentials the server rejected.
    fn housekeeping<'a>(&self, outcomes: impl Iterator<Item = &'a SessionOutcome>) {
        let Some(backups) = &self.backups else {
            return;
        };

        for outcome in outcomes {
            if !matches!(outcome.reason, SessionEndReason::AuthRejected(_)) {
                continue;
            }
            let name = outcome.account_id.as_str();

            if self.config.auto_restore_invalid_sessions && backups.backup_exists(name) {
                if let Err(e) = backups.restore_from_backup(name) {
                    tracing::error!(account = %name, "Restore failed: {}", e);
                }
            } else if self.config.move_invalid_sessions_to_error {
                if let Err(e) = backups.move_to_error(name) {
                    tracing::error!(account = %name, "Moving invalid session failed: {}", e);
                }
            }
        }
    }
}

async fn drain(set: &mut JoinSet<SessionOutcome>, outcomes: &mut HashMap<String, SessionOutcome>) {
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => {
                outcomes.insert(outcome.account_id.clone(), outcome);
            },
            Err(e) if e.is_cancelled() => {},
            Err(e) => tracing::error!("Session task failed: {}", e),
        }
    }
}

fn build_summary(
    run_id: String,
    started_at: chrono::DateTime<Utc>,
    order: &[String],
    outcomes: &HashMap<String, SessionOutcome>,
    blacklisted: &[Account],
    stats: &StatsAggregator,
    restart_requested: bool,
) -> ExitSummary {
    let accounts = order
        .iter()
        .filter_map(|id| {
            if let Some(outcome) = outcomes.get(id) {
                return Some(AccountSummary {
                    account_id: id.clone(),
                    final_state: outcome.final_state,
                    proxy: outcome.proxy.clone(),
                    reason: Some(outcome.reason.to_string()),
                });
            }
            blacklisted.iter().any(|a| &a.id == id).then(|| AccountSummary {
                account_id: id.clone(),
                final_state: SessionState::Pending,
                proxy: None,
                reason: Some("blacklisted".to_string()),
            })
        })
        .collect();

    ExitSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        accounts,
        stats: stats.snapshot(),
        totals: stats.totals(),
        restart_requested,
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod orchestrator_tests;
