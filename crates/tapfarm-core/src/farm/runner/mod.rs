//! Session runner: drives one account from `Pending` to a terminal state.
//!
//! ```text
//! Pending ─▶ Starting ──login ok──▶ Running ──cycle──▶ Running
//!              │  (staggered delay,     │ proxy error        ▲
//!              │   login retries)       ▼                    │
//!              │                    Degraded ──replaced──────┘
//!              ▼                        │
//!         Stopped | Failed ◀────────────┘
//! ```
//!
//! Every suspension point (start delay, pauses, backoff, client calls) races
//! against the shared cancellation token.

mod policy;

pub use policy::{
    pause_after_cycle, pause_after_error, replacement_backoff, start_delay, RunnerSettings,
};

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tapfarm_types::{
    Account, ClientError, ErrorClass, ProxyEndpoint, ProxyId, SessionEndReason, SessionState,
    StatsEvent,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::proxy_pool::{ProxyLease, ProxyPool};
use super::registry::SessionEntry;
use super::stats::StatsAggregator;
use crate::client::AccountClient;

/// Failures in a row that end a session.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 2;

/// Shared handles every runner needs.
#[derive(Clone)]
pub struct RunnerContext {
    pub pool: Arc<ProxyPool>,
    pub client: Arc<dyn AccountClient>,
    pub stats: Arc<StatsAggregator>,
    pub settings: RunnerSettings,
    pub cancel: CancellationToken,
}

/// What a runner publishes for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerStatus {
    pub state: SessionState,
    pub proxy: Option<ProxyLease>,
}

/// Final result of a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub account_id: String,
    pub final_state: SessionState,
    pub reason: SessionEndReason,
    /// Last proxy the session used, if any
    pub proxy: Option<ProxyEndpoint>,
    pub cycles: u64,
}

pub struct SessionRunner {
    account: Account,
    position: usize,
    total: usize,
    proxy: Option<ProxyLease>,
    last_proxy: Option<ProxyEndpoint>,
    /// Proxies this session saw die; never handed back to it
    dead: HashSet<ProxyId>,
    ctx: RunnerContext,
    state: SessionState,
    status: watch::Sender<RunnerStatus>,
    consecutive_errors: u32,
    cycles: u64,
}

impl SessionRunner {
    pub fn new(entry: SessionEntry, total: usize, ctx: RunnerContext) -> Self {
        let last_proxy = entry.proxy.as_ref().map(|lease| lease.endpoint.clone());
        let (status, _) = watch::channel(RunnerStatus {
            state: SessionState::Pending,
            proxy: entry.proxy.clone(),
        });
        ctx.stats.register(&entry.account.id);

        Self {
            account: entry.account,
            position: entry.position,
            total,
            proxy: entry.proxy,
            last_proxy,
            dead: HashSet::new(),
            ctx,
            state: SessionState::Pending,
            status,
            consecutive_errors: 0,
            cycles: 0,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account.id
    }

    /// Observe state and proxy changes.
    pub fn subscribe(&self) -> watch::Receiver<RunnerStatus> {
        self.status.subscribe()
    }

    /// Drive the session to a terminal state.
    pub async fn run(mut self) -> SessionOutcome {
        self.transition(SessionState::Starting);

        let delay = start_delay(
            self.ctx.settings.start_delay,
            self.position,
            self.total,
            rand::random::<f64>(),
        );
        tracing::info!(delay_secs = delay.as_secs(), "Session starting");
        if !self.sleep_or_cancel(delay).await {
            return self.finish(SessionEndReason::Shutdown);
        }

        if let Err(reason) = self.establish().await {
            return self.finish(reason);
        }
        self.transition(SessionState::Running);

        loop {
            if self.ctx.cancel.is_cancelled() {
                return self.finish(SessionEndReason::Shutdown);
            }

            let pause = match self.cycle().await {
                Ok(pause) => pause,
                Err(reason) => return self.finish(reason),
            };

            if !self.sleep_or_cancel(pause).await {
                return self.finish(SessionEndReason::Shutdown);
            }
        }
    }

    /// One cycle plus its error handling; returns the pause before the next.
    async fn cycle(&mut self) -> Result<Duration, SessionEndReason> {
        let proxy = self.current_endpoint();
        let result = {
            let client = Arc::clone(&self.ctx.client);
            let call = client.run_cycle(&self.account, proxy.as_ref());
            self.call(call).await
        };

        match result {
            None => Err(SessionEndReason::Shutdown),
            Some(Ok(report)) => {
                self.consecutive_errors = 0;
                self.cycles += 1;
                self.ctx.stats.record(&self.account.id, StatsEvent::CycleOk);
                if report.quests_completed > 0 {
                    self.ctx
                        .stats
                        .record(&self.account.id, StatsEvent::QuestDone(report.quests_completed));
                }
                self.transition(SessionState::Running);
                let pause = pause_after_cycle(&report, &self.ctx.settings);
                tracing::info!(
                    quests = report.quests_completed,
                    next_in_secs = pause.as_secs(),
                    "Cycle completed"
                );
                Ok(pause)
            },
            Some(Err(error)) => {
                self.ctx.stats.record(&self.account.id, StatsEvent::CycleError);
                match error.class(self.proxy.is_some()) {
                    ErrorClass::Auth => Err(SessionEndReason::AuthRejected(error.to_string())),
                    ErrorClass::Proxy => {
                        tracing::warn!(error = %error, "Proxy failed, session degraded");
                        self.transition(SessionState::Degraded);
                        self.ctx.stats.record(&self.account.id, StatsEvent::Degraded);
                        self.replace_proxy().await?;
                        self.establish().await?;
                        self.transition(SessionState::Running);
                        Ok(Duration::ZERO)
                    },
                    ErrorClass::Transient => {
                        self.note_transient(&error)?;
                        Ok(pause_after_error(&self.ctx.settings))
                    },
                }
            },
        }
    }

    /// Log in, replacing the proxy or retrying as the errors dictate.
    async fn establish(&mut self) -> Result<(), SessionEndReason> {
        loop {
            let proxy = self.current_endpoint();
            let result = {
                let client = Arc::clone(&self.ctx.client);
                let call = client.login(&self.account, proxy.as_ref());
                self.call(call).await
            };

            match result {
                None => return Err(SessionEndReason::Shutdown),
                Some(Ok(())) => {
                    self.consecutive_errors = 0;
                    return Ok(());
                },
                Some(Err(error)) => match error.class(self.proxy.is_some()) {
                    ErrorClass::Auth => {
                        return Err(SessionEndReason::AuthRejected(error.to_string()));
                    },
                    ErrorClass::Proxy => {
                        tracing::warn!(error = %error, "Login through proxy failed");
                        self.ctx.stats.record(&self.account.id, StatsEvent::CycleError);
                        self.replace_proxy().await?;
                    },
                    ErrorClass::Transient => {
                        self.ctx.stats.record(&self.account.id, StatsEvent::CycleError);
                        self.note_transient(&error)?;
                        if !self.sleep_or_cancel(pause_after_error(&self.ctx.settings)).await {
                            return Err(SessionEndReason::Shutdown);
                        }
                    },
                },
            }
        }
    }

    /// Count a retryable failure; the second in a row ends the session.
    fn note_transient(&mut self, error: &ClientError) -> Result<(), SessionEndReason> {
        self.consecutive_errors += 1;
        if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
            return Err(SessionEndReason::RepeatedErrors(error.to_string()));
        }
        tracing::warn!(error = %error, "Cycle skipped");
        Ok(())
    }

    /// Drop the failing proxy and try to bind another.
    ///
    /// The failing proxy is released and marked dead exactly once before the
    /// first `acquire`. Backoff only runs between attempts.
    async fn replace_proxy(&mut self) -> Result<(), SessionEndReason> {
        if let Some(lease) = self.proxy.take() {
            self.ctx.pool.release(lease.id, &self.account.id);
            self.ctx.pool.mark_dead(lease.id, &self.account.id);
            self.dead.insert(lease.id);
            self.publish();
        }

        if !self.ctx.settings.replace_enabled {
            tracing::warn!("Proxy replacement disabled");
            return Err(SessionEndReason::ReplacementDisabled);
        }

        let attempts = self.ctx.settings.replace_attempts;
        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = replacement_backoff(&self.ctx.settings, attempt - 1);
                tracing::debug!(attempt = attempt + 1, backoff_secs = backoff.as_secs(), "No proxy available");
                if !self.sleep_or_cancel(backoff).await {
                    return Err(SessionEndReason::Shutdown);
                }
            }

            if let Some(lease) = self.ctx.pool.acquire(&self.dead, &self.account.id) {
                tracing::info!(proxy = %lease.endpoint, attempt = attempt + 1, "Proxy replaced");
                self.last_proxy = Some(lease.endpoint.clone());
                self.proxy = Some(lease);
                self.publish();
                self.ctx.stats.record(&self.account.id, StatsEvent::ProxyReplaced);
                return Ok(());
            }
        }

        tracing::warn!(attempts, "Proxy replacement exhausted");
        Err(SessionEndReason::ProxyExhausted)
    }

    /// Race a client call against its overall deadline and the cancellation
    /// token. `None` means cancelled.
    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, ClientError>>,
    ) -> Option<Result<T, ClientError>> {
        let timeout = self.ctx.settings.call_timeout;
        tokio::select! {
            biased;
            () = self.ctx.cancel.cancelled() => None,
            res = tokio::time::timeout(timeout, fut) => Some(res.unwrap_or(Err(ClientError::Timeout {
                duration_secs: timeout.as_secs(),
            }))),
        }
    }

    /// Sleep unless cancelled first. Returns `false` on cancellation.
    async fn sleep_or_cancel(&self, duration: Duration) -> bool {
        if self.ctx.cancel.is_cancelled() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => true,
            () = self.ctx.cancel.cancelled() => false,
        }
    }

    fn current_endpoint(&self) -> Option<ProxyEndpoint> {
        self.proxy.as_ref().map(|lease| lease.endpoint.clone())
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        if !self.state.can_transition_to(next) {
            tracing::error!(from = %self.state, to = %next, "Illegal session transition ignored");
            return;
        }
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "Session state changed");
        }
        self.state = next;
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(RunnerStatus { state: self.state, proxy: self.proxy.clone() });
    }

    /// Release the proxy, enter the terminal state and report it once.
    fn finish(mut self, reason: SessionEndReason) -> SessionOutcome {
        if let Some(lease) = self.proxy.take() {
            self.ctx.pool.release(lease.id, &self.account.id);
        }
        let final_state = reason.final_state();
        self.transition(final_state);
        self.ctx.stats.record(&self.account.id, StatsEvent::SessionEnded(reason.clone()));

        match final_state {
            SessionState::Failed => tracing::error!(reason = %reason, "Session failed"),
            _ if reason == SessionEndReason::Shutdown => {
                tracing::info!(cycles = self.cycles, "Session stopped")
            },
            _ => tracing::warn!(reason = %reason, "Session stopped"),
        }

        SessionOutcome {
            account_id: self.account.id.clone(),
            final_state,
            reason,
            proxy: self.last_proxy.clone(),
            cycles: self.cycles,
        }
    }
}

#[cfg(test)]
mod tests;
