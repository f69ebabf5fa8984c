//! Statistics and run summary models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::AccountSummary;
use super::session::{SessionEndReason, SessionState};

/// Lifecycle or outcome event emitted by a session runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StatsEvent {
    /// A work cycle completed
    CycleOk,
    /// A work cycle failed and was skipped
    CycleError,
    /// Quests completed during a cycle
    QuestDone(u32),
    /// The session moved to a replacement proxy
    ProxyReplaced,
    /// The session lost its proxy
    Degraded,
    /// The session reached a terminal state
    SessionEnded(SessionEndReason),
}

/// Per-account counters. Counters only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub account_id: String,
    pub cycles_completed: u64,
    pub quests_completed: u64,
    pub errors: u64,
    pub proxy_replacements: u64,
    pub degradations: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<SessionEndReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<DateTime<Utc>>,
}

impl StatsRecord {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self { account_id: account_id.into(), ..Default::default() }
    }

    /// Apply one event. The first `SessionEnded` wins.
    pub fn apply(&mut self, event: &StatsEvent, at: DateTime<Utc>) {
        match event {
            StatsEvent::CycleOk => self.cycles_completed += 1,
            StatsEvent::CycleError => self.errors += 1,
            StatsEvent::QuestDone(n) => self.quests_completed += u64::from(*n),
            StatsEvent::ProxyReplaced => self.proxy_replacements += 1,
            StatsEvent::Degraded => self.degradations += 1,
            StatsEvent::SessionEnded(reason) => {
                if self.end_reason.is_none() {
                    self.end_reason = Some(reason.clone());
                }
            },
        }
        self.last_event_at = Some(at);
    }
}

/// Process-wide totals across all accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsTotals {
    pub cycles_completed: u64,
    pub quests_completed: u64,
    pub errors: u64,
    pub proxy_replacements: u64,
    pub sessions_ended: u64,
}

/// Result of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per configured account, blacklisted ones included
    pub accounts: Vec<AccountSummary>,
    pub stats: Vec<StatsRecord>,
    pub totals: StatsTotals,
    /// A newer version was found and auto-update asked for a restart
    #[serde(default)]
    pub restart_requested: bool,
}

impl ExitSummary {
    /// Accounts that ended in `state`, in registration order.
    pub fn accounts_in(&self, state: SessionState) -> impl Iterator<Item = &AccountSummary> {
        self.accounts.iter().filter(move |a| a.final_state == state)
    }

    pub fn count_in(&self, state: SessionState) -> usize {
        self.accounts_in(state).count()
    }

    pub fn stats_for(&self, account_id: &str) -> Option<&StatsRecord> {
        self.stats.iter().find(|r| r.account_id == account_id)
    }
}
