//! Session lifecycle state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle state of one account session.
///
/// ```text
/// Pending ─▶ Starting ─▶ Running ◀─▶ Degraded
///               │           │            │
///               ├───────────┴────────────┤
///               ▼                        ▼
///            Failed                   Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Registered, runner not started (blacklisted accounts stay here)
    Pending,
    /// Waiting out the start delay or logging in
    Starting,
    /// Executing work cycles
    Running,
    /// Lost its proxy, waiting for a replacement
    Degraded,
    /// Ended without an account-level fault
    Stopped,
    /// Ended because the account itself is unusable
    Failed,
}

impl SessionState {
    /// Whether the runner has finished.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// Exhaustive transition table.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use SessionState::{Degraded, Failed, Pending, Running, Starting, Stopped};
        match (self, next) {
            (Pending, Starting) => true,
            (Pending, _) => false,
            (Starting, Running | Stopped | Failed) => true,
            (Starting, _) => false,
            (Running, Running | Degraded | Stopped | Failed) => true,
            (Running, _) => false,
            (Degraded, Running | Stopped | Failed) => true,
            (Degraded, _) => false,
            (Stopped | Failed, _) => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Pending => write!(f, "pending"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Running => write!(f, "running"),
            SessionState::Degraded => write!(f, "degraded"),
            SessionState::Stopped => write!(f, "stopped"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Why a session reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SessionEndReason {
    /// Graceful shutdown (signal or update restart)
    Shutdown,
    /// Runner did not stop within the grace period and was aborted
    ShutdownForced,
    /// Credential rejected
    AuthRejected(String),
    /// No replacement proxy within the attempt budget
    ProxyExhausted,
    /// Proxy died and replacement is disabled
    ReplacementDisabled,
    /// Two consecutive unclassified failures
    RepeatedErrors(String),
}

impl SessionEndReason {
    /// State a runner ends in for this reason.
    pub const fn final_state(&self) -> SessionState {
        match self {
            Self::AuthRejected(_) | Self::RepeatedErrors(_) => SessionState::Failed,
            Self::Shutdown | Self::ShutdownForced | Self::ProxyExhausted | Self::ReplacementDisabled => {
                SessionState::Stopped
            },
        }
    }
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "shutdown"),
            Self::ShutdownForced => write!(f, "aborted after grace period"),
            Self::AuthRejected(msg) => write!(f, "credential rejected: {msg}"),
            Self::ProxyExhausted => write!(f, "no replacement proxy available"),
            Self::ReplacementDisabled => write!(f, "proxy failed, replacement disabled"),
            Self::RepeatedErrors(msg) => write!(f, "repeated errors: {msg}"),
        }
    }
}

/// Result of one successful work cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Quests (rewards, tasks) completed during the cycle
    pub quests_completed: u32,
    /// Server-suggested wait before the next cycle
    pub next_pause: Option<Duration>,
}
