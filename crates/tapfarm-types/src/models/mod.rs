//! Core domain models for tapfarm.
//!
//! This module contains all shared data structures used across the workspace.

mod account;
mod config;
mod proxy;
mod session;
mod stats;

// Re-export all models
pub use account::{Account, AccountSummary};
pub use config::{FarmConfig, DEFAULT_REF_ID, MAX_PROXY_RETRY_DELAY_SECS};
pub use proxy::{ProxyEndpoint, ProxyId, ProxyScheme};
pub use session::{CycleReport, SessionEndReason, SessionState};
pub use stats::{ExitSummary, StatsEvent, StatsRecord, StatsTotals};
