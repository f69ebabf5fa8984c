//! # tapfarm Core
//!
//! Multi-account session orchestration for tapfarm.
//!
//! ## Architecture
//!
//! ```text
//! tapfarm-core/src/
//! ├── client/       # AccountClient seam + HTTP game client
//! ├── farm/         # proxy pool, registry, runners, stats, orchestrator
//! ├── modules/      # config, logging, account/proxy sources, backups, updates
//! └── error.rs      # AppError
//! ```
//!
//! A run loads a [`tapfarm_types::FarmConfig`], the account list and the
//! proxy list, then hands them to [`farm::Orchestrator`], which drives one
//! [`farm::SessionRunner`] per eligible account until shutdown and returns a
//! [`tapfarm_types::ExitSummary`].

#![allow(
    clippy::significant_drop_tightening,
    reason = "Mutex guards in the pool are held for whole bookkeeping steps"
)]
#![allow(
    clippy::redundant_else,
    reason = "Explicit else blocks improve readability in complex control flow"
)]
#![allow(clippy::map_err_ignore, reason = "Error context is provided in the replacement message")]
#![allow(clippy::needless_continue, reason = "Explicit continue improves loop readability")]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::float_cmp,
        clippy::needless_collect,
        clippy::assertions_on_result_states
    )
)]

pub mod client;
pub mod error;
pub mod farm;
pub mod modules;

// Re-export commonly used types
pub use client::{AccountClient, HttpAccountClient};
pub use error::{AppError, AppResult};
pub use farm::{Orchestrator, ProxyPool, StatsAggregator};
