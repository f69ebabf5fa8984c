//! # tapfarm Types
//!
//! Core types, models, and error definitions for tapfarm.
//!
//! This crate provides the foundational type system for the workspace:
//!
//! - **`error`** - Typed error hierarchy for configuration, account clients and proxies
//! - **`models`** - Domain models (Account, ProxyEndpoint, SessionState, StatsRecord, FarmConfig)
//!
//! ## Architecture Role
//!
//! `tapfarm-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!                tapfarm-types (this crate)
//!                        │
//!                        ▼
//!                  tapfarm-core
//!                        │
//!                        ▼
//!                 tapfarm-daemon
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde for summaries and `--json` output
//! - **Clone** for cheap sharing across async boundaries
//! - **PartialEq** for testing and comparison

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{ClientError, ConfigError, ErrorClass, ProxyParseError, Result, TypedError};

// Re-export core model types
pub use models::{
    Account, AccountSummary, CycleReport, ExitSummary, FarmConfig, ProxyEndpoint, ProxyId,
    ProxyScheme, SessionEndReason, SessionState, StatsEvent, StatsRecord, StatsTotals,
};
