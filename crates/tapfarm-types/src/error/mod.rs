//! Typed error definitions for tapfarm.
//!
//! This module provides a structured error hierarchy with specific error types
//! for different domains. All errors are designed to be:
//!
//! - **Serializable** for `--json` summaries via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for error handling logic via enum variants
//! - **Composable** via thiserror derive macros

mod client;
mod config;
mod proxy;

pub use client::{ClientError, ErrorClass};
pub use config::ConfigError;
pub use proxy::ProxyParseError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type that wraps all domain-specific errors.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "domain", content = "error")]
pub enum TypedError {
    /// Wraps an account client error
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Wraps a proxy parsing error
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyParseError),

    /// Wraps a configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Standard Result type using TypedError.
pub type Result<T> = std::result::Result<T, TypedError>;
