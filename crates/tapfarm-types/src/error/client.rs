//! Account client errors and their recovery classes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors an account client reports for a login or a work cycle.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ClientError {
    /// Credential rejected (invalid, banned, revoked)
    #[error("Authentication failed: {message}")]
    Auth {
        /// Reason reported by the upstream service
        message: String,
    },

    /// Proxy refused, dropped or broke the connection
    #[error("Proxy failure: {message}")]
    Proxy {
        /// Transport-level description of the failure
        message: String,
    },

    /// Network operation exceeded its deadline
    #[error("Request timeout after {duration_secs}s")]
    Timeout {
        /// Configured deadline in seconds
        duration_secs: u64,
    },

    /// Upstream hiccup worth one retry (5xx, rejected action)
    #[error("Transient failure: {message}")]
    Transient {
        /// Description of the failure
        message: String,
    },

    /// Anything the client could not classify
    #[error("Unclassified failure: {message}")]
    Unclassified {
        /// Description of the failure
        message: String,
    },
}

/// Recovery class a session runner applies to a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Per-account fatal, no retry
    Auth,
    /// Recoverable by replacing the proxy
    Proxy,
    /// Skip the cycle; a second consecutive one is fatal
    Transient,
}

impl ClientError {
    /// Map this error to a recovery class.
    ///
    /// Timeouts and transport failures only blame the proxy when one is
    /// assigned; a proxyless session treats them as transient.
    pub const fn class(&self, has_proxy: bool) -> ErrorClass {
        match self {
            Self::Auth { .. } => ErrorClass::Auth,
            Self::Proxy { .. } | Self::Timeout { .. } if has_proxy => ErrorClass::Proxy,
            Self::Proxy { .. }
            | Self::Timeout { .. }
            | Self::Transient { .. }
            | Self::Unclassified { .. } => ErrorClass::Transient,
        }
    }

    /// Shorthand for [`ClientError::Auth`].
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth { message: message.into() }
    }

    /// Shorthand for [`ClientError::Proxy`].
    pub fn proxy(message: impl Into<String>) -> Self {
        Self::Proxy { message: message.into() }
    }

    /// Shorthand for [`ClientError::Transient`].
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient { message: message.into() }
    }

    /// Shorthand for [`ClientError::Unclassified`].
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::Unclassified { message: message.into() }
    }
}
