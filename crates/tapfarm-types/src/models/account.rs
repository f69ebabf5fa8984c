//! Account model and related types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::proxy::ProxyEndpoint;
use super::session::SessionState;

/// One configured account, immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Unique identifier (session file stem)
    pub id: String,
    /// Path to the credential file backing this account
    pub credential: PathBuf,
    /// Reference identifier sent when a new account registers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Whether the account is excluded from running
    #[serde(default)]
    pub blacklisted: bool,
}

impl Account {
    /// Create a non-blacklisted account without a reference id.
    pub fn new(id: impl Into<String>, credential: impl Into<PathBuf>) -> Self {
        Self { id: id.into(), credential: credential.into(), reference_id: None, blacklisted: false }
    }

    /// Builder-style setter for the reference id.
    #[must_use]
    pub fn with_reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    /// Builder-style setter for the blacklisted flag.
    #[must_use]
    pub const fn with_blacklisted(mut self, blacklisted: bool) -> Self {
        self.blacklisted = blacklisted;
        self
    }
}

/// Per-account line of the final run summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountSummary {
    pub account_id: String,
    pub final_state: SessionState,
    /// Proxy the account held when it finished, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyEndpoint>,
    /// Human-readable end reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let account = Account::new("acct1", "sessions/acct1.session")
            .with_reference_id("REF")
            .with_blacklisted(true);

        assert_eq!(account.id, "acct1");
        assert_eq!(account.credential, PathBuf::from("sessions/acct1.session"));
        assert_eq!(account.reference_id.as_deref(), Some("REF"));
        assert!(account.blacklisted);
    }
}
