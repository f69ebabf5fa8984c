//! Configuration-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
///
/// Every variant is fatal: startup aborts before any session runner is spawned.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// A required file or directory was not found
    #[error("Config not found: {path}")]
    NotFound {
        /// Filesystem path where the input was expected
        path: String,
    },

    /// Config source could not be read or deserialized
    #[error("Config parse error: {message}")]
    ParseError {
        /// Description of the parse failure
        message: String,
    },

    /// Config validation error (invalid or missing values)
    #[error("Config validation error for {field}: {message}")]
    ValidationError {
        /// Name of the key that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },
}

impl ConfigError {
    /// Create a validation error for `field`.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError { field: field.into(), message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_helper() {
        let err = ConfigError::invalid("API_HASH", "is required");
        assert_eq!(
            err,
            ConfigError::ValidationError {
                field: "API_HASH".to_string(),
                message: "is required".to_string()
            }
        );
        assert_eq!(err.to_string(), "Config validation error for API_HASH: is required");
    }
}
