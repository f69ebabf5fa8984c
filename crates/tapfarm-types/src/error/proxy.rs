//! Proxy-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while parsing a proxy line.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ProxyParseError {
    /// Line is empty after trimming
    #[error("Empty proxy line")]
    Empty,

    /// Scheme is not one of http, https, socks5, socks5h
    #[error("Unsupported proxy scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    /// Host or port missing or malformed
    #[error("Invalid proxy address '{input}': {message}")]
    InvalidAddress { input: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ProxyParseError::UnsupportedScheme { scheme: "ftp".to_string() };
        assert_eq!(err.to_string(), "Unsupported proxy scheme: ftp");
    }
}
