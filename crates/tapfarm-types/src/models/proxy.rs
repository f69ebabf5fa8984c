//! Proxy endpoint model and parsing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::ProxyParseError;

/// Stable index of a proxy inside the pool (input order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProxyId(pub usize);

impl fmt::Display for ProxyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Supported outbound proxy protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    Http,
    Https,
    Socks5,
    Socks5h,
}

impl ProxyScheme {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Socks5 => "socks5",
            Self::Socks5h => "socks5h",
        }
    }
}

impl FromStr for ProxyScheme {
    type Err = ProxyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "socks5" => Ok(Self::Socks5),
            "socks5h" => Ok(Self::Socks5h),
            other => Err(ProxyParseError::UnsupportedScheme { scheme: other.to_string() }),
        }
    }
}

/// Address and credentials of one outbound proxy.
///
/// `Display` never prints credentials; use [`ProxyEndpoint::to_url`] when
/// building a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl ProxyEndpoint {
    /// Parse one proxy line.
    ///
    /// Accepted forms:
    /// - `scheme://[user:pass@]host:port`
    /// - `user:pass@host:port`
    /// - `host:port`
    /// - `host:port:user:pass`
    ///
    /// The scheme defaults to `http`.
    pub fn parse(input: &str) -> Result<Self, ProxyParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ProxyParseError::Empty);
        }

        let normalized = if trimmed.contains("://") || trimmed.contains('@') {
            if trimmed.contains("://") {
                trimmed.to_string()
            } else {
                format!("http://{trimmed}")
            }
        } else {
            let parts: Vec<&str> = trimmed.split(':').collect();
            match parts.as_slice() {
                [host, port] => format!("http://{host}:{port}"),
                [host, port, user, pass] => format!("http://{user}:{pass}@{host}:{port}"),
                _ => {
                    return Err(ProxyParseError::InvalidAddress {
                        input: trimmed.to_string(),
                        message: "expected host:port or host:port:user:pass".to_string(),
                    })
                },
            }
        };

        let invalid = |message: String| ProxyParseError::InvalidAddress {
            input: trimmed.to_string(),
            message,
        };

        let url = Url::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
        let scheme = ProxyScheme::from_str(url.scheme())?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?
            .to_string();
        let port =
            url.port_or_known_default().ok_or_else(|| invalid("missing port".to_string()))?;
        let username = Some(url.username()).filter(|u| !u.is_empty()).map(str::to_string);
        let password = url.password().map(str::to_string);

        Ok(Self { scheme, host, port, username, password })
    }

    /// Full proxy URL including credentials.
    pub fn to_url(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => {
                format!("{}://{}:{}@{}:{}", self.scheme.as_str(), user, pass, self.host, self.port)
            },
            (Some(user), None) => {
                format!("{}://{}@{}:{}", self.scheme.as_str(), user, self.host, self.port)
            },
            _ => format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port),
        }
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

impl FromStr for ProxyEndpoint {
    type Err = ProxyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
