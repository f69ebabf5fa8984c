//! Update checks against a version endpoint.
//!
//! The endpoint body is scanned for the first `X.Y.Z` version (IP-like
//! matches such as `10.0.0.1` are skipped) and compared numerically with
//! the running crate version.

use async_trait::async_trait;
use regex::Regex;
use std::cmp::Ordering;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Maximum response body size (64 KB).
const MAX_RESPONSE_BYTES: usize = 65_536;

/// Version of the running binary.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source of the latest published version.
#[async_trait]
pub trait UpdateChecker: Send + Sync {
    /// Latest published version, `None` when the endpoint had none.
    async fn latest_version(&self) -> AppResult<Option<String>>;
}

/// Fetches the latest version over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUpdateChecker {
    url: String,
    client: reqwest::Client,
}

impl HttpUpdateChecker {
    pub fn new(url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url: url.into(), client })
    }
}

#[async_trait]
impl UpdateChecker for HttpUpdateChecker {
    async fn latest_version(&self) -> AppResult<Option<String>> {
        let resp = self.client.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::Unknown(format!(
                "update endpoint returned {}",
                resp.status()
            )));
        }

        if resp.content_length().is_some_and(|len| len > MAX_RESPONSE_BYTES as u64) {
            return Err(AppError::Unknown("update response too large".to_string()));
        }
        let bytes = resp.bytes().await?;
        let scan = bytes.get(..MAX_RESPONSE_BYTES).unwrap_or(&bytes);
        Ok(parse_version(&String::from_utf8_lossy(scan)))
    }
}

/// Parse a semver-style version (`X.Y.Z`) from text.
/// Rejects IP-address-like matches by checking that the match is not
/// followed by another dot-digit segment.
pub fn parse_version(text: &str) -> Option<String> {
    let re = Regex::new(r"\d+\.\d+\.\d+").ok()?;
    for m in re.find_iter(text) {
        let after = &text[m.end()..];
        // Reject if followed by `.\d` (IP-like: 192.168.1.1)
        if after.starts_with('.') && after.as_bytes().get(1).is_some_and(u8::is_ascii_digit) {
            continue;
        }
        return Some(m.as_str().to_string());
    }
    None
}

fn components(version: &str) -> Vec<u64> {
    version.split('.').map(|part| part.parse().unwrap_or(0)).collect()
}

/// Numeric comparison of dotted versions; missing components count as 0.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a, b) = (components(a), components(b));
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| a.get(i).copied().unwrap_or(0).cmp(&b.get(i).copied().unwrap_or(0)))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}

/// Ask `checker` once; returns the newer version if there is one.
pub async fn check_for_update(checker: &dyn UpdateChecker, current: &str) -> AppResult<Option<String>> {
    let latest = checker.latest_version().await?;
    Ok(latest.filter(|v| is_newer(v, current)))
}
