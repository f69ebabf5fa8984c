//! Proxy list loading and reachability probing.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tapfarm_types::ProxyEndpoint;

use crate::error::AppResult;

/// Default URL fetched through a proxy to prove it works.
pub const DEFAULT_PROBE_URL: &str = "https://httpbin.org/ip";

/// Supplies the candidate proxies.
pub trait ProxySource: Send + Sync {
    fn load_proxies(&self) -> AppResult<Vec<ProxyEndpoint>>;
}

/// Proxies listed one per line in a text file.
///
/// Blank lines and `#` comments are skipped, malformed lines are logged and
/// skipped, duplicates keep the first occurrence. A missing file yields an
/// empty list.
#[derive(Debug, Clone)]
pub struct FileProxySource {
    path: PathBuf,
}

impl FileProxySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse proxy lines, skipping what cannot be used.
pub fn parse_proxy_list(content: &str) -> Vec<ProxyEndpoint> {
    let mut seen = HashSet::new();
    let mut proxies = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match ProxyEndpoint::parse(line) {
            Ok(endpoint) => {
                if seen.insert(endpoint.clone()) {
                    proxies.push(endpoint);
                }
            },
            Err(e) => tracing::warn!(line = index + 1, "Skipping invalid proxy: {}", e),
        }
    }
    proxies
}

impl ProxySource for FileProxySource {
    fn load_proxies(&self) -> AppResult<Vec<ProxyEndpoint>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "Proxy file not found, running without proxies");
                return Ok(Vec::new());
            },
            Err(e) => return Err(e.into()),
        };

        let proxies = parse_proxy_list(&content);
        tracing::info!(count = proxies.len(), path = %self.path.display(), "Proxies loaded");
        Ok(proxies)
    }
}

/// Outcome of probing one proxy.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyCheck {
    pub endpoint: ProxyEndpoint,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET `probe_url` through `endpoint` and report whether it answered with a
/// success status within `timeout`.
pub async fn check_proxy(endpoint: &ProxyEndpoint, probe_url: &str, timeout: Duration) -> ProxyCheck {
    let failed = |error: String| ProxyCheck {
        endpoint: endpoint.clone(),
        reachable: false,
        latency_ms: None,
        error: Some(error),
    };

    let client = match reqwest::Proxy::all(endpoint.to_url())
        .and_then(|proxy| reqwest::Client::builder().proxy(proxy).timeout(timeout).build())
    {
        Ok(client) => client,
        Err(e) => return failed(e.to_string()),
    };

    let started = Instant::now();
    match client.get(probe_url).send().await {
        Ok(resp) if resp.status().is_success() => ProxyCheck {
            endpoint: endpoint.clone(),
            reachable: true,
            latency_ms: Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)),
            error: None,
        },
        Ok(resp) => failed(format!("probe returned {}", resp.status())),
        Err(e) => failed(e.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use tapfarm_types::ProxyScheme;
    use wiremock::matchers::any;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_proxy_list() {
        let content = "\
# residential
socks5://u:p@10.0.0.1:1080

10.0.0.2:8080
10.0.0.2:8080
not a proxy
10.0.0.3:3128:bob:secret
";
        let proxies = parse_proxy_list(content);
        assert_eq!(proxies.len(), 3);
        assert_eq!(proxies[0].scheme, ProxyScheme::Socks5);
        assert_eq!(proxies[1].host, "10.0.0.2");
        assert_eq!(proxies[2].username.as_deref(), Some("bob"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileProxySource::new(dir.path().join("proxies.txt"));
        assert!(source.load_proxies().unwrap().is_empty());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxies.txt");
        std::fs::write(&path, "http://1.2.3.4:80\nhttp://1.2.3.5:80\n").unwrap();
        assert_eq!(FileProxySource::new(&path).load_proxies().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_check_proxy_unreachable() {
        let endpoint = ProxyEndpoint::parse("127.0.0.1:9").unwrap();
        let check = check_proxy(&endpoint, "http://example.com/", Duration::from_secs(2)).await;
        assert!(!check.reachable);
        assert!(check.error.is_some());
    }

    #[tokio::test]
    async fn test_check_proxy_reachable() {
        let server = MockServer::start().await;
        Mock::given(any()).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let address = server.address();
        let endpoint = ProxyEndpoint::parse(&format!("{}:{}", address.ip(), address.port())).unwrap();
        let check = check_proxy(&endpoint, "http://probe.test/ip", Duration::from_secs(5)).await;
        assert!(check.reachable, "{:?}", check.error);
        assert!(check.latency_ms.is_some());
    }
}
