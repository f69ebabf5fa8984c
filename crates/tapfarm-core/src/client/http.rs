//! reqwest-backed account client for the game web API.
//!
//! Flow per account:
//! - `login`: POST `{base}/init.php` with the init data and reference id,
//!   expects `{"success": true}`
//! - `run_cycle`: POST `{base}/cards.php` `{"action": "state"}`; when the
//!   reward is collectable, POST `{"action": "mining_collect"}` and re-read
//!   the state for the next wait
//!
//! One `reqwest::Client` is cached per proxy URL for connection reuse.

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tapfarm_types::{Account, ClientError, CycleReport, ProxyEndpoint};

use super::{AccountClient, InitDataSource, SidecarInitData};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36 Edg/141.0.0.0";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CardsResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<CardsData>,
}

#[derive(Debug, Default, Deserialize)]
struct CardsData {
    #[serde(default)]
    mining: Option<MiningState>,
}

#[derive(Debug, Default, Deserialize)]
struct MiningState {
    #[serde(default)]
    left_ms: u64,
    #[serde(default)]
    can_collect: bool,
}

/// HTTP implementation of [`AccountClient`].
pub struct HttpAccountClient {
    base_url: String,
    ref_id: String,
    request_timeout: Duration,
    init_source: Arc<dyn InitDataSource>,
    /// Cached clients keyed by proxy URL; `""` is the direct client
    clients: DashMap<String, Client>,
    /// Init data of logged-in accounts
    sessions: DashMap<String, String>,
}

impl HttpAccountClient {
    /// Client reading init data from credential sidecars.
    pub fn new(base_url: impl Into<String>, ref_id: impl Into<String>, request_timeout: Duration) -> Self {
        Self::with_init_source(base_url, ref_id, request_timeout, Arc::new(SidecarInitData))
    }

    pub fn with_init_source(
        base_url: impl Into<String>,
        ref_id: impl Into<String>,
        request_timeout: Duration,
        init_source: Arc<dyn InitDataSource>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ref_id: ref_id.into(),
            request_timeout,
            init_source,
            clients: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    /// Get or build the client routed through `proxy`.
    fn client_for(&self, proxy: Option<&ProxyEndpoint>) -> Result<Client, ClientError> {
        let key = proxy.map(ProxyEndpoint::to_url).unwrap_or_default();
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(self.request_timeout))
            .timeout(self.request_timeout)
            .user_agent(USER_AGENT);
        if let Some(endpoint) = proxy {
            let reqwest_proxy = reqwest::Proxy::all(endpoint.to_url())
                .map_err(|e| ClientError::proxy(format!("invalid proxy {endpoint}: {e}")))?;
            builder = builder.proxy(reqwest_proxy);
        } else {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::unclassified(format!("failed to build HTTP client: {e}")))?;

        tracing::debug!(proxy = proxy.map(ToString::to_string).unwrap_or_default(), "Created HTTP client");
        self.clients.insert(key, client.clone());
        Ok(client)
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        proxy: Option<&ProxyEndpoint>,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ClientError> {
        let client = self.client_for(proxy)?;
        let url = format!("{}/{path}", self.base_url);

        let response = client
            .post(&url)
            .header("accept", "*/*")
            .header("origin", origin_of(&self.base_url))
            .header("referer", format!("{}/?tgWebAppStartParam={}", origin_of(&self.base_url), self.ref_id))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, path));
        }

        let bytes = response.bytes().await.map_err(|e| self.classify_transport(&e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::unclassified(format!("undecodable {path} response: {e}")))
    }

    fn classify_transport(&self, e: &reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout { duration_secs: self.request_timeout.as_secs() }
        } else if e.is_connect() {
            ClientError::proxy(e.to_string())
        } else if e.is_decode() || e.is_body() {
            ClientError::unclassified(e.to_string())
        } else {
            ClientError::transient(e.to_string())
        }
    }

    async fn init_data(&self, account: &Account) -> Result<String, ClientError> {
        if let Some(data) = self.sessions.get(&account.id) {
            return Ok(data.clone());
        }
        self.init_source.init_data(account).await
    }

    async fn mining_state(
        &self,
        proxy: Option<&ProxyEndpoint>,
        init_data: &str,
    ) -> Result<MiningState, ClientError> {
        let response: CardsResponse =
            self.post(proxy, "cards.php", json!({ "initData": init_data, "action": "state" })).await?;
        if !response.ok {
            return Err(ClientError::transient(format!(
                "state request rejected: {}",
                response.error.unwrap_or_else(|| "no reason".to_string())
            )));
        }
        Ok(response.data.and_then(|d| d.mining).unwrap_or_default())
    }
}

#[async_trait]
impl AccountClient for HttpAccountClient {
    async fn login(&self, account: &Account, proxy: Option<&ProxyEndpoint>) -> Result<(), ClientError> {
        let init_data = self.init_source.init_data(account).await?;
        let start_param = account.reference_id.as_deref().unwrap_or(&self.ref_id);

        let response: LoginResponse = self
            .post(proxy, "init.php", json!({ "initData": init_data, "start_param": start_param }))
            .await?;
        if !response.success {
            return Err(ClientError::auth(
                response.error.unwrap_or_else(|| "login rejected".to_string()),
            ));
        }

        self.sessions.insert(account.id.clone(), init_data);
        tracing::info!(account = %account.id, "Logged in");
        Ok(())
    }

    async fn run_cycle(
        &self,
        account: &Account,
        proxy: Option<&ProxyEndpoint>,
    ) -> Result<CycleReport, ClientError> {
        let init_data = self.init_data(account).await?;
        let mut state = self.mining_state(proxy, &init_data).await?;
        let mut quests_completed = 0;

        if state.can_collect {
            let response: CardsResponse = self
                .post(proxy, "cards.php", json!({ "initData": init_data, "action": "mining_collect" }))
                .await?;
            if !response.ok {
                return Err(ClientError::transient(format!(
                    "collect rejected: {}",
                    response.error.unwrap_or_else(|| "no reason".to_string())
                )));
            }
            quests_completed = 1;
            tracing::info!(account = %account.id, "Reward collected");
            state = self.mining_state(proxy, &init_data).await?;
        }

        let next_pause = (state.left_ms > 0).then(|| Duration::from_millis(state.left_ms));
        Ok(CycleReport { quests_completed, next_pause })
    }
}

fn classify_status(status: StatusCode, path: &str) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ClientError::auth(format!("{path} returned {status}"))
        },
        StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
            ClientError::proxy(format!("{path} returned {status}"))
        },
        _ => ClientError::transient(format!("{path} returned {status}")),
    }
}

/// `scheme://host[:port]` of a URL, or the input when it does not parse.
fn origin_of(base: &str) -> String {
    url::Url::parse(base)
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_else(|_| base.to_string())
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod http_tests;
