//! Account client seam.
//!
//! The orchestration core only talks to an [`AccountClient`]. The HTTP
//! implementation lives in [`http`]; tests plug in scripted clients.

pub mod http;

use async_trait::async_trait;
use std::path::PathBuf;
use tapfarm_types::{Account, ClientError, CycleReport, ProxyEndpoint};

pub use http::HttpAccountClient;

/// Most sequential requests a single `login` or `run_cycle` issues.
pub const MAX_REQUESTS_PER_CALL: u32 = 3;

/// Game-side operations for one account.
///
/// Implementations must be safe to call from many runners at once. A call
/// may be dropped mid-flight when the session is cancelled.
#[async_trait]
pub trait AccountClient: Send + Sync {
    /// Authenticate the account, routing through `proxy` when given.
    async fn login(&self, account: &Account, proxy: Option<&ProxyEndpoint>)
        -> Result<(), ClientError>;

    /// Execute one work cycle.
    async fn run_cycle(
        &self,
        account: &Account,
        proxy: Option<&ProxyEndpoint>,
    ) -> Result<CycleReport, ClientError>;
}

/// Supplies the signed web-app init data for an account.
#[async_trait]
pub trait InitDataSource: Send + Sync {
    async fn init_data(&self, account: &Account) -> Result<String, ClientError>;
}

/// Reads init data from a sidecar next to the credential file
/// (`acct1.session` -> `acct1.initdata`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarInitData;

impl SidecarInitData {
    pub fn sidecar_path(account: &Account) -> PathBuf {
        account.credential.with_extension("initdata")
    }
}

#[async_trait]
impl InitDataSource for SidecarInitData {
    async fn init_data(&self, account: &Account) -> Result<String, ClientError> {
        let path = Self::sidecar_path(account);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) if !content.trim().is_empty() => Ok(content.trim().to_string()),
            Ok(_) => Err(ClientError::auth(format!("empty init data in {}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ClientError::auth(format!("no init data at {}", path.display())))
            },
            Err(e) => Err(ClientError::transient(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}
