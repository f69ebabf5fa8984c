//! Scripted in-memory account client shared by the integration tests.

#![allow(dead_code, reason = "each test binary uses a subset of the helpers")]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use tapfarm_core::client::AccountClient;
use tapfarm_types::{Account, ClientError, CycleReport, ProxyEndpoint};

type Script<T> = Mutex<HashMap<String, VecDeque<Result<T, ClientError>>>>;

/// Per-account scripted client. Unscripted logins succeed; once an account's
/// cycle script runs out, its cycles hang until cancelled.
#[derive(Default)]
pub struct ScriptedClient {
    logins: Script<()>,
    cycles: Script<CycleReport>,
    pub login_calls: AtomicU32,
    pub proxies_seen: Mutex<Vec<(String, Option<ProxyEndpoint>)>>,
}

impl ScriptedClient {
    pub fn login_fails(self, account: &str, error: ClientError) -> Self {
        self.logins.lock().entry(account.to_string()).or_default().push_back(Err(error));
        self
    }

    pub fn cycle(self, account: &str, result: Result<CycleReport, ClientError>) -> Self {
        self.cycles.lock().entry(account.to_string()).or_default().push_back(result);
        self
    }
}

#[async_trait]
impl AccountClient for ScriptedClient {
    async fn login(&self, account: &Account, proxy: Option<&ProxyEndpoint>) -> Result<(), ClientError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.proxies_seen.lock().push((account.id.clone(), proxy.cloned()));
        let next = self.logins.lock().get_mut(&account.id).and_then(VecDeque::pop_front);
        next.unwrap_or(Ok(()))
    }

    async fn run_cycle(
        &self,
        account: &Account,
        _: Option<&ProxyEndpoint>,
    ) -> Result<CycleReport, ClientError> {
        let next = self.cycles.lock().get_mut(&account.id).and_then(VecDeque::pop_front);
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

impl ScriptedClient {
    pub fn logins(&self) -> u32 {
        self.login_calls.load(Ordering::SeqCst)
    }
}
