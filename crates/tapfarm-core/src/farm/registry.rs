//! Session registry: eligible accounts and their initial proxy assignments.

use std::collections::HashSet;
use tapfarm_types::Account;

use super::proxy_pool::{ProxyLease, ProxyPool};

/// One account that will get a runner.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub account: Account,
    /// Index among eligible accounts, drives the staggered start
    pub position: usize,
    /// Initial proxy; `None` when proxies are off or the pool was exhausted
    pub proxy: Option<ProxyLease>,
}

/// Accounts split into runnable entries and blacklisted ones.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: Vec<SessionEntry>,
    blacklisted: Vec<Account>,
}

impl SessionRegistry {
    /// Filter blacklisted accounts, then assign proxies in account order.
    ///
    /// An exhausted pool never blocks an account: it starts proxyless.
    pub fn build(
        accounts: Vec<Account>,
        pool: &ProxyPool,
        blacklist: &HashSet<String>,
        use_proxy: bool,
    ) -> Self {
        let mut registry = Self::default();

        for account in accounts {
            if account.blacklisted || blacklist.contains(&account.id) {
                tracing::info!(account = %account.id, "Account blacklisted, not starting");
                registry.blacklisted.push(account);
                continue;
            }

            let proxy = if use_proxy {
                let lease = pool.acquire(&HashSet::new(), &account.id);
                if lease.is_none() {
                    tracing::warn!(
                        account = %account.id,
                        "No proxy capacity left, account runs without proxy"
                    );
                }
                lease
            } else {
                None
            };

            let position = registry.entries.len();
            registry.entries.push(SessionEntry { account, position, proxy });
        }

        tracing::info!(
            eligible = registry.entries.len(),
            blacklisted = registry.blacklisted.len(),
            proxyless = registry.proxyless_count(),
            "Session registry built"
        );
        registry
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn blacklisted(&self) -> &[Account] {
        &self.blacklisted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn proxyless_count(&self) -> usize {
        self.entries.iter().filter(|e| e.proxy.is_none()).count()
    }

    pub fn into_parts(self) -> (Vec<SessionEntry>, Vec<Account>) {
        (self.entries, self.blacklisted)
    }
}
