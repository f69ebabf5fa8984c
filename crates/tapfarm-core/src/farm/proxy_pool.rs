//! Shared proxy pool with per-proxy capacity.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  ProxyPool                                   │
//! │  ├── capacity: sessions allowed per proxy    │
//! │  └── inner: Mutex<PoolInner>                 │
//! │       ├── slots: [endpoint, assigned, alive] │
//! │       └── journal: last JOURNAL_CAPACITY ops │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Every operation takes the single lock, so selection and the count
//! increment happen atomically and no two runners can overfill a proxy.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use tapfarm_types::{ConfigError, ProxyEndpoint, ProxyId};

/// Number of operations kept in the journal.
pub const JOURNAL_CAPACITY: usize = 256;

/// A proxy handed out by [`ProxyPool::acquire`].
///
/// Holding a lease does not release anything on drop; the holder must call
/// [`ProxyPool::release`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyLease {
    pub id: ProxyId,
    pub endpoint: ProxyEndpoint,
}

/// Kind of pool operation recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolOp {
    Acquire,
    Release,
    MarkDead,
}

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolEvent {
    /// Monotonic sequence number across the pool lifetime
    pub seq: u64,
    pub op: PoolOp,
    pub proxy: ProxyId,
    /// Account that issued the operation
    pub holder: String,
}

/// Point-in-time view of one proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxySlotSnapshot {
    pub id: ProxyId,
    pub endpoint: ProxyEndpoint,
    pub assigned: u32,
    pub alive: bool,
}

#[derive(Debug)]
struct ProxySlot {
    endpoint: ProxyEndpoint,
    assigned: u32,
    alive: bool,
}

#[derive(Debug, Default)]
struct PoolInner {
    slots: Vec<ProxySlot>,
    journal: VecDeque<PoolEvent>,
    next_seq: u64,
}

impl PoolInner {
    fn log(&mut self, op: PoolOp, proxy: ProxyId, holder: &str) {
        if self.journal.len() == JOURNAL_CAPACITY {
            self.journal.pop_front();
        }
        self.journal.push_back(PoolEvent {
            seq: self.next_seq,
            op,
            proxy,
            holder: holder.to_string(),
        });
        self.next_seq += 1;
    }
}

/// Shared set of outbound proxies.
#[derive(Debug)]
pub struct ProxyPool {
    capacity: u32,
    inner: Mutex<PoolInner>,
}

impl ProxyPool {
    /// Build a pool from `endpoints`, dropping duplicates (first wins).
    ///
    /// A capacity of zero is a configuration error.
    pub fn new(endpoints: Vec<ProxyEndpoint>, capacity: u32) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::invalid("SESSIONS_PER_PROXY", "must be at least 1"));
        }

        let mut seen = HashSet::new();
        let slots: Vec<ProxySlot> = endpoints
            .into_iter()
            .filter(|endpoint| seen.insert(endpoint.clone()))
            .map(|endpoint| ProxySlot { endpoint, assigned: 0, alive: true })
            .collect();

        tracing::info!(pool_size = slots.len(), capacity, "Proxy pool initialized");

        Ok(Self { capacity, inner: Mutex::new(PoolInner { slots, ..Default::default() }) })
    }

    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand out the least-loaded live proxy not in `excluding`.
    ///
    /// Ties go to the earliest proxy in input order. Returns `None` when every
    /// eligible proxy is full, dead or excluded.
    pub fn acquire(&self, excluding: &HashSet<ProxyId>, holder: &str) -> Option<ProxyLease> {
        let mut inner = self.inner.lock();
        let capacity = self.capacity;

        let (index, _) = inner
            .slots
            .iter()
            .enumerate()
            .filter(|(i, slot)| {
                slot.alive && slot.assigned < capacity && !excluding.contains(&ProxyId(*i))
            })
            .min_by_key(|(i, slot)| (slot.assigned, *i))?;

        let id = ProxyId(index);
        let endpoint = {
            let slot = &mut inner.slots[index];
            slot.assigned += 1;
            slot.endpoint.clone()
        };
        inner.log(PoolOp::Acquire, id, holder);

        tracing::debug!(account = %holder, proxy = %endpoint, id = %id, "Proxy acquired");
        Some(ProxyLease { id, endpoint })
    }

    /// Give back one assignment. Unknown ids and zero counts are ignored and
    /// leave no journal entry.
    pub fn release(&self, id: ProxyId, holder: &str) {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.slots.get_mut(id.0) else {
            return;
        };
        if slot.assigned == 0 {
            return;
        }
        slot.assigned -= 1;
        inner.log(PoolOp::Release, id, holder);
        tracing::debug!(account = %holder, id = %id, "Proxy released");
    }

    /// Exclude a proxy from every future `acquire`.
    pub fn mark_dead(&self, id: ProxyId, holder: &str) {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.slots.get_mut(id.0) else {
            return;
        };
        if slot.alive {
            slot.alive = false;
            tracing::warn!(account = %holder, proxy = %slot.endpoint, "Proxy marked dead");
        }
        inner.log(PoolOp::MarkDead, id, holder);
    }

    pub fn snapshot(&self) -> Vec<ProxySlotSnapshot> {
        let inner = self.inner.lock();
        inner
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| ProxySlotSnapshot {
                id: ProxyId(i),
                endpoint: slot.endpoint.clone(),
                assigned: slot.assigned,
                alive: slot.alive,
            })
            .collect()
    }

    /// Sum of assigned counts across all proxies.
    pub fn total_assigned(&self) -> u64 {
        self.inner.lock().slots.iter().map(|s| u64::from(s.assigned)).sum()
    }

    pub fn alive_count(&self) -> usize {
        self.inner.lock().slots.iter().filter(|s| s.alive).count()
    }

    /// Recent operations, oldest first.
    pub fn journal(&self) -> Vec<PoolEvent> {
        self.inner.lock().journal.iter().cloned().collect()
    }
}

#[cfg(test)]
#[path = "proxy_pool_tests.rs"]
mod proxy_pool_tests;
