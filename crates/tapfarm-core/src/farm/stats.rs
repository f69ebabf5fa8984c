//! Statistics aggregator.
//!
//! Runners report events through [`StatsAggregator::record`]; only the
//! aggregator mutates records. Per-account records live in a `DashMap`
//! (shard-locked, no lost updates) and process totals in atomics.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tapfarm_types::{StatsEvent, StatsRecord, StatsTotals};

#[derive(Debug)]
struct Slot {
    seq: u64,
    record: StatsRecord,
}

/// Process-wide sink for runner events.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    records: DashMap<String, Slot>,
    next_seq: AtomicU64,
    cycles_completed: AtomicU64,
    quests_completed: AtomicU64,
    errors: AtomicU64,
    proxy_replacements: AtomicU64,
    sessions_ended: AtomicU64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record so the account shows up in snapshots before
    /// its first event. Idempotent.
    pub fn register(&self, account_id: &str) {
        self.records.entry(account_id.to_string()).or_insert_with(|| Slot {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            record: StatsRecord::new(account_id),
        });
    }

    /// Apply one event to the account's record and the totals.
    pub fn record(&self, account_id: &str, event: StatsEvent) {
        let mut slot = self.records.entry(account_id.to_string()).or_insert_with(|| Slot {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            record: StatsRecord::new(account_id),
        });

        let first_end = matches!(event, StatsEvent::SessionEnded(_)) && slot.record.end_reason.is_none();
        slot.record.apply(&event, Utc::now());
        drop(slot);

        match event {
            StatsEvent::CycleOk => {
                self.cycles_completed.fetch_add(1, Ordering::Relaxed);
            },
            StatsEvent::CycleError => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            },
            StatsEvent::QuestDone(n) => {
                self.quests_completed.fetch_add(u64::from(n), Ordering::Relaxed);
            },
            StatsEvent::ProxyReplaced => {
                self.proxy_replacements.fetch_add(1, Ordering::Relaxed);
            },
            StatsEvent::Degraded => {},
            StatsEvent::SessionEnded(_) => {
                if first_end {
                    self.sessions_ended.fetch_add(1, Ordering::Relaxed);
                }
            },
        }
    }

    /// Records in registration order.
    pub fn snapshot(&self) -> Vec<StatsRecord> {
        let mut slots: Vec<(u64, StatsRecord)> =
            self.records.iter().map(|e| (e.seq, e.record.clone())).collect();
        slots.sort_by_key(|(seq, _)| *seq);
        slots.into_iter().map(|(_, record)| record).collect()
    }

    pub fn get(&self, account_id: &str) -> Option<StatsRecord> {
        self.records.get(account_id).map(|slot| slot.record.clone())
    }

    pub fn totals(&self) -> StatsTotals {
        StatsTotals {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            quests_completed: self.quests_completed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            proxy_replacements: self.proxy_replacements.load(Ordering::Relaxed),
            sessions_ended: self.sessions_ended.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tapfarm_types::SessionEndReason;

    #[test]
    fn test_snapshot_keeps_registration_order() {
        let stats = StatsAggregator::new();
        stats.register("zeta");
        stats.register("alpha");
        stats.record("mid", StatsEvent::CycleOk);
        stats.register("zeta");

        let ids: Vec<_> = stats.snapshot().into_iter().map(|r| r.account_id).collect();
        assert_eq!(ids, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_record_updates_only_that_account() {
        let stats = StatsAggregator::new();
        stats.register("a");
        stats.register("b");
        stats.record("a", StatsEvent::CycleOk);
        stats.record("a", StatsEvent::QuestDone(2));
        stats.record("a", StatsEvent::SessionEnded(SessionEndReason::Shutdown));
        stats.record("a", StatsEvent::SessionEnded(SessionEndReason::Shutdown));

        let a = stats.get("a").unwrap();
        assert_eq!(a.cycles_completed, 1);
        assert_eq!(a.quests_completed, 2);
        assert_eq!(stats.get("b").unwrap(), StatsRecord::new("b"));

        let totals = stats.totals();
        assert_eq!(totals.cycles_completed, 1);
        assert_eq!(totals.quests_completed, 2);
        assert_eq!(totals.sessions_ended, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_record_loses_nothing() {
        let stats = Arc::new(StatsAggregator::new());
        let mut handles = Vec::new();

        for task in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(tokio::spawn(async move {
                let account = format!("acct{}", task % 2);
                for _ in 0..500 {
                    stats.record(&account, StatsEvent::CycleOk);
                    stats.record(&account, StatsEvent::QuestDone(1));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].cycles_completed + snapshot[1].cycles_completed, 4000);
        assert_eq!(stats.totals().quests_completed, 4000);
    }
}
