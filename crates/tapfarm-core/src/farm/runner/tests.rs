#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use super::*;
use crate::farm::proxy_pool::PoolOp;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tapfarm_types::CycleReport;

/// Login always succeeds unless scripted; cycles follow the script and then
/// hang until cancelled.
#[derive(Default)]
struct ScriptClient {
    logins: Mutex<VecDeque<Result<(), ClientError>>>,
    cycles: Mutex<VecDeque<Result<CycleReport, ClientError>>>,
    login_calls: Mutex<u32>,
}

#[async_trait]
impl AccountClient for ScriptClient {
    async fn login(&self, _: &Account, _: Option<&ProxyEndpoint>) -> Result<(), ClientError> {
        *self.login_calls.lock() += 1;
        let next = self.logins.lock().pop_front();
        next.unwrap_or(Ok(()))
    }

    async fn run_cycle(
        &self,
        _: &Account,
        _: Option<&ProxyEndpoint>,
    ) -> Result<CycleReport, ClientError> {
        let next = self.cycles.lock().pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

fn fast_settings() -> RunnerSettings {
    RunnerSettings {
        start_delay: Duration::ZERO,
        cycle_pause: Duration::from_millis(5),
        pause_jitter: Duration::ZERO,
        error_pause: Duration::from_millis(5),
        call_timeout: Duration::from_secs(5),
        replace_enabled: true,
        replace_attempts: 2,
        retry_base_delay: Duration::from_millis(5),
        retry_max_delay: Duration::from_millis(20),
    }
}

fn pool(n: usize) -> Arc<ProxyPool> {
    let list =
        (0..n).map(|i| ProxyEndpoint::parse(&format!("10.9.0.{}:8080", i + 1)).unwrap()).collect();
    Arc::new(ProxyPool::new(list, 1).unwrap())
}

fn runner(
    client: Arc<ScriptClient>,
    pool: &Arc<ProxyPool>,
    settings: RunnerSettings,
    cancel: CancellationToken,
) -> (SessionRunner, Arc<StatsAggregator>) {
    let stats = Arc::new(StatsAggregator::new());
    let proxy = pool.acquire(&HashSet::new(), "acct1");
    let entry = SessionEntry { account: Account::new("acct1", "acct1.session"), position: 0, proxy };
    let ctx = RunnerContext {
        pool: Arc::clone(pool),
        client,
        stats: Arc::clone(&stats),
        settings,
        cancel,
    };
    (SessionRunner::new(entry, 1, ctx), stats)
}

#[test]
fn test_start_delay_ordered_and_bounded() {
    let base = Duration::from_secs(360);
    let mut previous = Duration::ZERO;
    for position in 0..4 {
        let low = start_delay(base, position, 4, 0.0);
        let high = start_delay(base, position, 4, 0.999);
        assert!(low >= previous);
        assert!(high <= base);
        previous = high;
    }
    assert_eq!(start_delay(Duration::ZERO, 3, 4, 0.5), Duration::ZERO);
    assert_eq!(start_delay(base, 0, 0, 0.5), Duration::ZERO);
}

#[test]
fn test_backoff_doubles_and_caps() {
    let settings = RunnerSettings {
        retry_base_delay: Duration::from_secs(30),
        retry_max_delay: Duration::from_secs(300),
        ..fast_settings()
    };
    assert_eq!(replacement_backoff(&settings, 0), Duration::from_secs(30));
    assert_eq!(replacement_backoff(&settings, 1), Duration::from_secs(60));
    assert_eq!(replacement_backoff(&settings, 3), Duration::from_secs(240));
    assert_eq!(replacement_backoff(&settings, 4), Duration::from_secs(300));
    assert_eq!(replacement_backoff(&settings, 40), Duration::from_secs(300));
}

#[test]
fn test_pause_policy() {
    let settings = RunnerSettings {
        cycle_pause: Duration::from_secs(3600),
        pause_jitter: Duration::from_secs(360),
        ..fast_settings()
    };
    let hinted = CycleReport { quests_completed: 0, next_pause: Some(Duration::from_secs(100)) };
    let pause = pause_after_cycle(&hinted, &settings);
    assert!(pause >= Duration::from_secs(100) && pause <= Duration::from_secs(460));

    let pause = pause_after_cycle(&CycleReport::default(), &settings);
    assert!(pause >= Duration::from_secs(3600) && pause <= Duration::from_secs(7200));

    let zero = RunnerSettings { cycle_pause: Duration::ZERO, ..settings };
    assert_eq!(pause_after_cycle(&CycleReport::default(), &zero), Duration::ZERO);
}

#[tokio::test]
async fn test_cancel_during_start_delay_stops_without_cycles() {
    let client = Arc::new(ScriptClient::default());
    let pool = pool(1);
    let cancel = CancellationToken::new();
    let settings = RunnerSettings { start_delay: Duration::from_secs(3600), ..fast_settings() };
    let (runner, stats) = runner(Arc::clone(&client), &pool, settings, cancel.clone());
    let mut status = runner.subscribe();

    let handle = tokio::spawn(runner.run());
    status.wait_for(|s| s.state == SessionState::Starting).await.unwrap();
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    assert_eq!(outcome.final_state, SessionState::Stopped);
    assert_eq!(outcome.reason, SessionEndReason::Shutdown);
    assert_eq!(outcome.cycles, 0);
    assert_eq!(*client.login_calls.lock(), 0);
    assert_eq!(pool.total_assigned(), 0);
    assert_eq!(stats.get("acct1").unwrap().cycles_completed, 0);
}

#[tokio::test]
async fn test_two_consecutive_transient_errors_fail() {
    let client = Arc::new(ScriptClient::default());
    client.cycles.lock().extend([
        Ok(CycleReport { quests_completed: 2, next_pause: None }),
        Err(ClientError::unclassified("boom")),
        Err(ClientError::unclassified("boom again")),
    ]);
    let pool = pool(1);
    let (runner, stats) = runner(Arc::clone(&client), &pool, fast_settings(), CancellationToken::new());

    let outcome = runner.run().await;
    assert_eq!(outcome.final_state, SessionState::Failed);
    assert!(matches!(outcome.reason, SessionEndReason::RepeatedErrors(_)));
    assert_eq!(outcome.cycles, 1);

    let record = stats.get("acct1").unwrap();
    assert_eq!(record.quests_completed, 2);
    assert_eq!(record.errors, 2);
    assert_eq!(pool.total_assigned(), 0);
}

#[tokio::test]
async fn test_success_resets_error_streak() {
    let client = Arc::new(ScriptClient::default());
    client.cycles.lock().extend([
        Err(ClientError::transient("503")),
        Ok(CycleReport::default()),
        Err(ClientError::transient("503")),
        Ok(CycleReport::default()),
    ]);
    let pool = pool(1);
    let cancel = CancellationToken::new();
    let (runner, stats) = runner(Arc::clone(&client), &pool, fast_settings(), cancel.clone());

    let handle = tokio::spawn(runner.run());
    tokio::time::timeout(Duration::from_secs(2), async {
        while stats.get("acct1").unwrap().cycles_completed < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    cancel.cancel();

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.final_state, SessionState::Stopped);
    assert_eq!(stats.get("acct1").unwrap().errors, 2);
}

#[tokio::test]
async fn test_auth_error_at_login_fails_once() {
    let client = Arc::new(ScriptClient::default());
    client.logins.lock().push_back(Err(ClientError::auth("banned")));
    let pool = pool(1);
    let (runner, _stats) = runner(Arc::clone(&client), &pool, fast_settings(), CancellationToken::new());

    let outcome = runner.run().await;
    assert_eq!(outcome.final_state, SessionState::Failed);
    assert!(matches!(outcome.reason, SessionEndReason::AuthRejected(_)));
    assert_eq!(*client.login_calls.lock(), 1);
}

#[tokio::test]
async fn test_proxy_error_with_replacement_disabled() {
    let client = Arc::new(ScriptClient::default());
    client.cycles.lock().push_back(Err(ClientError::proxy("connection refused")));
    let pool = pool(2);
    let settings = RunnerSettings { replace_enabled: false, ..fast_settings() };
    let (runner, stats) = runner(Arc::clone(&client), &pool, settings, CancellationToken::new());
    let mut status = runner.subscribe();

    let outcome = runner.run().await;
    assert_eq!(outcome.final_state, SessionState::Stopped);
    assert_eq!(outcome.reason, SessionEndReason::ReplacementDisabled);
    assert!(status.borrow_and_update().proxy.is_none());

    let ops: Vec<PoolOp> = pool.journal().iter().map(|e| e.op).collect();
    assert_eq!(ops, [PoolOp::Acquire, PoolOp::Release, PoolOp::MarkDead]);
    assert_eq!(stats.get("acct1").unwrap().degradations, 1);
    assert_eq!(pool.alive_count(), 1);
}

#[tokio::test]
async fn test_proxy_error_rebinds_and_logs_in_again() {
    let client = Arc::new(ScriptClient::default());
    client.cycles.lock().extend([
        Err(ClientError::Timeout { duration_secs: 60 }),
        Ok(CycleReport { quests_completed: 1, next_pause: None }),
    ]);
    let pool = pool(2);
    let cancel = CancellationToken::new();
    let (runner, stats) = runner(Arc::clone(&client), &pool, fast_settings(), cancel.clone());
    let mut status = runner.subscribe();

    let handle = tokio::spawn(runner.run());
    status
        .wait_for(|s| s.state == SessionState::Running && s.proxy.as_ref().is_some_and(|p| p.id == ProxyId(1)))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        while stats.get("acct1").unwrap().cycles_completed < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    cancel.cancel();

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.final_state, SessionState::Stopped);
    assert_eq!(outcome.proxy.unwrap().host, "10.9.0.2");
    assert_eq!(*client.login_calls.lock(), 2);
    assert_eq!(stats.get("acct1").unwrap().proxy_replacements, 1);
    assert_eq!(pool.total_assigned(), 0);
}

#[tokio::test]
async fn test_exhausted_replacement_skips_trailing_backoff() {
    let client = Arc::new(ScriptClient::default());
    client.cycles.lock().push_back(Err(ClientError::proxy("connection refused")));
    let pool = pool(1);
    let settings = RunnerSettings {
        replace_attempts: 2,
        retry_base_delay: Duration::from_millis(200),
        retry_max_delay: Duration::from_secs(1),
        ..fast_settings()
    };
    let (runner, stats) = runner(Arc::clone(&client), &pool, settings, CancellationToken::new());
    let mut status = runner.subscribe();

    let handle = tokio::spawn(runner.run());
    status.wait_for(|s| s.state == SessionState::Degraded).await.unwrap();
    let degraded_at = tokio::time::Instant::now();
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    let elapsed = degraded_at.elapsed();

    assert_eq!(outcome.final_state, SessionState::Stopped);
    assert_eq!(outcome.reason, SessionEndReason::ProxyExhausted);
    assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "elapsed {elapsed:?}");
    assert_eq!(stats.get("acct1").unwrap().proxy_replacements, 0);
    assert_eq!(pool.total_assigned(), 0);
}

/// Each cycle makes `steps` requests of `step` each, then hangs.
struct SlowClient {
    steps: u32,
    step: Duration,
    cycles_done: Mutex<u32>,
}

#[async_trait]
impl AccountClient for SlowClient {
    async fn login(&self, _: &Account, _: Option<&ProxyEndpoint>) -> Result<(), ClientError> {
        Ok(())
    }

    async fn run_cycle(
        &self,
        _: &Account,
        _: Option<&ProxyEndpoint>,
    ) -> Result<CycleReport, ClientError> {
        let done = *self.cycles_done.lock() > 0;
        if done {
            return std::future::pending().await;
        }
        for _ in 0..self.steps {
            tokio::time::sleep(self.step).await;
        }
        *self.cycles_done.lock() += 1;
        Ok(CycleReport::default())
    }
}

#[tokio::test]
async fn test_slow_requests_within_per_request_timeout_keep_proxy() {
    let config = tapfarm_types::FarmConfig { request_timeout: 1, ..tapfarm_types::FarmConfig::default() };
    let call_timeout = RunnerSettings::from_config(&config).call_timeout;
    assert_eq!(call_timeout, Duration::from_secs(3));

    // Three requests of 400ms: each under the 1s request timeout, 1.2s together.
    let client = Arc::new(SlowClient { steps: 3, step: Duration::from_millis(400), cycles_done: Mutex::new(0) });
    let pool = pool(2);
    let stats = Arc::new(StatsAggregator::new());
    let cancel = CancellationToken::new();
    let entry = SessionEntry {
        account: Account::new("acct1", "acct1.session"),
        position: 0,
        proxy: pool.acquire(&HashSet::new(), "acct1"),
    };
    let ctx = RunnerContext {
        pool: Arc::clone(&pool),
        client: Arc::clone(&client) as Arc<dyn AccountClient>,
        stats: Arc::clone(&stats),
        settings: RunnerSettings { call_timeout, ..fast_settings() },
        cancel: cancel.clone(),
    };

    let handle = tokio::spawn(SessionRunner::new(entry, 1, ctx).run());
    tokio::time::timeout(Duration::from_secs(5), async {
        while stats.get("acct1").unwrap().cycles_completed < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    cancel.cancel();

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.final_state, SessionState::Stopped);
    assert_eq!(outcome.proxy.unwrap().host, "10.9.0.1");
    let record = stats.get("acct1").unwrap();
    assert_eq!(record.errors, 0);
    assert_eq!(record.degradations, 0);
    assert_eq!(pool.alive_count(), 2);
}
