//! Timing policy: staggered starts, inter-cycle pauses, replacement backoff.

use rand::Rng;
use std::time::Duration;
use tapfarm_types::models::MAX_PROXY_RETRY_DELAY_SECS;
use tapfarm_types::{CycleReport, FarmConfig};

use crate::client::MAX_REQUESTS_PER_CALL;

/// Timing and recovery knobs of a session runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Window the staggered starts are spread over
    pub start_delay: Duration,
    pub cycle_pause: Duration,
    pub pause_jitter: Duration,
    pub error_pause: Duration,
    /// Overall deadline of one account client call. Requests inside a call
    /// carry their own `REQUEST_TIMEOUT`.
    pub call_timeout: Duration,
    pub replace_enabled: bool,
    pub replace_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl RunnerSettings {
    pub fn from_config(config: &FarmConfig) -> Self {
        Self {
            start_delay: config.session_start_delay(),
            cycle_pause: config.cycle_pause(),
            pause_jitter: config.pause_jitter(),
            error_pause: config.error_pause(),
            call_timeout: config.request_timeout().saturating_mul(MAX_REQUESTS_PER_CALL),
            replace_enabled: !config.disable_proxy_replace,
            replace_attempts: config.proxy_replace_attempts,
            retry_base_delay: config.proxy_retry_base_delay(),
            retry_max_delay: Duration::from_secs(MAX_PROXY_RETRY_DELAY_SECS),
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_config(&FarmConfig::default())
    }
}

/// Start delay of the runner at `position` out of `total`.
///
/// `base * (position + u) / total` with `u` in `[0, 1)`: starts keep the
/// registry order and spread over at most `base`.
pub fn start_delay(base: Duration, position: usize, total: usize, u: f64) -> Duration {
    if base.is_zero() || total == 0 {
        return Duration::ZERO;
    }
    let u = u.clamp(0.0, 1.0 - f64::EPSILON);
    let fraction = (position as f64 + u) / total as f64;
    base.mul_f64(fraction.clamp(0.0, 1.0))
}

/// Uniform duration in `[low, high]`.
fn uniform(low: Duration, high: Duration) -> Duration {
    if high <= low {
        return low;
    }
    let millis = rand::thread_rng().gen_range(low.as_millis()..=high.as_millis());
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

/// Wait after a successful cycle.
///
/// Server hint plus jitter when the cycle reported one, otherwise a random
/// pause between one and two configured cycle pauses.
pub fn pause_after_cycle(report: &CycleReport, settings: &RunnerSettings) -> Duration {
    match report.next_pause {
        Some(hint) => hint + uniform(Duration::ZERO, settings.pause_jitter),
        None => uniform(settings.cycle_pause, settings.cycle_pause * 2),
    }
}

/// Wait after a skipped cycle.
pub fn pause_after_error(settings: &RunnerSettings) -> Duration {
    uniform(settings.error_pause, settings.error_pause * 2)
}

/// Exponential backoff for replacement attempt `attempt` (0-based).
pub fn replacement_backoff(settings: &RunnerSettings, attempt: u32) -> Duration {
    let factor = 2_u32.saturating_pow(attempt);
    settings.retry_base_delay.saturating_mul(factor).min(settings.retry_max_delay)
}
