//! Farm configuration model.
//!
//! Keys mirror the environment variable names lowercased (`SESSIONS_PER_PROXY`
//! becomes `sessions_per_proxy`). Durations are whole seconds; signed values
//! where zero or negative means "no delay".

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use validator::Validate;

use crate::error::ConfigError;

/// Reference id used when `REF_ID` is not set.
pub const DEFAULT_REF_ID: &str = "APQ6AS5Y";

/// Hard ceiling for the proxy replacement backoff.
pub const MAX_PROXY_RETRY_DELAY_SECS: u64 = 300;

/// Full runtime configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Configuration struct - bools are intentional feature flags"
)]
pub struct FarmConfig {
    /// Telegram application id
    #[serde(default)]
    #[validate(range(min = 1_i64, message = "is required and must be positive"))]
    pub api_id: i64,
    /// Telegram application hash
    #[serde(default)]
    #[validate(length(min = 1_u64, message = "is required"))]
    pub api_hash: String,

    #[serde(default = "default_true")]
    pub use_proxy: bool,
    #[serde(default = "default_sessions_per_proxy")]
    #[validate(range(min = 1_u32, message = "must be at least 1"))]
    pub sessions_per_proxy: u32,
    #[serde(default)]
    pub disable_proxy_replace: bool,
    /// Comma-separated account identifiers
    #[serde(default)]
    pub blacklisted_sessions: String,

    #[serde(default = "default_session_start_delay")]
    pub session_start_delay: i64,
    #[serde(default = "default_cycle_pause")]
    pub cycle_pause: i64,
    #[serde(default = "default_pause_jitter")]
    pub pause_jitter: i64,
    #[serde(default = "default_error_pause")]
    pub error_pause: i64,

    #[serde(default = "default_proxy_replace_attempts")]
    pub proxy_replace_attempts: u32,
    #[serde(default = "default_proxy_retry_base_delay")]
    pub proxy_retry_base_delay: i64,
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1_u64, message = "must be at least 1 second"))]
    pub request_timeout: u64,
    #[serde(default = "default_shutdown_grace_period")]
    pub shutdown_grace_period: u64,

    #[serde(default)]
    pub auto_update: bool,
    /// 0 disables the update checker
    #[serde(default = "default_check_update_interval")]
    pub check_update_interval: u64,
    #[serde(default)]
    #[validate(url(message = "must be a valid URL"))]
    pub update_url: Option<String>,

    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_ref_id")]
    pub ref_id: String,
    #[serde(default = "default_sessions_dir")]
    #[validate(length(min = 1_u64, message = "must not be empty"))]
    pub sessions_dir: String,
    #[serde(default = "default_proxies_file")]
    pub proxies_file: String,
    #[serde(default = "default_game_api_url")]
    #[validate(url(message = "must be a valid URL"))]
    pub game_api_url: String,

    #[serde(default = "default_true")]
    pub auto_backup_sessions: bool,
    #[serde(default = "default_true")]
    pub auto_restore_invalid_sessions: bool,
    #[serde(default = "default_true")]
    pub move_invalid_sessions_to_error: bool,
}

fn default_true() -> bool {
    true
}

fn default_sessions_per_proxy() -> u32 {
    1
}

fn default_session_start_delay() -> i64 {
    360
}

fn default_cycle_pause() -> i64 {
    3600
}

fn default_pause_jitter() -> i64 {
    360
}

fn default_error_pause() -> i64 {
    60
}

fn default_proxy_replace_attempts() -> u32 {
    5
}

fn default_proxy_retry_base_delay() -> i64 {
    30
}

fn default_request_timeout() -> u64 {
    60
}

fn default_shutdown_grace_period() -> u64 {
    10
}

fn default_check_update_interval() -> u64 {
    60
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_ref_id() -> String {
    DEFAULT_REF_ID.to_string()
}

fn default_sessions_dir() -> String {
    "sessions".to_string()
}

fn default_proxies_file() -> String {
    "proxies.txt".to_string()
}

fn default_game_api_url() -> String {
    "https://minimon.app/php".to_string()
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: String::new(),
            use_proxy: true,
            sessions_per_proxy: default_sessions_per_proxy(),
            disable_proxy_replace: false,
            blacklisted_sessions: String::new(),
            session_start_delay: default_session_start_delay(),
            cycle_pause: default_cycle_pause(),
            pause_jitter: default_pause_jitter(),
            error_pause: default_error_pause(),
            proxy_replace_attempts: default_proxy_replace_attempts(),
            proxy_retry_base_delay: default_proxy_retry_base_delay(),
            request_timeout: default_request_timeout(),
            shutdown_grace_period: default_shutdown_grace_period(),
            auto_update: false,
            check_update_interval: default_check_update_interval(),
            update_url: None,
            debug_logging: false,
            log_dir: default_log_dir(),
            ref_id: default_ref_id(),
            sessions_dir: default_sessions_dir(),
            proxies_file: default_proxies_file(),
            game_api_url: default_game_api_url(),
            auto_backup_sessions: true,
            auto_restore_invalid_sessions: true,
            move_invalid_sessions_to_error: true,
        }
    }
}

/// Clamp a signed seconds value to a duration, `<= 0` meaning zero.
fn non_negative_secs(secs: i64) -> Duration {
    Duration::from_secs(u64::try_from(secs).unwrap_or(0))
}

impl FarmConfig {
    /// Run derive validation plus cross-field checks.
    ///
    /// Returns the first failing key (uppercased, sorted) as a
    /// [`ConfigError::ValidationError`].
    pub fn validate_all(&self) -> Result<(), ConfigError> {
        if let Err(errors) = Validate::validate(self) {
            let field_errors = errors.field_errors();
            let mut fields: Vec<_> = field_errors.keys().collect();
            fields.sort();
            if let Some(field) = fields.first() {
                let message = field_errors
                    .get(*field)
                    .and_then(|errs| errs.first())
                    .and_then(|e| e.message.as_ref())
                    .map_or_else(|| "is invalid".to_string(), ToString::to_string);
                return Err(ConfigError::invalid(field.to_uppercase(), message));
            }
        }

        if self.auto_update
            && self.check_update_interval > 0
            && self.update_url.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::invalid(
                "UPDATE_URL",
                "is required when AUTO_UPDATE is on and CHECK_UPDATE_INTERVAL > 0",
            ));
        }

        Ok(())
    }

    /// Blacklisted account ids: trimmed, empties dropped.
    pub fn blacklist(&self) -> HashSet<String> {
        self.blacklisted_sessions
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn session_start_delay(&self) -> Duration {
        non_negative_secs(self.session_start_delay)
    }

    pub fn cycle_pause(&self) -> Duration {
        non_negative_secs(self.cycle_pause)
    }

    pub fn pause_jitter(&self) -> Duration {
        non_negative_secs(self.pause_jitter)
    }

    pub fn error_pause(&self) -> Duration {
        non_negative_secs(self.error_pause)
    }

    pub fn proxy_retry_base_delay(&self) -> Duration {
        non_negative_secs(self.proxy_retry_base_delay)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub const fn shutdown_grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_period)
    }

    /// `None` when the checker is disabled.
    pub const fn check_update_interval(&self) -> Option<Duration> {
        if self.check_update_interval == 0 {
            None
        } else {
            Some(Duration::from_secs(self.check_update_interval))
        }
    }

    /// Copy safe to print: the API hash is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.api_hash.is_empty() {
            let visible: String = copy.api_hash.chars().take(4).collect();
            copy.api_hash = format!("{visible}****");
        }
        copy
    }
}
