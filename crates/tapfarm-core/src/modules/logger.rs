//! Tracing subscriber setup.
//!
//! Console output plus a daily rolling file under the configured log
//! directory. `RUST_LOG` takes precedence over the debug flag.

use std::path::Path;
pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// File name prefix of the rolling log.
pub const LOG_FILE_PREFIX: &str = "tapfarm.log";

/// Default filter directive for the given verbosity.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug,hyper=info,reqwest=info,rustls=info"
    } else {
        "info"
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the process lifetime.
pub fn init_logging(debug: bool, log_dir: &Path) -> AppResult<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let file_layer = fmt::layer().with_ansi(false).with_writer(file_writer).with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Unknown(format!("Failed to install tracing subscriber: {e}")))?;

    Ok(guard)
}
