use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[allow(
    clippy::expect_used,
    reason = "Signal handlers are critical infrastructure, panic is appropriate on failure"
)]
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, stopping sessions..."),
        () = terminate => info!("Received SIGTERM, stopping sessions..."),
    }
}

/// Token cancelled by the first shutdown signal.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });
    token
}

/// Replace the current process with a fresh copy of itself, same arguments.
///
/// Only returns on failure.
pub fn restart_process() -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate current executable")?;
    let args: Vec<std::ffi::OsString> = std::env::args_os().skip(1).collect();
    info!(exe = %exe.display(), "Restarting after update");

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let err = std::process::Command::new(&exe).args(&args).exec();
        Err(err).context("Failed to re-exec")
    }

    #[cfg(not(unix))]
    {
        std::process::Command::new(&exe).args(&args).spawn().context("Failed to respawn")?;
        std::process::exit(0);
    }
}
