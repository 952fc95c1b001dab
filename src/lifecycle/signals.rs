//! OS signal handling.
//!
//! Translates SIGTERM/SIGINT into the internal shutdown signal.

use crate::lifecycle::shutdown::Shutdown;

/// Wait for a termination signal, then trigger shutdown.
#[cfg(unix)]
pub async fn listen_for_signals(shutdown: &Shutdown) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register SIGTERM handler");
            return;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register SIGINT handler");
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("SIGTERM received"),
        _ = sigint.recv() => tracing::info!("SIGINT received"),
    }

    shutdown.trigger();
}

#[cfg(not(unix))]
pub async fn listen_for_signals(shutdown: &Shutdown) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Ctrl-C received");
    }
    shutdown.trigger();
}
