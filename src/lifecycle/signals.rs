//! OS signal handling.
//!
//! # Responsibilities
//! - SIGINT/SIGTERM trigger graceful shutdown
//! - SIGHUP requests a route refresh, not a shutdown

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::lifecycle::Shutdown;

/// Wait for a termination signal, then trigger `shutdown`.
#[cfg(unix)]
pub async fn listen(shutdown: Arc<Shutdown>, refresh: mpsc::Sender<()>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("SIGINT received");
                break;
            }
            _ = terminate.recv() => {
                tracing::info!("SIGTERM received");
                break;
            }
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received, refreshing routes");
                let _ = refresh.try_send(());
            }
        }
    }
    shutdown.trigger();
    Ok(())
}

#[cfg(not(unix))]
pub async fn listen(shutdown: Arc<Shutdown>, _refresh: mpsc::Sender<()>) -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.trigger();
    Ok(())
}
