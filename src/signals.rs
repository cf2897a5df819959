use tokio::sync::broadcast;
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::state::AppState;

/// Shutdown signal types
#[derive(Debug, Clone, Copy)]
pub enum ShutdownSignal {
    /// Graceful shutdown (drain connections, flush pending snapshots)
    Graceful,
}

/// Setup signal handlers for the server
///
/// Returns a broadcast sender for shutdown signals and a join handle for the signal task
///
/// Handles:
/// - SIGTERM/SIGINT: Graceful shutdown
/// - SIGHUP: Catalog reload
#[cfg(unix)]
pub fn setup_signal_handlers(
    state: AppState,
) -> anyhow::Result<(broadcast::Sender<ShutdownSignal>, tokio::task::JoinHandle<()>)> {
    let (shutdown_tx, _) = broadcast::channel(16);
    let tx_clone = shutdown_tx.clone();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let handle = tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
                _ = sighup.recv() => {
                    reload_catalog(&state).await;
                    continue;
                }
            };
            info!(signal = name, "Initiating graceful shutdown");
            let _ = tx_clone.send(ShutdownSignal::Graceful);
            break;
        }
    });

    Ok((shutdown_tx, handle))
}

/// Swap in a freshly loaded catalog
#[cfg(unix)]
async fn reload_catalog(state: &AppState) {
    info!("SIGHUP received, reloading catalog");
    match state.reload_catalog().await {
        Ok(changed) => info!(changed_sessions = changed, "Catalog reloaded"),
        Err(e) => error!("Failed to reload catalog: {}", e),
    }
}

/// Windows placeholder - only Ctrl+C is supported, no catalog reload
#[cfg(not(unix))]
pub fn setup_signal_handlers(
    _state: AppState,
) -> anyhow::Result<(broadcast::Sender<ShutdownSignal>, tokio::task::JoinHandle<()>)> {
    let (shutdown_tx, _) = broadcast::channel(16);
    let tx_clone = shutdown_tx.clone();

    let handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, initiating shutdown");
                let _ = tx_clone.send(ShutdownSignal::Graceful);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    });

    Ok((shutdown_tx, handle))
}
