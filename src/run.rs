//! Application execution logic.
//!
//! This module contains the `check` output and the `watch` loop that keeps
//! the provider reloading until shutdown.

use std::io::{self, Write};

use thiserror::Error;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

use hotconf::{ConfigError, NotifyWatcher, Provider, ReloadNotification};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// Failed to start watching the config files.
    #[error("Failed to start watching config files: {0}")]
    Watch(#[source] ConfigError),

    /// Failed to write the configuration.
    #[error("Failed to write configuration: {0}")]
    Output(#[source] io::Error),

    /// The notification channel closed while watching.
    #[error("Reload notifications stopped unexpectedly")]
    NotificationsClosed,
}

/// Writes the current snapshot to `out` as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`RunError::Output`] if writing fails.
pub fn check(provider: &Provider, out: &mut impl Write) -> Result<(), RunError> {
    serde_json::to_writer_pretty(&mut *out, &provider.snapshot().to_json())
        .map_err(|e| RunError::Output(e.into()))?;
    writeln!(out).map_err(RunError::Output)
}

/// Watches every config file and logs reloads until a shutdown signal.
///
/// # Errors
///
/// Returns an error if:
/// - A config file cannot be watched
/// - The notification channel closes while the provider is alive
///
/// # Coverage Note
///
/// This function is excluded from coverage because it requires
/// real file system events and signal handling.
#[cfg(not(tarpaulin_include))]
pub async fn execute(provider: Provider) -> Result<(), RunError> {
    provider.watch(&NotifyWatcher).map_err(RunError::Watch)?;

    let watched = provider.watched_paths();
    if watched.is_empty() {
        tracing::warn!("No config files given, nothing will be reloaded");
    }
    for path in &watched {
        tracing::info!("Watching {}", path.display());
    }

    let mut notifications = provider.subscribe();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                tracing::info!("Shutdown signal received, stopping...");
                provider.shutdown().await;
                return Ok(());
            }

            received = notifications.recv() => {
                match received {
                    Ok(notification) => log_notification(&notification),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {skipped} reload notification(s)");
                    }
                    Err(RecvError::Closed) => return Err(RunError::NotificationsClosed),
                }
            }
        }
    }
}

fn log_notification(notification: &ReloadNotification) {
    if notification.is_success() {
        tracing::info!("{}", describe(notification));
    } else {
        tracing::warn!("{}", describe(notification));
    }
}

/// Summarizes a reload attempt in one line.
fn describe(notification: &ReloadNotification) -> String {
    let event = &notification.event;
    match &notification.error {
        None => format!("Configuration reloaded ({event})"),
        Some(error) => format!("Kept previous configuration ({event}): {error}"),
    }
}

/// Returns a future that completes when a shutdown signal is received.
///
/// A signal handler that cannot be installed never fires.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
