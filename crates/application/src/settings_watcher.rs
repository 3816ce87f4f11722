use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use domain::settings::{RunnerSettings, SecureDestinationSettings};

use crate::settings::SettingsReloadService;

/// A parsed settings reload: the hot values plus, optionally, refreshed
/// secure destination material.
pub struct SettingsUpdate {
    pub settings: RunnerSettings,
    pub secure: Option<SecureDestinationSettings>,
}

/// Spawn the settings-watcher: reloads on file change, SIGHUP, or an
/// API-triggered nudge through `api_trigger`.
///
/// `loader` turns the file into a validated [`SettingsUpdate`]; a load
/// failure keeps the current snapshot. The watcher is the settings cell's
/// single writer.
pub fn spawn_settings_watcher<L>(
    settings_path: PathBuf,
    loader: L,
    reload_service: Arc<SettingsReloadService>,
    cancel_token: CancellationToken,
    mut api_trigger: mpsc::Receiver<()>,
) -> tokio::task::JoinHandle<()>
where
    L: Fn(&Path) -> Result<SettingsUpdate, String> + Send + 'static,
{
    tokio::spawn(async move {
        // File watcher events cross from the notify thread into this task.
        let (notify_tx, mut notify_rx) = mpsc::channel::<()>(4);
        let tx_for_watcher = notify_tx.clone();
        let mut debouncer = match new_debouncer(
            Duration::from_millis(500),
            move |events: Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
                if let Ok(events) = events
                    && events.iter().any(|e| e.kind == DebouncedEventKind::Any)
                {
                    let _ = tx_for_watcher.blocking_send(());
                }
            },
        ) {
            Ok(debouncer) => Some(debouncer),
            Err(error) => {
                tracing::warn!(error = %error, "failed to create settings watcher, file watching disabled");
                None
            }
        };

        if let Some(debouncer) = debouncer.as_mut() {
            if let Err(error) = debouncer
                .watcher()
                .watch(&settings_path, notify::RecursiveMode::NonRecursive)
            {
                tracing::warn!(
                    path = %settings_path.display(),
                    error = %error,
                    "failed to watch settings file, file watching disabled"
                );
            } else {
                tracing::info!(path = %settings_path.display(), "settings watcher started");
            }
        }

        #[cfg(unix)]
        let mut sighup = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
        {
            Ok(signal) => Some(signal),
            Err(error) => {
                tracing::warn!(error = %error, "failed to install SIGHUP handler");
                None
            }
        };

        loop {
            #[cfg(unix)]
            {
                let hangup = async {
                    match sighup.as_mut() {
                        Some(signal) => {
                            signal.recv().await;
                        }
                        None => std::future::pending().await,
                    }
                };
                tokio::select! {
                    () = cancel_token.cancelled() => break,
                    _ = notify_rx.recv() => {
                        tracing::info!("settings file change detected, reloading");
                    }
                    () = hangup => {
                        tracing::info!("SIGHUP received, reloading settings");
                    }
                    _ = api_trigger.recv() => {
                        tracing::info!("API-triggered settings reload");
                    }
                }
            }

            #[cfg(not(unix))]
            {
                tokio::select! {
                    () = cancel_token.cancelled() => break,
                    _ = notify_rx.recv() => {
                        tracing::info!("settings file change detected, reloading");
                    }
                    _ = api_trigger.recv() => {
                        tracing::info!("API-triggered settings reload");
                    }
                }
            }

            match loader(&settings_path) {
                Ok(update) => reload_service.apply(update.settings, update.secure),
                Err(error) => {
                    tracing::warn!(error = %error, "settings reload rejected, keeping current snapshot");
                }
            }
        }

        tracing::info!("settings watcher stopped");
    })
}
