//! Core downloader implementation split into focused submodules.
//!
//! The `TorrentDownloader` struct and its methods are organized by domain:
//! - [`schedule`] - Task scheduling and per-link dedup
//! - [`control`] - Pause, cancel and deferred cleanup
//! - [`download_task`] - Core download task lifecycle (the event loop)
//! - [`record`] - Coalesced, self-healing persistence writes

mod control;
mod download_task;
mod record;
mod schedule;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::notify::{NoOpNotifier, ProgressNotifier};
use crate::session::SessionFactory;
use crate::types::{Event, TaskHandleId};

/// A task currently registered for a link
pub(crate) struct RunningTask {
    /// Opaque id handed back from schedule(), used for pause/cancel
    pub(crate) handle_id: TaskHandleId,
    /// Cooperative stop signal checked at the task's suspension point
    pub(crate) cancel: tokio_util::sync::CancellationToken,
    /// Flips to true once the task has fully finished
    pub(crate) finished: tokio::sync::watch::Receiver<bool>,
}

/// Active task tracking, one entry per distinct download link
#[derive(Clone)]
pub(crate) struct TaskRegistry {
    /// link -> running task (unique-key dedup happens here)
    pub(crate) by_link:
        std::sync::Arc<tokio::sync::Mutex<std::collections::HashMap<String, RunningTask>>>,
    /// Flag to indicate whether new downloads are accepted (set to false during shutdown)
    pub(crate) accepting_new: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct TorrentDownloader {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests and embedders to query download records
    pub db: std::sync::Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: std::sync::Arc<Config>,
    /// HTTP client for .torrent payload fetches (cheap to clone, shared pool)
    pub(crate) http: reqwest::Client,
    /// Creates one torrent session per task
    pub(crate) sessions: std::sync::Arc<dyn SessionFactory>,
    /// Foreground-presentation collaborator for progress updates
    pub(crate) notifier: std::sync::Arc<dyn ProgressNotifier>,
    /// Active task tracking
    pub(crate) registry: TaskRegistry,
}

impl TorrentDownloader {
    /// Create a new TorrentDownloader instance
    ///
    /// This initializes all core components:
    /// - Creates the output, staging and torrent-file directories
    /// - Opens/creates the SQLite database and runs migrations
    /// - Sets up the event broadcast channel and shared HTTP client
    ///
    /// The session factory is injected so tasks never reach for global engine
    /// state; each scheduled task gets its own session.
    pub async fn new(config: Config, sessions: std::sync::Arc<dyn SessionFactory>) -> Result<Self> {
        for dir in [
            &config.download.output_dir,
            &config.download.staging_dir,
            &config.download.torrent_file_dir,
        ] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", dir.display(), e),
                ))
            })?;
        }

        let db = Database::new(&config.persistence.database_path).await?;

        // Create broadcast channel with buffer size of 1000 events
        // This allows multiple subscribers to receive all events independently
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.download.fetch_timeout_secs,
            ))
            .build()?;

        let registry = TaskRegistry {
            by_link: std::sync::Arc::new(tokio::sync::Mutex::new(
                std::collections::HashMap::new(),
            )),
            accepting_new: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true)),
        };

        Ok(Self {
            db: std::sync::Arc::new(db),
            event_tx,
            config: std::sync::Arc::new(config),
            http,
            sessions,
            notifier: std::sync::Arc::new(NoOpNotifier),
            registry,
        })
    }

    /// Replace the progress notifier (defaults to a no-op)
    ///
    /// The notifier receives `(title, percent_text, fraction)` at each coalesced
    /// progress update and is responsible for its own display concerns.
    pub fn with_notifier(mut self, notifier: std::sync::Arc<dyn ProgressNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Subscribe to download lifecycle events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently. Events are buffered, but if a subscriber falls behind by
    /// more than 1000 events, it will receive a `RecvError::Lagged` error.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Number of tasks currently registered
    pub async fn active_task_count(&self) -> usize {
        self.registry.by_link.lock().await.len()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped; the
    /// download process continues even when no one is listening.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Gracefully shut down the downloader
    ///
    /// Signals cancellation to every active task — each runs its pause
    /// protocol, flushing resume data and detaching its session — then waits
    /// (bounded) for them to finish. Callers should invoke this before process
    /// exit so no task dies without a resumable snapshot.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.registry
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);

        let watchers: Vec<tokio::sync::watch::Receiver<bool>> = {
            let tasks = self.registry.by_link.lock().await;
            tasks
                .values()
                .map(|task| {
                    task.cancel.cancel();
                    task.finished.clone()
                })
                .collect()
        };

        let wait_all = async {
            for mut finished in watchers {
                while !*finished.borrow() {
                    if finished.changed().await.is_err() {
                        break;
                    }
                }
            }
        };

        let shutdown_timeout = std::time::Duration::from_secs(30);
        if tokio::time::timeout(shutdown_timeout, wait_all).await.is_err() {
            tracing::warn!("Timeout waiting for tasks to finish, proceeding with shutdown");
        } else {
            tracing::info!("All active tasks finished gracefully");
        }

        Ok(())
    }
}
