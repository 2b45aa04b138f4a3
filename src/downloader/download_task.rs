//! Download task execution — the lifecycle of a single torrent download.
//!
//! One task per scheduled link. The task owns its torrent session, drives it
//! through start → attach → event loop → terminal state, and reconciles every
//! engine alert with the persisted record through [`RecordWriter`]. All alerts
//! for a session flow through the one event loop, so the in-memory counters
//! need no locking; cancellation is observed at the same suspension point.

use crate::acquisition::{TorrentSource, resolve_source};
use crate::error::{DownloadError, Error, Result};
use crate::notify::ProgressNotifier;
use crate::session::{Alert, TorrentSession};
use crate::types::{DownloadKey, DownloadState, Event, TaskHandleId, TaskOutcome, TaskResult};
use crate::utils::progress_percent_text;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::record::RecordWriter;

/// Shared context for a single download task, reducing parameter passing between helpers.
pub(crate) struct TaskContext {
    pub(crate) key: DownloadKey,
    pub(crate) handle_id: TaskHandleId,
    pub(crate) db: Arc<crate::db::Database>,
    pub(crate) config: Arc<crate::config::Config>,
    pub(crate) http: reqwest::Client,
    pub(crate) session: Arc<dyn TorrentSession>,
    pub(crate) cancel: tokio_util::sync::CancellationToken,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) notifier: Arc<dyn ProgressNotifier>,
}

/// Core download task — runs the full lifecycle and resolves with a terminal outcome.
///
/// Never panics the worker: errors resolve as `Failed` after a best-effort
/// Paused snapshot, so a future re-schedule can resume.
pub(crate) async fn run_download_task(ctx: TaskContext) -> TaskResult {
    let key = ctx.key.clone();
    let record = RecordWriter::new(ctx.db.clone(), key.clone(), ctx.handle_id.clone());
    let mut task = Task {
        ctx,
        record,
        stopping: false,
    };

    let outcome = match task.run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                article_id = %key.article_id,
                link = %key.link,
                error = %e,
                "Download task failed"
            );
            // Preserve resumability on fatal paths: flush a Paused snapshot
            // before surfacing the failure. The single-shot guard makes this a
            // no-op when the failing path already paused.
            task.pause_and_persist().await;
            TaskOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    let state = task
        .ctx
        .db
        .get_download_state(&key)
        .await
        .ok()
        .flatten()
        .unwrap_or(DownloadState::Init);

    TaskResult {
        outcome,
        state,
        key,
    }
}

struct Task {
    ctx: TaskContext,
    record: RecordWriter,
    /// Single-shot pause guard: both the cancellation path and the engine
    /// error path converge on `pause_and_persist`, which must run once.
    stopping: bool,
}

impl Task {
    async fn run(&mut self) -> Result<TaskOutcome> {
        // Recover prior identity: the display name and staging directory of an
        // earlier run, so a resumed task keeps writing into the same place.
        self.record.name = self.ctx.db.get_download_name(&self.ctx.key).await?;
        if let Some(progress) = self.ctx.db.get_download_progress(&self.ctx.key).await? {
            self.record.progress = progress;
        }
        self.record.staging_dir_name = match self.ctx.db.get_staging_dir_name(&self.ctx.key).await?
        {
            Some(name) if !name.trim().is_empty() => name,
            _ => generate_staging_dir_name(),
        };

        let staging_dir = self
            .ctx
            .config
            .download
            .staging_dir
            .join(&self.record.staging_dir_name);
        tokio::fs::create_dir_all(&staging_dir).await.map_err(|e| {
            Error::Download(DownloadError::StagingDir {
                path: staging_dir.clone(),
                reason: e.to_string(),
            })
        })?;

        self.notify();
        let initial_size = self
            .ctx
            .db
            .get_download_size(&self.ctx.key)
            .await?
            .unwrap_or(self.ctx.session.total_downloaded() as i64);
        self.record.upsert_all(initial_size).await?;

        // Guard against duplicate scheduling: a record that already completed
        // is an idempotent no-op success.
        if self.ctx.db.get_download_state(&self.ctx.key).await? == Some(DownloadState::Completed) {
            tracing::info!(
                article_id = %self.ctx.key.article_id,
                link = %self.ctx.key.link,
                "Download already completed, nothing to do"
            );
            return Ok(TaskOutcome::Completed);
        }

        let source = resolve_source(
            &self.ctx.http,
            &self.ctx.key.link,
            &self.ctx.config.download.torrent_file_dir,
        )
        .await?;

        // Warm-resume from any persisted session snapshot, else cold-start
        let resume_data = self.ctx.db.get_resume_data(&self.ctx.key).await?;
        self.ctx.session.start(resume_data.as_deref()).await?;

        match source {
            TorrentSource::Magnet(uri) => {
                self.ctx.session.add_magnet(&uri, &staging_dir).await?;
            }
            TorrentSource::TorrentFile(file) => {
                self.ctx
                    .session
                    .add_torrent_file(&file, &staging_dir)
                    .await?;
            }
        }

        // This task instance now owns the record
        if self.ctx.db.contains_download(&self.ctx.key).await? {
            self.ctx
                .db
                .update_task_handle(&self.ctx.key, &self.ctx.handle_id.0)
                .await?;
        }

        let snapshot = self.ctx.session.save_state().await.unwrap_or_default();
        self.record
            .persist_state_and_resume(DownloadState::Downloading, &snapshot)
            .await?;

        self.event_loop(&staging_dir).await
    }

    /// Single listener for all engine alerts, serialized in delivery order.
    /// Suspends on the next alert; cancellation interrupts the wait exactly once.
    async fn event_loop(&mut self, staging_dir: &Path) -> Result<TaskOutcome> {
        loop {
            let alert = tokio::select! {
                _ = self.ctx.cancel.cancelled() => {
                    tracing::info!(
                        article_id = %self.ctx.key.article_id,
                        link = %self.ctx.key.link,
                        "Cancellation signaled, pausing task"
                    );
                    self.pause_and_persist().await;
                    return Ok(TaskOutcome::Paused);
                }
                alert = self.ctx.session.next_alert() => alert,
            };

            let Some(alert) = alert else {
                // The session hung up without a terminal alert
                self.pause_and_persist().await;
                return Err(Error::Engine(
                    "session closed before the torrent finished".to_string(),
                ));
            };

            let size_bytes = self.ctx.session.total_downloaded() as i64;

            match alert {
                Alert::Error { message } => {
                    self.pause_and_persist().await;
                    return Err(Error::Engine(message));
                }

                Alert::Finished { name } => {
                    self.record.sync_progress(1.0, size_bytes).await?;
                    if self.record.name.is_none() {
                        self.record.sync_name(name, size_bytes).await?;
                    }
                    self.notify();

                    let snapshot = self.ctx.session.save_state().await.unwrap_or_default();
                    self.record
                        .persist_state_and_resume(DownloadState::Completed, &snapshot)
                        .await?;

                    self.move_staging_to_output(staging_dir).await?;
                    self.ctx.session.stop().await;

                    self.emit_progress();
                    return Ok(TaskOutcome::Completed);
                }

                Alert::MetadataReceived { name } => {
                    self.record.sync_name(name, size_bytes).await?;
                    self.notify();
                }

                Alert::StateChanged {
                    description,
                    status,
                } => {
                    self.record
                        .sync_description(Some(description), size_bytes)
                        .await?;
                    if let Some(status) = status {
                        self.record.sync_progress(status.progress, size_bytes).await?;
                        self.notify();
                        self.emit_progress();
                    }
                }

                Alert::Torrent { status } => {
                    if let Some(status) = status
                        && status.progress != self.record.progress
                    {
                        self.record.sync_progress(status.progress, size_bytes).await?;
                        self.record.sync_size(size_bytes).await?;
                        self.notify();
                        self.emit_progress();
                    }
                }
            }
        }
    }

    /// Pause protocol: persist a Paused snapshot with resume bytes, detach the
    /// torrent handle and stop the session.
    ///
    /// Idempotent: a no-op when already stopping or when the session never
    /// started. Safe to reach from the cancellation path, the engine error
    /// path and the outer failure handler without double execution.
    async fn pause_and_persist(&mut self) {
        if self.stopping || !self.ctx.session.is_running() {
            return;
        }
        self.stopping = true;

        let resume_data = self.ctx.session.save_state().await.unwrap_or_default();
        if let Err(e) = self
            .record
            .persist_state_and_resume(DownloadState::Paused, &resume_data)
            .await
        {
            tracing::warn!(
                article_id = %self.ctx.key.article_id,
                link = %self.ctx.key.link,
                error = %e,
                "Failed to persist pause snapshot"
            );
        }

        self.ctx.session.detach().await;
        self.ctx.session.stop().await;
    }

    /// Move everything from the staging directory into the output root
    /// (overwrite-on-conflict), then delete the staging directory.
    async fn move_staging_to_output(&self, staging_dir: &Path) -> Result<()> {
        let output_dir = self.ctx.config.download.output_dir.clone();
        tokio::fs::create_dir_all(&output_dir).await?;

        move_dir_contents(staging_dir.to_path_buf(), output_dir).await?;
        tokio::fs::remove_dir_all(staging_dir).await?;

        tracing::info!(
            article_id = %self.ctx.key.article_id,
            link = %self.ctx.key.link,
            "Moved finished download to output directory"
        );
        Ok(())
    }

    fn notify(&self) {
        let title = self.record.name.as_deref().unwrap_or("Downloading");
        self.ctx.notifier.notify(
            title,
            &progress_percent_text(self.record.progress),
            self.record.progress,
        );
    }

    fn emit_progress(&self) {
        self.ctx
            .event_tx
            .send(Event::Progress {
                article_id: self.ctx.key.article_id.clone(),
                link: self.ctx.key.link.clone(),
                fraction: self.record.progress,
            })
            .ok();
    }
}

/// Staging directory names are generated once and persisted; a resumed task
/// reuses the stored name instead of calling this again.
fn generate_staging_dir_name() -> String {
    format!(
        "{}_{}",
        chrono::Utc::now().timestamp_millis(),
        rand::random::<u64>()
    )
}

/// Recursively move the contents of `source` into `dest`, overwriting existing
/// entries on conflict.
fn move_dir_contents(
    source: PathBuf,
    dest: PathBuf,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>> {
    Box::pin(async move {
        use tokio::fs;

        fs::create_dir_all(&dest).await?;

        let mut entries = fs::read_dir(&source).await?;
        while let Some(entry) = entries.next_entry().await? {
            let source_path = entry.path();
            let dest_path = dest.join(entry.file_name());
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                move_dir_contents(source_path.clone(), dest_path).await?;
                fs::remove_dir(&source_path).await?;
            } else {
                if fs::metadata(&dest_path).await.is_ok() {
                    fs::remove_file(&dest_path).await?;
                }
                fs::rename(&source_path, &dest_path).await?;
            }
        }

        Ok(())
    })
}
