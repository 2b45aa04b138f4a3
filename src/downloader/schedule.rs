//! Task scheduling — per-link dedup and background task spawning.

use crate::acquisition::is_supported_link;
use crate::error::{DownloadError, Error, Result};
use crate::types::{DownloadKey, Event, TaskHandleId, TaskOutcome};

use super::download_task::{TaskContext, run_download_task};
use super::{RunningTask, TorrentDownloader};

impl TorrentDownloader {
    /// Schedule a download task for `(link, article_id)`
    ///
    /// Links must start with `magnet:`, `http:` or `https:`; anything else is
    /// rejected with an unsupported-link error before any task is spawned.
    ///
    /// Scheduling is deduplicated by link: re-submitting a link while a task
    /// for it is queued or running returns the existing task's handle id
    /// (keep-existing policy) instead of starting a second task.
    ///
    /// Returns the opaque handle id of the task instance, usable with
    /// [`pause`](Self::pause) and [`cancel`](Self::cancel). Failure to start
    /// (bad link, engine refusing to create a session) surfaces immediately as
    /// an error; the supervisor never retries on its own.
    pub async fn schedule(&self, link: &str, article_id: &str) -> Result<TaskHandleId> {
        if !is_supported_link(link) {
            return Err(Error::Download(DownloadError::UnsupportedLink {
                link: link.to_string(),
            }));
        }

        if !self
            .registry
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(Error::Download(DownloadError::ShuttingDown));
        }

        let key = DownloadKey::new(article_id, link);

        // Keep the article mirror current so record writes have their referent.
        // A host force-deleting the article later cascades the record away; the
        // task tolerates that.
        self.db.ensure_article(article_id).await?;

        let mut tasks = self.registry.by_link.lock().await;
        if let Some(existing) = tasks.get(link) {
            tracing::debug!(
                article_id,
                link,
                handle_id = %existing.handle_id,
                "Task already scheduled for link, keeping existing"
            );
            return Ok(existing.handle_id.clone());
        }

        // Create the session up front so factory failures resolve immediately
        let session = self.sessions.create()?;

        let handle_id = TaskHandleId::generate();
        let cancel = tokio_util::sync::CancellationToken::new();
        let (finished_tx, finished_rx) = tokio::sync::watch::channel(false);

        tasks.insert(
            link.to_string(),
            RunningTask {
                handle_id: handle_id.clone(),
                cancel: cancel.clone(),
                finished: finished_rx,
            },
        );
        drop(tasks);

        self.emit_event(Event::Queued {
            article_id: article_id.to_string(),
            link: link.to_string(),
        });

        let ctx = TaskContext {
            key: key.clone(),
            handle_id: handle_id.clone(),
            db: self.db.clone(),
            config: self.config.clone(),
            http: self.http.clone(),
            session,
            cancel,
            event_tx: self.event_tx.clone(),
            notifier: self.notifier.clone(),
        };

        let downloader = self.clone();
        let task_handle_id = handle_id.clone();
        tokio::spawn(async move {
            let result = run_download_task(ctx).await;

            // Deregister before signaling completion so a cancel waiter never
            // observes "finished" while the link still looks active.
            {
                let mut tasks = downloader.registry.by_link.lock().await;
                if tasks
                    .get(&result.key.link)
                    .is_some_and(|t| t.handle_id == task_handle_id)
                {
                    tasks.remove(&result.key.link);
                }
            }
            let _ = finished_tx.send(true);

            let event = match &result.outcome {
                TaskOutcome::Completed => Event::Completed {
                    article_id: result.key.article_id.clone(),
                    link: result.key.link.clone(),
                },
                TaskOutcome::Paused => Event::Paused {
                    article_id: result.key.article_id.clone(),
                    link: result.key.link.clone(),
                },
                TaskOutcome::Failed { error } => Event::Failed {
                    article_id: result.key.article_id.clone(),
                    link: result.key.link.clone(),
                    error: error.clone(),
                },
            };
            downloader.emit_event(event);
        });

        Ok(handle_id)
    }
}
