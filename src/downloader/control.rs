//! Download lifecycle control — pause, cancel and deferred cleanup.

use crate::types::{DownloadKey, Event, TaskHandleId};
use std::path::PathBuf;

use super::TorrentDownloader;

impl TorrentDownloader {
    /// Request cooperative stop of a running task by handle id
    ///
    /// Returns immediately; the task observes the signal at its next
    /// suspension point, runs the pause protocol (persist Paused state and
    /// resume bytes, detach the session) and resolves as Paused. Unknown or
    /// already-finished handle ids are a no-op.
    pub async fn pause(&self, handle_id: &TaskHandleId) {
        let tasks = self.registry.by_link.lock().await;
        match tasks.values().find(|task| &task.handle_id == handle_id) {
            Some(task) => {
                tracing::info!(handle_id = %handle_id, "Pause requested");
                task.cancel.cancel();
            }
            None => {
                tracing::debug!(handle_id = %handle_id, "Pause requested for unknown task");
            }
        }
    }

    /// Cancel a download: stop its task, then delete its record and staged files
    ///
    /// Requests a pause like [`pause`](Self::pause), and additionally spawns a
    /// waiter that deletes the download record and the staging directory only
    /// after the task has fully finished, plus a short grace delay so any last
    /// in-flight persistence write lands before the row is removed (a write
    /// after the delete would resurrect it).
    pub async fn cancel(
        &self,
        handle_id: &TaskHandleId,
        article_id: &str,
        link: &str,
        staging_dir_name: &str,
    ) {
        let key = DownloadKey::new(article_id, link);
        let staging_dir = self.config.download.staging_dir.join(staging_dir_name);

        // Snapshot the finished-watcher before pausing so the waiter can't miss
        // the task's completion.
        let finished = {
            let tasks = self.registry.by_link.lock().await;
            tasks
                .values()
                .find(|task| &task.handle_id == handle_id)
                .map(|task| task.finished.clone())
        };

        let downloader = self.clone();
        tokio::spawn(async move {
            downloader.deferred_cleanup(finished, key, staging_dir).await;
        });

        self.pause(handle_id).await;
    }

    /// Wait for the task to finish, let the grace delay elapse, then remove the
    /// download record and staged files.
    async fn deferred_cleanup(
        &self,
        finished: Option<tokio::sync::watch::Receiver<bool>>,
        key: DownloadKey,
        staging_dir: PathBuf,
    ) {
        if let Some(mut finished) = finished {
            while !*finished.borrow() {
                if finished.changed().await.is_err() {
                    // Sender dropped; the task is gone either way
                    break;
                }
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(
            self.config.download.cleanup_grace_ms,
        ))
        .await;

        if let Err(e) = self.db.delete_download(&key).await {
            tracing::warn!(
                article_id = %key.article_id,
                link = %key.link,
                error = %e,
                "Failed to delete download record during cancel"
            );
        }

        if staging_dir.exists()
            && let Err(e) = tokio::fs::remove_dir_all(&staging_dir).await
        {
            tracing::warn!(
                article_id = %key.article_id,
                path = %staging_dir.display(),
                error = %e,
                "Failed to delete staging directory during cancel"
            );
        }

        self.emit_event(Event::Removed {
            article_id: key.article_id,
            link: key.link,
        });
    }
}
