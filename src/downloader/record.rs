//! Coalesced, self-healing persistence writes for a single download record.
//!
//! Every mutating write first reads the last persisted value for its field and
//! skips the write when nothing changed, bounding write volume under repeated
//! identical alerts. When the row is missing entirely — never created, or
//! cascade-deleted because the owning article vanished — the helper falls back
//! to a full upsert of all currently-known fields. Upserts racing a deleted
//! article fail the foreign-key check; those are logged and skipped, never
//! propagated (the download is moot once its article is gone).

use crate::db::{Database, NewDownloadTask};
use crate::error::Result;
use crate::types::{DownloadKey, DownloadState, TaskHandleId};
use crate::utils::file_name_from_link;
use std::sync::Arc;

/// Write-side view of one download record, owned by its task's event loop.
///
/// The in-memory fields mirror the engine's latest observations; the `sync_*`
/// methods reconcile them with the store and report whether a write was
/// actually issued.
pub(crate) struct RecordWriter {
    db: Arc<Database>,
    key: DownloadKey,
    handle_id: TaskHandleId,
    /// Staging subdirectory name, fixed for the lifetime of the record
    pub(crate) staging_dir_name: String,
    /// Latest known display name
    pub(crate) name: Option<String>,
    /// Latest observed progress fraction
    pub(crate) progress: f32,
    /// Latest observed engine state description
    pub(crate) description: Option<String>,
}

impl RecordWriter {
    pub(crate) fn new(db: Arc<Database>, key: DownloadKey, handle_id: TaskHandleId) -> Self {
        Self {
            db,
            key,
            handle_id,
            staging_dir_name: String::new(),
            name: None,
            progress: 0.0,
            description: None,
        }
    }

    /// Display name to persist: the learned torrent name, or a sanitized
    /// filename derived from the link until metadata arrives.
    fn effective_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| file_name_from_link(&self.key.link))
    }

    /// Full upsert of all currently-known fields.
    ///
    /// Self-healing entry point used when a field write finds no row. A
    /// foreign-key failure means the owning article is gone; logged and
    /// skipped.
    pub(crate) async fn upsert_all(&self, size_bytes: i64) -> Result<()> {
        let result = self
            .db
            .upsert_download(&NewDownloadTask {
                article_id: self.key.article_id.clone(),
                link: self.key.link.clone(),
                name: Some(self.effective_name()),
                staging_dir_name: self.staging_dir_name.clone(),
                download_date: chrono::Utc::now().timestamp_millis(),
                size_bytes,
                progress: self.progress,
                state: DownloadState::Init.to_i32(),
                task_handle_id: Some(self.handle_id.0.clone()),
            })
            .await;

        match result {
            Err(e) if e.is_constraint_violation() => {
                tracing::warn!(
                    article_id = %self.key.article_id,
                    link = %self.key.link,
                    "Skipping record write, owning article no longer exists"
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Reconcile the display name. Returns whether a write was issued.
    pub(crate) async fn sync_name(&mut self, new: Option<String>, size_bytes: i64) -> Result<bool> {
        if let Some(n) = new
            && !n.trim().is_empty()
        {
            self.name = Some(n);
        }

        let last = self.db.get_download_name(&self.key).await?;
        if last.is_none() && !self.db.contains_download(&self.key).await? {
            self.upsert_all(size_bytes).await?;
            return Ok(true);
        }

        if self.name.is_some() && self.name.as_deref() != last.as_deref() {
            self.db
                .update_download_name(&self.key, &self.effective_name())
                .await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Reconcile the progress fraction. Returns whether a write was issued.
    pub(crate) async fn sync_progress(&mut self, new: f32, size_bytes: i64) -> Result<bool> {
        self.progress = new;

        match self.db.get_download_progress(&self.key).await? {
            None => {
                self.upsert_all(size_bytes).await?;
                Ok(true)
            }
            Some(last) if last != new => {
                self.db.update_download_progress(&self.key, new).await?;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    /// Reconcile the byte size. Returns whether a write was issued.
    pub(crate) async fn sync_size(&self, size_bytes: i64) -> Result<bool> {
        match self.db.get_download_size(&self.key).await? {
            None => {
                self.upsert_all(size_bytes).await?;
                Ok(true)
            }
            Some(last) if last != size_bytes => {
                self.db.update_download_size(&self.key, size_bytes).await?;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    /// Reconcile the engine state description. Returns whether a write was issued.
    pub(crate) async fn sync_description(
        &mut self,
        new: Option<String>,
        size_bytes: i64,
    ) -> Result<bool> {
        self.description = new;

        match self.db.get_download(&self.key).await? {
            None => {
                self.upsert_all(size_bytes).await?;
                Ok(true)
            }
            Some(task) if task.description != self.description => {
                self.db
                    .update_download_description(&self.key, self.description.as_deref())
                    .await?;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    /// Persist a lifecycle state transition together with a resume snapshot.
    ///
    /// Written as a pair so a resumed task always finds resume bytes matching
    /// its persisted state. Constraint violations (article deleted
    /// concurrently) are logged and skipped.
    pub(crate) async fn persist_state_and_resume(
        &self,
        state: DownloadState,
        resume_data: &[u8],
    ) -> Result<()> {
        let result: Result<()> = async {
            self.db.put_resume_data(&self.key, resume_data).await?;
            self.db.update_download_state(&self.key, state).await?;
            Ok(())
        }
        .await;

        match result {
            Err(e) if e.is_constraint_violation() => {
                tracing::warn!(
                    article_id = %self.key.article_id,
                    link = %self.key.link,
                    state = ?state,
                    "Skipping state write, owning article no longer exists"
                );
                Ok(())
            }
            other => other,
        }
    }
}
