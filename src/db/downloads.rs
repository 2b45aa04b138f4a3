//! Download record CRUD and field-level updates.
//!
//! Field-level getters return `None` when no row exists for the key, which the
//! task engine uses to self-heal a record deleted underneath it (e.g. by the
//! article foreign-key cascade).

use crate::error::DatabaseError;
use crate::types::DownloadState;
use crate::{Error, Result};

use super::{Database, DownloadKey, DownloadTask, NewDownloadTask, map_write_err};

impl Database {
    /// Insert a download record, or refresh the live fields of an existing one
    ///
    /// On conflict the identity, staging directory name and creation date of
    /// the existing row are kept; name, size, progress and task handle are
    /// refreshed. Fails with a constraint violation when the referenced
    /// article no longer exists.
    pub async fn upsert_download(&self, download: &NewDownloadTask) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO downloads (
                article_id, link, name, staging_dir_name, download_date,
                size_bytes, progress, state, task_handle_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(article_id, link) DO UPDATE SET
                name = excluded.name,
                size_bytes = excluded.size_bytes,
                progress = excluded.progress,
                task_handle_id = excluded.task_handle_id
            "#,
        )
        .bind(&download.article_id)
        .bind(&download.link)
        .bind(&download.name)
        .bind(&download.staging_dir_name)
        .bind(download.download_date)
        .bind(download.size_bytes)
        .bind(download.progress)
        .bind(download.state)
        .bind(&download.task_handle_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_err("Failed to upsert download", e))?;

        Ok(())
    }

    /// Get a download record by key
    pub async fn get_download(&self, key: &DownloadKey) -> Result<Option<DownloadTask>> {
        let row = sqlx::query_as::<_, DownloadTask>(
            r#"
            SELECT
                article_id, link, name, staging_dir_name, download_date,
                size_bytes, progress, description, state, task_handle_id
            FROM downloads
            WHERE article_id = ? AND link = ?
            "#,
        )
        .bind(&key.article_id)
        .bind(&key.link)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get download: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List all download records
    pub async fn list_downloads(&self) -> Result<Vec<DownloadTask>> {
        let rows = sqlx::query_as::<_, DownloadTask>(
            r#"
            SELECT
                article_id, link, name, staging_dir_name, download_date,
                size_bytes, progress, description, state, task_handle_id
            FROM downloads
            ORDER BY download_date DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list downloads: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Whether a download record exists for the key
    pub async fn contains_download(&self, key: &DownloadKey) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM downloads WHERE article_id = ? AND link = ?",
        )
        .bind(&key.article_id)
        .bind(&key.link)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to check download existence: {}",
                e
            )))
        })?;

        Ok(count > 0)
    }

    /// Get the lifecycle state of a download, or `None` when no row exists
    pub async fn get_download_state(&self, key: &DownloadKey) -> Result<Option<DownloadState>> {
        let state: Option<i32> = sqlx::query_scalar(
            "SELECT state FROM downloads WHERE article_id = ? AND link = ?",
        )
        .bind(&key.article_id)
        .bind(&key.link)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get download state: {}",
                e
            )))
        })?;

        Ok(state.map(DownloadState::from_i32))
    }

    /// Get the display name of a download
    ///
    /// `None` when no row exists or the name has not been learned yet.
    pub async fn get_download_name(&self, key: &DownloadKey) -> Result<Option<String>> {
        let name: Option<Option<String>> = sqlx::query_scalar(
            "SELECT name FROM downloads WHERE article_id = ? AND link = ?",
        )
        .bind(&key.article_id)
        .bind(&key.link)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get download name: {}",
                e
            )))
        })?;

        Ok(name.flatten())
    }

    /// Get the progress fraction of a download, or `None` when no row exists
    pub async fn get_download_progress(&self, key: &DownloadKey) -> Result<Option<f32>> {
        let progress: Option<f32> = sqlx::query_scalar(
            "SELECT progress FROM downloads WHERE article_id = ? AND link = ?",
        )
        .bind(&key.article_id)
        .bind(&key.link)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get download progress: {}",
                e
            )))
        })?;

        Ok(progress)
    }

    /// Get the byte size of a download, or `None` when no row exists
    pub async fn get_download_size(&self, key: &DownloadKey) -> Result<Option<i64>> {
        let size: Option<i64> = sqlx::query_scalar(
            "SELECT size_bytes FROM downloads WHERE article_id = ? AND link = ?",
        )
        .bind(&key.article_id)
        .bind(&key.link)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get download size: {}",
                e
            )))
        })?;

        Ok(size)
    }

    /// Get the persisted staging directory name, or `None` when no row exists
    pub async fn get_staging_dir_name(&self, key: &DownloadKey) -> Result<Option<String>> {
        let name: Option<String> = sqlx::query_scalar(
            "SELECT staging_dir_name FROM downloads WHERE article_id = ? AND link = ?",
        )
        .bind(&key.article_id)
        .bind(&key.link)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get staging dir name: {}",
                e
            )))
        })?;

        Ok(name)
    }

    /// Update the display name
    pub async fn update_download_name(&self, key: &DownloadKey, name: &str) -> Result<()> {
        sqlx::query("UPDATE downloads SET name = ? WHERE article_id = ? AND link = ?")
            .bind(name)
            .bind(&key.article_id)
            .bind(&key.link)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_err("Failed to update download name", e))?;

        Ok(())
    }

    /// Update the progress fraction
    pub async fn update_download_progress(&self, key: &DownloadKey, progress: f32) -> Result<()> {
        sqlx::query("UPDATE downloads SET progress = ? WHERE article_id = ? AND link = ?")
            .bind(progress)
            .bind(&key.article_id)
            .bind(&key.link)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_err("Failed to update download progress", e))?;

        Ok(())
    }

    /// Update the byte size
    pub async fn update_download_size(&self, key: &DownloadKey, size_bytes: i64) -> Result<()> {
        sqlx::query("UPDATE downloads SET size_bytes = ? WHERE article_id = ? AND link = ?")
            .bind(size_bytes)
            .bind(&key.article_id)
            .bind(&key.link)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_err("Failed to update download size", e))?;

        Ok(())
    }

    /// Update the human-readable engine state description
    pub async fn update_download_description(
        &self,
        key: &DownloadKey,
        description: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE downloads SET description = ? WHERE article_id = ? AND link = ?")
            .bind(description)
            .bind(&key.article_id)
            .bind(&key.link)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_err("Failed to update download description", e))?;

        Ok(())
    }

    /// Update the lifecycle state
    pub async fn update_download_state(
        &self,
        key: &DownloadKey,
        state: DownloadState,
    ) -> Result<()> {
        sqlx::query("UPDATE downloads SET state = ? WHERE article_id = ? AND link = ?")
            .bind(state.to_i32())
            .bind(&key.article_id)
            .bind(&key.link)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_err("Failed to update download state", e))?;

        Ok(())
    }

    /// Update the task handle id of the running task instance
    pub async fn update_task_handle(&self, key: &DownloadKey, handle_id: &str) -> Result<()> {
        sqlx::query("UPDATE downloads SET task_handle_id = ? WHERE article_id = ? AND link = ?")
            .bind(handle_id)
            .bind(&key.article_id)
            .bind(&key.link)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_err("Failed to update task handle", e))?;

        Ok(())
    }

    /// Delete a download record
    pub async fn delete_download(&self, key: &DownloadKey) -> Result<()> {
        sqlx::query("DELETE FROM downloads WHERE article_id = ? AND link = ?")
            .bind(&key.article_id)
            .bind(&key.link)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete download: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
