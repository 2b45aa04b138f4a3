//! Opaque session resume blobs, keyed like download records.
//!
//! Written whenever a session is paused, stopped or checkpointed; read once at
//! task start to decide between cold-start and warm-resume. Rows are never
//! independently deleted — stale blobs are harmless and get overwritten on the
//! next write for the same key.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, DownloadKey, map_write_err};

impl Database {
    /// Get the persisted resume blob for a download, if any
    pub async fn get_resume_data(&self, key: &DownloadKey) -> Result<Option<Vec<u8>>> {
        let data: Option<Vec<u8>> = sqlx::query_scalar(
            "SELECT data FROM resume_params WHERE article_id = ? AND link = ?",
        )
        .bind(&key.article_id)
        .bind(&key.link)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get resume data: {}",
                e
            )))
        })?;

        Ok(data)
    }

    /// Insert or overwrite the resume blob for a download
    ///
    /// Fails with a constraint violation when the referenced article no longer
    /// exists.
    pub async fn put_resume_data(&self, key: &DownloadKey, data: &[u8]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resume_params (article_id, link, data)
            VALUES (?, ?, ?)
            ON CONFLICT(article_id, link) DO UPDATE SET data = excluded.data
            "#,
        )
        .bind(&key.article_id)
        .bind(&key.link)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_err("Failed to put resume data", e))?;

        Ok(())
    }
}
