//! Mirror of the article index owned by the embedding feed application.
//!
//! Download records are foreign-keyed to articles, and deleting an article
//! cascades to its downloads. `ensure_article` keeps standalone use working;
//! embedders sharing the database own the table outright.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::Database;

impl Database {
    /// Register an article id, keeping an existing row untouched
    pub async fn ensure_article(&self, article_id: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO articles (id) VALUES (?)")
            .bind(article_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to ensure article: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Delete an article row, cascading to its download records
    pub async fn delete_article(&self, article_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(article_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete article: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
