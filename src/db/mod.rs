//! Database layer for torrent-dl
//!
//! Handles SQLite persistence for download records and session resume blobs.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`articles`] — Mirror of the article index owned by the embedding feed app
//! - [`downloads`] — Download record CRUD and field-level updates
//! - [`resume`] — Opaque session resume blobs

use crate::error::{DatabaseError, Error};
use crate::types::DownloadKey;
use sqlx::{FromRow, sqlite::SqlitePool};

mod articles;
mod downloads;
mod migrations;
mod resume;

/// New download record to be upserted into the database
#[derive(Debug, Clone)]
pub struct NewDownloadTask {
    /// Owning article id
    pub article_id: String,
    /// Source link (magnet URI or http(s) .torrent URL)
    pub link: String,
    /// Display name (sanitized link filename until metadata supplies the real one)
    pub name: Option<String>,
    /// Name of the staging subdirectory holding in-progress pieces
    pub staging_dir_name: String,
    /// Unix timestamp (milliseconds) when the download was requested
    pub download_date: i64,
    /// Bytes downloaded so far
    pub size_bytes: i64,
    /// Progress fraction (0.0-1.0)
    pub progress: f32,
    /// Lifecycle state code (see [`DownloadState`](crate::types::DownloadState))
    pub state: i32,
    /// Opaque id of the running task instance, if any
    pub task_handle_id: Option<String>,
}

/// Download record from database
#[derive(Debug, Clone, FromRow)]
pub struct DownloadTask {
    /// Owning article id
    pub article_id: String,
    /// Source link
    pub link: String,
    /// Display name
    pub name: Option<String>,
    /// Name of the staging subdirectory holding in-progress pieces
    pub staging_dir_name: String,
    /// Unix timestamp (milliseconds) when the download was requested
    pub download_date: i64,
    /// Bytes downloaded so far
    pub size_bytes: i64,
    /// Progress fraction (0.0-1.0)
    pub progress: f32,
    /// Human-readable engine state ("downloading", "seeding", ...)
    pub description: Option<String>,
    /// Lifecycle state code (see [`DownloadState`](crate::types::DownloadState))
    pub state: i32,
    /// Opaque id of the running task instance, if any
    pub task_handle_id: Option<String>,
}

/// Database handle for torrent-dl
pub struct Database {
    pool: SqlitePool,
}

/// Whether a sqlx error is a SQLite foreign-key constraint failure.
fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            db.code().is_some_and(|code| code == "787")
                || db.message().contains("FOREIGN KEY constraint failed")
        }
        _ => false,
    }
}

/// Map a write error, classifying foreign-key failures as constraint violations
/// so callers racing an article deletion can recover locally.
fn map_write_err(context: &str, e: sqlx::Error) -> Error {
    if is_foreign_key_violation(&e) {
        Error::Database(DatabaseError::ConstraintViolation(format!(
            "{}: {}",
            context, e
        )))
    } else {
        Error::Database(DatabaseError::QueryFailed(format!("{}: {}", context, e)))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
