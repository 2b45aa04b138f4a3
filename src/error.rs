//! Error types for torrent-dl
//!
//! This module provides the error handling for the library:
//! - Domain-specific error types (Download, Database)
//! - Engine and I/O failures that keep the persisted record resumable
//! - Constraint-violation detection for writes racing a deleted article

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for torrent-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for torrent-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Download-related error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Underlying torrent session reported an error alert
    #[error("engine error: {0}")]
    Engine(String),

    /// I/O error (staging directory, torrent file, output move)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error while fetching a .torrent payload
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is a persistence constraint violation — a write whose
    /// referenced article row no longer exists. These are recovered locally by
    /// the task engine (logged and skipped), never propagated.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Error::Database(DatabaseError::ConstraintViolation(_)))
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Constraint violation (e.g., foreign key to a deleted article)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Link scheme is not magnet, http or https
    #[error("unsupported link: {link}")]
    UnsupportedLink {
        /// The link whose scheme was rejected
        link: String,
    },

    /// Staging directory could not be created
    #[error("failed to create staging directory {path}: {reason}")]
    StagingDir {
        /// The staging directory path
        path: PathBuf,
        /// Why creation failed
        reason: String,
    },

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// The fetched .torrent payload was unusable
    #[error("invalid torrent payload from {link}: {reason}")]
    InvalidTorrent {
        /// The source link
        link: String,
        /// Why the payload was rejected
        reason: String,
    },
}
