//! Core types for torrent-dl

use serde::{Deserialize, Serialize};

/// Composite identity of a download: the owning article plus the source link.
///
/// Exactly one download record exists per key. The key is immutable for the
/// lifetime of the record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadKey {
    /// Identity of the article the download belongs to
    pub article_id: String,
    /// Source link (magnet URI or http(s) URL of a .torrent file)
    pub link: String,
}

impl DownloadKey {
    /// Create a new download key
    pub fn new(article_id: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            article_id: article_id.into(),
            link: link.into(),
        }
    }
}

impl std::fmt::Display for DownloadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.article_id, self.link)
    }
}

/// Opaque identifier of a running background task instance.
///
/// Handed back from [`schedule`](crate::TorrentDownloader::schedule) and used to
/// pause or cancel the task externally. Also persisted onto the download record
/// so observers can address the task after the fact.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandleId(pub String);

impl TaskHandleId {
    /// Generate a fresh unique handle id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for TaskHandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a download record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    /// Requested but no task has made progress yet
    Init,
    /// A task is (or was) actively driving the swarm session
    Downloading,
    /// Stopped with resume data saved; a re-schedule continues it
    Paused,
    /// Finished and moved to the output directory (terminal)
    Completed,
}

impl DownloadState {
    /// Convert integer state code to DownloadState
    pub fn from_i32(state: i32) -> Self {
        match state {
            0 => DownloadState::Init,
            1 => DownloadState::Downloading,
            2 => DownloadState::Paused,
            3 => DownloadState::Completed,
            _ => DownloadState::Init, // Default to Init for unknown state
        }
    }

    /// Convert DownloadState to integer state code
    pub fn to_i32(&self) -> i32 {
        match self {
            DownloadState::Init => 0,
            DownloadState::Downloading => 1,
            DownloadState::Paused => 2,
            DownloadState::Completed => 3,
        }
    }
}

/// How a task run resolved
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The torrent finished and its files were moved to the output directory
    Completed,
    /// The task was cancelled or hit a fatal error after persisting a Paused snapshot
    Paused,
    /// The task failed before it could do useful work
    Failed {
        /// Human-readable failure reason
        error: String,
    },
}

/// Terminal result of a single task run, surfaced to the caller for UI refresh
#[derive(Clone, Debug)]
pub struct TaskResult {
    /// How the run resolved
    pub outcome: TaskOutcome,
    /// Last persisted record state at resolution time
    pub state: DownloadState,
    /// Identity of the download
    pub key: DownloadKey,
}

/// Event emitted during the download lifecycle
///
/// Consumers subscribe via [`TorrentDownloader::subscribe`](crate::TorrentDownloader::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A task was scheduled for the link
    Queued {
        /// Owning article id
        article_id: String,
        /// Source link
        link: String,
    },

    /// Coalesced progress update
    Progress {
        /// Owning article id
        article_id: String,
        /// Source link
        link: String,
        /// Fraction complete in [0, 1]
        fraction: f32,
    },

    /// The download finished and was moved to the output directory
    Completed {
        /// Owning article id
        article_id: String,
        /// Source link
        link: String,
    },

    /// The task stopped with a resumable Paused snapshot
    Paused {
        /// Owning article id
        article_id: String,
        /// Source link
        link: String,
    },

    /// The task failed
    Failed {
        /// Owning article id
        article_id: String,
        /// Source link
        link: String,
        /// Failure reason for display
        error: String,
    },

    /// The download record and staged files were removed after a cancel
    Removed {
        /// Owning article id
        article_id: String,
        /// Source link
        link: String,
    },
}
