//! Engine seam: traits and alert types implemented by torrent session adapters.
//!
//! The library never speaks a BitTorrent protocol itself. Each running task
//! owns one [`TorrentSession`] created by the injected [`SessionFactory`]; the
//! session pushes [`Alert`]s that the task's event loop consumes one at a time.

use crate::error::Result;
use std::path::Path;

#[cfg(feature = "rqbit")]
pub mod rqbit;

/// Per-torrent snapshot attached to alerts while the torrent handle is valid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandleStatus {
    /// Fraction complete in [0, 1]
    pub progress: f32,
}

/// Asynchronous event pushed by the underlying torrent session.
///
/// A closed set: the task engine dispatches exhaustively over these variants.
/// Alerts carrying `status: None` came from a torrent whose handle was no
/// longer valid; progress must not be refreshed from them.
#[derive(Clone, Debug)]
pub enum Alert {
    /// The session reported a torrent error; fatal to the current run
    Error {
        /// Engine-provided failure message
        message: String,
    },

    /// The torrent finished downloading
    Finished {
        /// Final torrent name, if the engine knows it
        name: Option<String>,
    },

    /// Torrent metadata arrived (magnet links learn their name here)
    MetadataReceived {
        /// Torrent name from the metadata
        name: Option<String>,
    },

    /// The torrent moved to a new engine state ("downloading", "seeding", ...)
    StateChanged {
        /// Human-readable state description
        description: String,
        /// Handle snapshot, if the handle is valid
        status: Option<HandleStatus>,
    },

    /// Any other per-torrent alert (progress ticks, peer churn, ...)
    Torrent {
        /// Handle snapshot, if the handle is valid
        status: Option<HandleStatus>,
    },
}

/// One torrent swarm session, owned by exactly one running task.
///
/// Adapters wrap a real engine (e.g. librqbit behind the `rqbit` feature) or a
/// scripted double in tests. All methods are safe to call from the single task
/// that owns the session; `next_alert` is the task's one suspension point and
/// must be cancellation-safe.
#[async_trait::async_trait]
pub trait TorrentSession: Send + Sync {
    /// Start the session, warm-resuming from `resume_data` when provided.
    async fn start(&self, resume_data: Option<&[u8]>) -> Result<()>;

    /// Add a torrent by magnet URI, downloading into `save_dir`.
    async fn add_magnet(&self, uri: &str, save_dir: &Path) -> Result<()>;

    /// Add a torrent from a .torrent file on disk, downloading into `save_dir`.
    async fn add_torrent_file(&self, torrent_file: &Path, save_dir: &Path) -> Result<()>;

    /// Await the next alert. Returns `None` when the session has shut down and
    /// no further alerts will arrive.
    async fn next_alert(&self) -> Option<Alert>;

    /// Serialize the session's resume state into an opaque blob.
    async fn save_state(&self) -> Result<Vec<u8>>;

    /// Flush the torrent handle's resume data and detach it from the session.
    async fn detach(&self);

    /// Stop peer discovery and shut the session down cleanly.
    async fn stop(&self);

    /// Whether the session is currently running.
    fn is_running(&self) -> bool;

    /// Total bytes downloaded by this session so far.
    fn total_downloaded(&self) -> u64;
}

/// Creates one [`TorrentSession`] per scheduled task.
///
/// Injected into the downloader at construction; no global session state.
pub trait SessionFactory: Send + Sync {
    /// Create a fresh session for a task about to start.
    fn create(&self) -> Result<std::sync::Arc<dyn TorrentSession>>;
}
