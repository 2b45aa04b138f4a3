//! # torrent-dl
//!
//! Embeddable torrent download lifecycle manager for feed applications.
//!
//! ## Design Philosophy
//!
//! torrent-dl is designed to be:
//! - **Resumable** - Every task persists enough state to continue after process death
//! - **Event-driven** - Consumers subscribe to lifecycle events, no polling required
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Engine-agnostic** - The BitTorrent engine lives behind a trait seam;
//!   a librqbit adapter ships behind the `rqbit` feature
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use torrent_dl::{Config, SessionFactory, TorrentDownloader};
//!
//! // With the `rqbit` feature enabled, `session::rqbit::RqbitSessionFactory`
//! // provides a production factory.
//! async fn run(sessions: Arc<dyn SessionFactory>) -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = TorrentDownloader::new(Config::default(), sessions).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     downloader
//!         .schedule("magnet:?xt=urn:btih:...", "article-1")
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Torrent source acquisition (magnet passthrough, .torrent fetching)
pub mod acquisition;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Progress notification collaborator
pub mod notify;
/// Torrent engine seam (session trait, alerts, adapters)
pub mod session;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, PersistenceConfig};
pub use db::Database;
pub use downloader::TorrentDownloader;
pub use error::{DatabaseError, DownloadError, Error, Result};
pub use notify::{NoOpNotifier, ProgressNotifier};
pub use session::{Alert, HandleStatus, SessionFactory, TorrentSession};
pub use types::{
    DownloadKey, DownloadState, Event, TaskHandleId, TaskOutcome, TaskResult,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal, then calls the downloader's `shutdown()`
/// method so every active task runs its pause protocol — flushing resume data
/// and detaching its session — before the process exits.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to Ctrl+C if
///   signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(downloader: TorrentDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        _ => {
            tracing::warn!("Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
