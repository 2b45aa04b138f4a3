//! Foreground-presentation collaborator for progress updates.
//!
//! The downloader pushes coalesced progress to a [`ProgressNotifier`]; what the
//! notifier does with it (notifications, status bars, nothing) is its own
//! concern.

/// Receives progress updates for display purposes.
///
/// Implementations must be cheap and non-blocking: the task engine calls this
/// from its event loop.
pub trait ProgressNotifier: Send + Sync {
    /// Push one progress update.
    ///
    /// `title` is the torrent display name (or a generic placeholder before the
    /// name is known), `percent_text` a preformatted whole-percent string like
    /// "42%", and `fraction` the raw value in [0, 1].
    fn notify(&self, title: &str, percent_text: &str, fraction: f32);
}

/// No-op notifier used when the embedder does not care about progress display.
pub struct NoOpNotifier;

impl ProgressNotifier for NoOpNotifier {
    fn notify(&self, _title: &str, _percent_text: &str, _fraction: f32) {}
}
