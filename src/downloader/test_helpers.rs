//! Shared test helpers: a scripted torrent session and downloader builders.

use crate::config::Config;
use crate::error::Result;
use crate::session::{Alert, SessionFactory, TorrentSession};
use crate::types::{DownloadKey, TaskHandleId};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tempfile::tempdir;

use super::TorrentDownloader;
use super::download_task::TaskContext;

/// A torrent session that replays a scripted sequence of alerts.
///
/// `add_magnet`/`add_torrent_file` drop the configured payload files into the
/// save dir, standing in for the swarm writing pieces. Once the script is
/// exhausted `next_alert` blocks forever (like a quiet swarm), unless
/// `hang_up_when_done` makes it return `None` instead.
pub(crate) struct ScriptedSession {
    alerts: tokio::sync::Mutex<VecDeque<Alert>>,
    /// Files written into the save dir when the torrent is added
    pub(crate) payload: Vec<(String, Vec<u8>)>,
    pub(crate) hang_up_when_done: bool,
    pub(crate) resume_blob: Vec<u8>,
    pub(crate) started: AtomicBool,
    pub(crate) started_with: std::sync::Mutex<Option<Vec<u8>>>,
    pub(crate) added: std::sync::Mutex<Vec<(String, PathBuf)>>,
    pub(crate) detached: AtomicBool,
    pub(crate) stopped: AtomicBool,
    running: AtomicBool,
    total: AtomicU64,
}

impl ScriptedSession {
    pub(crate) fn new(alerts: Vec<Alert>) -> Self {
        Self {
            alerts: tokio::sync::Mutex::new(alerts.into()),
            payload: vec![("payload.mkv".to_string(), b"pieces".to_vec())],
            hang_up_when_done: false,
            resume_blob: b"resume-bytes".to_vec(),
            started: AtomicBool::new(false),
            started_with: std::sync::Mutex::new(None),
            added: std::sync::Mutex::new(Vec::new()),
            detached: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            running: AtomicBool::new(false),
            total: AtomicU64::new(0),
        }
    }

    pub(crate) fn with_total(self, total: u64) -> Self {
        self.total.store(total, Ordering::SeqCst);
        self
    }
}

#[async_trait::async_trait]
impl TorrentSession for ScriptedSession {
    async fn start(&self, resume_data: Option<&[u8]>) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        *self.started_with.lock().unwrap() = resume_data.map(|d| d.to_vec());
        Ok(())
    }

    async fn add_magnet(&self, uri: &str, save_dir: &Path) -> Result<()> {
        self.added
            .lock()
            .unwrap()
            .push((uri.to_string(), save_dir.to_path_buf()));
        for (name, bytes) in &self.payload {
            std::fs::write(save_dir.join(name), bytes)?;
        }
        Ok(())
    }

    async fn add_torrent_file(&self, torrent_file: &Path, save_dir: &Path) -> Result<()> {
        self.added.lock().unwrap().push((
            torrent_file.to_string_lossy().into_owned(),
            save_dir.to_path_buf(),
        ));
        for (name, bytes) in &self.payload {
            std::fs::write(save_dir.join(name), bytes)?;
        }
        Ok(())
    }

    async fn next_alert(&self) -> Option<Alert> {
        let next = self.alerts.lock().await.pop_front();
        match next {
            Some(alert) => Some(alert),
            None if self.hang_up_when_done => None,
            None => {
                // Quiet swarm: block until cancelled
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn save_state(&self) -> Result<Vec<u8>> {
        Ok(self.resume_blob.clone())
    }

    async fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn total_downloaded(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }
}

/// Factory handing out pre-built sessions, one per schedule() call.
pub(crate) struct ScriptedFactory {
    sessions: std::sync::Mutex<VecDeque<Arc<ScriptedSession>>>,
}

impl ScriptedFactory {
    pub(crate) fn new(sessions: Vec<Arc<ScriptedSession>>) -> Self {
        Self {
            sessions: std::sync::Mutex::new(sessions.into()),
        }
    }
}

impl SessionFactory for ScriptedFactory {
    fn create(&self) -> Result<Arc<dyn TorrentSession>> {
        let session = self
            .sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Arc::new(ScriptedSession::new(Vec::new())));
        Ok(session)
    }
}

/// Config rooted inside a fresh temp dir. Grace delay is kept tiny so cancel
/// tests finish quickly.
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.output_dir = root.join("downloads");
    config.download.staging_dir = root.join("downloading");
    config.download.torrent_file_dir = root.join("torrents");
    config.download.cleanup_grace_ms = 20;
    config.persistence.database_path = root.join("test.db");
    config
}

/// Build a downloader whose factory will hand out the given sessions in order.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(
    sessions: Vec<Arc<ScriptedSession>>,
) -> (TorrentDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let downloader = TorrentDownloader::new(config, Arc::new(ScriptedFactory::new(sessions)))
        .await
        .unwrap();
    (downloader, temp_dir)
}

/// Build a TaskContext for driving run_download_task directly.
pub(crate) async fn test_task_context(
    downloader: &TorrentDownloader,
    key: &DownloadKey,
    session: Arc<ScriptedSession>,
) -> (TaskContext, tokio_util::sync::CancellationToken) {
    downloader.db.ensure_article(&key.article_id).await.unwrap();
    let cancel = tokio_util::sync::CancellationToken::new();
    let ctx = TaskContext {
        key: key.clone(),
        handle_id: TaskHandleId::generate(),
        db: downloader.db.clone(),
        config: downloader.config.clone(),
        http: downloader.http.clone(),
        session,
        cancel: cancel.clone(),
        event_tx: downloader.event_tx.clone(),
        notifier: downloader.notifier.clone(),
    };
    (ctx, cancel)
}
