//! librqbit-backed [`TorrentSession`] adapter (enabled with the `rqbit` feature).
//!
//! librqbit has no push-style alert API, so the adapter polls torrent stats on
//! an interval and synthesizes the [`Alert`] stream from observed changes. The
//! resume blob is a small serialized snapshot of the torrent identity; on a
//! warm start the engine re-attaches and re-verifies the pieces already on
//! disk in the reused staging directory.

use crate::error::{Error, Result};
use crate::session::{Alert, HandleStatus, SessionFactory, TorrentSession};
use librqbit::api::Api;
use librqbit::{AddTorrent, AddTorrentOptions, AddTorrentResponse, Session};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

/// Poll interval for synthesizing alerts from torrent stats
const STATS_POLL_INTERVAL: Duration = Duration::from_millis(750);

/// Serialized resume snapshot stored as the opaque resume blob
#[derive(Debug, Serialize, Deserialize)]
struct ResumeSnapshot {
    info_hash: String,
}

struct Inner {
    api: Option<Api>,
    torrent_id: Option<usize>,
    info_hash: Option<String>,
}

/// One librqbit session driving a single torrent.
pub struct RqbitSession {
    inner: Mutex<Inner>,
    alert_tx: mpsc::Sender<Alert>,
    alert_rx: Mutex<mpsc::Receiver<Alert>>,
    running: AtomicBool,
    total_downloaded: Arc<AtomicU64>,
}

impl RqbitSession {
    /// Create a session that has not been started yet.
    pub fn new() -> Self {
        let (alert_tx, alert_rx) = mpsc::channel(64);
        Self {
            inner: Mutex::new(Inner {
                api: None,
                torrent_id: None,
                info_hash: None,
            }),
            alert_tx,
            alert_rx: Mutex::new(alert_rx),
            running: AtomicBool::new(false),
            total_downloaded: Arc::new(AtomicU64::new(0)),
        }
    }

    async fn add(&self, add: AddTorrent<'static>, save_dir: &Path) -> Result<()> {
        let session = Session::new(save_dir.to_path_buf())
            .await
            .map_err(|e| Error::Engine(format!("failed to create session: {}", e)))?;
        let api = Api::new(session.clone(), None);

        let opts = AddTorrentOptions {
            overwrite: true,
            ..Default::default()
        };
        let response = session
            .add_torrent(add, Some(opts))
            .await
            .map_err(|e| Error::Engine(format!("failed to add torrent: {}", e)))?;

        let (torrent_id, info_hash) = match response {
            AddTorrentResponse::Added(id, handle)
            | AddTorrentResponse::AlreadyManaged(id, handle) => {
                (id, handle.info_hash().as_string())
            }
            AddTorrentResponse::ListOnly(_) => {
                return Err(Error::Engine(
                    "unexpected list-only response from engine".to_string(),
                ));
            }
        };

        {
            let mut inner = self.inner.lock().await;
            inner.api = Some(api.clone());
            inner.torrent_id = Some(torrent_id);
            inner.info_hash = Some(info_hash);
        }

        spawn_alert_loop(
            api,
            torrent_id,
            self.alert_tx.clone(),
            Arc::clone(&self.total_downloaded),
        );
        Ok(())
    }
}

impl Default for RqbitSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TorrentSession for RqbitSession {
    async fn start(&self, resume_data: Option<&[u8]>) -> Result<()> {
        // The snapshot only identifies the torrent; librqbit re-verifies the
        // pieces already present in the reused staging directory on add.
        if let Some(bytes) = resume_data
            && !bytes.is_empty()
        {
            let snapshot: ResumeSnapshot = serde_json::from_slice(bytes)?;
            self.inner.lock().await.info_hash = Some(snapshot.info_hash);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn add_magnet(&self, uri: &str, save_dir: &Path) -> Result<()> {
        self.add(AddTorrent::from_url(uri.to_string()), save_dir).await
    }

    async fn add_torrent_file(&self, torrent_file: &Path, save_dir: &Path) -> Result<()> {
        let bytes = tokio::fs::read(torrent_file).await?;
        self.add(AddTorrent::from_bytes(bytes), save_dir).await
    }

    async fn next_alert(&self) -> Option<Alert> {
        self.alert_rx.lock().await.recv().await
    }

    async fn save_state(&self) -> Result<Vec<u8>> {
        let inner = self.inner.lock().await;
        match &inner.info_hash {
            Some(info_hash) => Ok(serde_json::to_vec(&ResumeSnapshot {
                info_hash: info_hash.clone(),
            })?),
            None => Ok(Vec::new()),
        }
    }

    async fn detach(&self) {
        let (api, torrent_id) = {
            let inner = self.inner.lock().await;
            (inner.api.clone(), inner.torrent_id)
        };
        if let (Some(api), Some(id)) = (api, torrent_id) {
            if let Err(e) = api.api_torrent_action_pause(id.into()).await {
                tracing::warn!(error = %e, "failed to pause torrent handle");
            }
            if let Err(e) = api.api_torrent_action_forget(id.into()).await {
                tracing::warn!(error = %e, "failed to detach torrent handle");
            }
        }
    }

    async fn stop(&self) {
        let api = self.inner.lock().await.api.clone();
        if let Some(api) = api {
            api.session().stop().await;
        }
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn total_downloaded(&self) -> u64 {
        self.total_downloaded.load(Ordering::SeqCst)
    }
}

/// Poll torrent stats and translate observed changes into alerts.
fn spawn_alert_loop(
    api: Api,
    torrent_id: usize,
    alert_tx: mpsc::Sender<Alert>,
    total_downloaded: Arc<AtomicU64>,
) {
    tokio::spawn(async move {
        let mut last_state: Option<String> = None;
        let mut metadata_seen = false;

        loop {
            tokio::time::sleep(STATS_POLL_INTERVAL).await;

            let stats = match api.api_stats_v1(torrent_id.into()) {
                Ok(stats) => stats,
                // Stats lookup fails once the torrent is forgotten; stop quietly.
                Err(_) => break,
            };

            if let Some(message) = stats.error {
                let _ = alert_tx.send(Alert::Error { message }).await;
                break;
            }

            total_downloaded.store(stats.progress_bytes, Ordering::SeqCst);
            let progress = if stats.total_bytes > 0 {
                stats.progress_bytes as f32 / stats.total_bytes as f32
            } else {
                0.0
            };
            let status = Some(HandleStatus { progress });

            if !metadata_seen && stats.total_bytes > 0 {
                metadata_seen = true;
                let name = api
                    .api_torrent_details(torrent_id.into())
                    .ok()
                    .and_then(|d| d.name);
                if alert_tx.send(Alert::MetadataReceived { name }).await.is_err() {
                    break;
                }
            }

            let state = format!("{:?}", stats.state).to_lowercase();
            if last_state.as_deref() != Some(state.as_str()) {
                last_state = Some(state.clone());
                if alert_tx
                    .send(Alert::StateChanged {
                        description: state,
                        status,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }

            if stats.finished {
                let name = api
                    .api_torrent_details(torrent_id.into())
                    .ok()
                    .and_then(|d| d.name);
                let _ = alert_tx.send(Alert::Finished { name }).await;
                break;
            }

            if alert_tx.send(Alert::Torrent { status }).await.is_err() {
                break;
            }
        }
    });
}

/// Factory producing one [`RqbitSession`] per task.
pub struct RqbitSessionFactory;

impl SessionFactory for RqbitSessionFactory {
    fn create(&self) -> Result<Arc<dyn TorrentSession>> {
        Ok(Arc::new(RqbitSession::new()))
    }
}
