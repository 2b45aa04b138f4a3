//! Configuration types for torrent-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Download behavior configuration (directories, timeouts, cleanup)
///
/// Groups settings related to where downloads are staged and stored and how
/// the supervisor times its deferred cleanup. Used as a nested sub-config
/// within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Final output directory completed downloads are moved into (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Root directory holding one staging subdirectory per in-progress download
    /// (default: "./downloading")
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Temp directory for .torrent files fetched over HTTP (default: "./torrents")
    #[serde(default = "default_torrent_file_dir")]
    pub torrent_file_dir: PathBuf,

    /// Timeout for fetching a .torrent payload, in seconds (default: 30)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Grace delay between a cancelled task finishing and its record/files being
    /// deleted, in milliseconds (default: 2000)
    ///
    /// Lets any last in-flight persistence write land before the row is removed,
    /// so a racing write cannot resurrect it.
    #[serde(default = "default_cleanup_grace_ms")]
    pub cleanup_grace_ms: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            staging_dir: default_staging_dir(),
            torrent_file_dir: default_torrent_file_dir(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            cleanup_grace_ms: default_cleanup_grace_ms(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path (default: "./torrent-dl.db")
    ///
    /// May point at a database shared with the embedding feed application; the
    /// download tables reference its `articles` table.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for [`TorrentDownloader`](crate::TorrentDownloader)
///
/// Download fields are flattened for a flat JSON/TOML format; persistence is a
/// nested sub-config.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings (directories, timeouts, cleanup)
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Data storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("./downloading")
}

fn default_torrent_file_dir() -> PathBuf {
    PathBuf::from("./torrents")
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_cleanup_grace_ms() -> u64 {
    2000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./torrent-dl.db")
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.download.output_dir, PathBuf::from("./downloads"));
        assert_eq!(config.download.cleanup_grace_ms, 2000);
        assert_eq!(
            config.persistence.database_path,
            PathBuf::from("./torrent-dl.db")
        );
    }

    #[test]
    fn deserializes_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.download.fetch_timeout_secs, 30);
    }

    #[test]
    fn deserializes_flattened_download_fields() {
        let config: Config =
            serde_json::from_str(r#"{"output_dir": "/media/videos", "cleanup_grace_ms": 500}"#)
                .unwrap();
        assert_eq!(config.download.output_dir, PathBuf::from("/media/videos"));
        assert_eq!(config.download.cleanup_grace_ms, 500);
    }
}
