//! Torrent source acquisition.
//!
//! Resolves a download link into something the engine can consume: magnet URIs
//! pass through untouched, http(s) links are fetched into the torrent-file temp
//! directory first. Any other scheme is rejected up front.

use crate::error::{DownloadError, Error, Result};
use crate::utils::file_name_from_link;
use std::path::{Path, PathBuf};

/// A resolved torrent source ready to hand to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentSource {
    /// Magnet URI, passed to the engine's add-by-URI operation
    Magnet(String),
    /// Path to a fetched .torrent file, passed to add-by-file
    TorrentFile(PathBuf),
}

/// Whether the link scheme is one the downloader accepts
pub fn is_supported_link(link: &str) -> bool {
    link.starts_with("magnet:") || link.starts_with("http:") || link.starts_with("https:")
}

/// Resolve a link into a [`TorrentSource`]
///
/// For http(s) links the .torrent payload is downloaded into
/// `torrent_file_dir` under a sanitized filename derived from the link.
pub async fn resolve_source(
    http: &reqwest::Client,
    link: &str,
    torrent_file_dir: &Path,
) -> Result<TorrentSource> {
    if link.starts_with("magnet:") {
        return Ok(TorrentSource::Magnet(link.to_string()));
    }

    if link.starts_with("http:") || link.starts_with("https:") {
        let path = fetch_torrent_file(http, link, torrent_file_dir).await?;
        return Ok(TorrentSource::TorrentFile(path));
    }

    Err(Error::Download(DownloadError::UnsupportedLink {
        link: link.to_string(),
    }))
}

/// Fetch a .torrent payload over HTTP(S) into `torrent_file_dir`
async fn fetch_torrent_file(
    http: &reqwest::Client,
    link: &str,
    torrent_file_dir: &Path,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(torrent_file_dir)
        .await
        .map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create torrent file directory '{}': {}",
                    torrent_file_dir.display(),
                    e
                ),
            ))
        })?;

    let response = http
        .get(link)
        .send()
        .await?
        .error_for_status()?;

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(Error::Download(DownloadError::InvalidTorrent {
            link: link.to_string(),
            reason: "empty response body".to_string(),
        }));
    }

    let path = torrent_file_dir.join(file_name_from_link(link));
    tokio::fs::write(&path, &bytes).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to write torrent file '{}': {}", path.display(), e),
        ))
    })?;

    tracing::debug!(link, path = %path.display(), bytes = bytes.len(), "Fetched torrent file");

    Ok(path)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn supported_link_schemes() {
        assert!(is_supported_link("magnet:?xt=urn:btih:abc"));
        assert!(is_supported_link("http://example.com/a.torrent"));
        assert!(is_supported_link("https://example.com/a.torrent"));
        assert!(!is_supported_link("ftp://example.com/a.torrent"));
        assert!(!is_supported_link("file:///a.torrent"));
    }

    #[tokio::test]
    async fn magnet_links_pass_through() {
        let http = reqwest::Client::new();
        let dir = tempdir().unwrap();

        let source = resolve_source(&http, "magnet:?xt=urn:btih:abc", dir.path())
            .await
            .unwrap();

        assert_eq!(
            source,
            TorrentSource::Magnet("magnet:?xt=urn:btih:abc".to_string())
        );
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected() {
        let http = reqwest::Client::new();
        let dir = tempdir().unwrap();

        let err = resolve_source(&http, "ftp://example.com/a.torrent", dir.path())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Download(DownloadError::UnsupportedLink { .. })
        ));
    }

    #[tokio::test]
    async fn http_link_is_fetched_to_disk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed/Show%20S01E01.torrent"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"d8:announce0:e".to_vec()))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let dir = tempdir().unwrap();
        let link = format!("{}/feed/Show%20S01E01.torrent", server.uri());

        let source = resolve_source(&http, &link, dir.path()).await.unwrap();

        match source {
            TorrentSource::TorrentFile(file) => {
                assert_eq!(
                    file.file_name().unwrap().to_str().unwrap(),
                    "Show S01E01.torrent"
                );
                let contents = std::fs::read(&file).unwrap();
                assert_eq!(contents, b"d8:announce0:e");
            }
            other => panic!("expected torrent file, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_error_status_fails_the_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let dir = tempdir().unwrap();
        let link = format!("{}/missing.torrent", server.uri());

        let err = resolve_source(&http, &link, dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(Vec::new()))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let dir = tempdir().unwrap();
        let link = format!("{}/empty.torrent", server.uri());

        let err = resolve_source(&http, &link, dir.path()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Download(DownloadError::InvalidTorrent { .. })
        ));
    }
}
