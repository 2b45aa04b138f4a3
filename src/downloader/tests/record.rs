//! Write-coalescing tests for the record writer.
//!
//! The sync helpers report whether they actually issued a write, which lets
//! these tests count writes against alert sequences with repeated values.

use crate::db::Database;
use crate::downloader::record::RecordWriter;
use crate::types::{DownloadKey, DownloadState, TaskHandleId};
use std::sync::Arc;
use tempfile::NamedTempFile;

async fn writer() -> (RecordWriter, Arc<Database>, DownloadKey, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Arc::new(Database::new(temp_file.path()).await.unwrap());
    let key = DownloadKey::new("a1", "magnet:?xt=urn:btih:ABC");
    db.ensure_article(&key.article_id).await.unwrap();

    let mut writer = RecordWriter::new(db.clone(), key.clone(), TaskHandleId::generate());
    writer.staging_dir_name = "staging_1".to_string();
    (writer, db, key, temp_file)
}

#[tokio::test]
async fn progress_writes_only_on_change() {
    let (mut writer, db, key, _guard) = writer().await;

    // First write self-heals the missing row with a full upsert
    assert!(writer.sync_progress(0.1, 10).await.unwrap());
    // Identical repeated alerts are coalesced away
    assert!(!writer.sync_progress(0.1, 10).await.unwrap());
    assert!(!writer.sync_progress(0.1, 10).await.unwrap());
    // Changes go through
    assert!(writer.sync_progress(0.4, 20).await.unwrap());
    assert!(writer.sync_progress(1.0, 20).await.unwrap());

    assert_eq!(db.get_download_progress(&key).await.unwrap(), Some(1.0));
}

#[tokio::test]
async fn name_writes_once_per_distinct_value() {
    let (mut writer, db, key, _guard) = writer().await;

    assert!(writer.sync_name(Some("Show.S01E01".to_string()), 0).await.unwrap());
    assert!(!writer.sync_name(Some("Show.S01E01".to_string()), 0).await.unwrap());
    // A blank update keeps the known name and issues nothing
    assert!(!writer.sync_name(Some("  ".to_string()), 0).await.unwrap());
    assert!(!writer.sync_name(None, 0).await.unwrap());
    // A rename goes through
    assert!(
        writer
            .sync_name(Some("Show.S01E01.1080p".to_string()), 0)
            .await
            .unwrap()
    );

    assert_eq!(
        db.get_download_name(&key).await.unwrap().as_deref(),
        Some("Show.S01E01.1080p")
    );
}

#[tokio::test]
async fn description_writes_once_per_distinct_value() {
    let (mut writer, db, key, _guard) = writer().await;

    assert!(
        writer
            .sync_description(Some("downloading".to_string()), 0)
            .await
            .unwrap()
    );
    assert!(
        !writer
            .sync_description(Some("downloading".to_string()), 0)
            .await
            .unwrap()
    );
    assert!(
        writer
            .sync_description(Some("seeding".to_string()), 0)
            .await
            .unwrap()
    );

    let task = db.get_download(&key).await.unwrap().unwrap();
    assert_eq!(task.description.as_deref(), Some("seeding"));
}

#[tokio::test]
async fn size_writes_only_on_change() {
    let (mut writer, db, key, _guard) = writer().await;

    // Seed the row
    assert!(writer.sync_progress(0.1, 10).await.unwrap());

    assert!(!writer.sync_size(10).await.unwrap());
    assert!(writer.sync_size(50).await.unwrap());
    assert!(!writer.sync_size(50).await.unwrap());

    assert_eq!(db.get_download_size(&key).await.unwrap(), Some(50));
}

#[tokio::test]
async fn missing_row_is_self_healed_with_full_upsert() {
    let (mut writer, db, key, _guard) = writer().await;

    assert!(writer.sync_progress(0.2, 10).await.unwrap());

    // The row vanishes underneath the writer (article cascade)
    db.delete_download(&key).await.unwrap();

    // The next field write recreates the full record
    assert!(
        writer
            .sync_description(Some("checking files".to_string()), 10)
            .await
            .unwrap()
    );
    let task = db.get_download(&key).await.unwrap().unwrap();
    assert_eq!(task.staging_dir_name, "staging_1");
    assert_eq!(task.progress, 0.2);

    // Name falls back to a sanitized link-derived default until metadata arrives
    assert!(task.name.is_some());
}

#[tokio::test]
async fn writes_for_deleted_article_are_swallowed() {
    let (mut writer, db, key, _guard) = writer().await;

    // Deleting the article cascades the row away; subsequent upserts violate
    // the foreign key and must be swallowed, not propagated
    db.delete_article(&key.article_id).await.unwrap();

    assert!(writer.sync_progress(0.5, 10).await.unwrap());
    writer
        .persist_state_and_resume(DownloadState::Paused, b"blob")
        .await
        .unwrap();

    assert!(db.get_download(&key).await.unwrap().is_none());
    assert!(db.get_resume_data(&key).await.unwrap().is_none());
}
