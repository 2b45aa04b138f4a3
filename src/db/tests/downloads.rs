use crate::db::*;
use crate::types::{DownloadKey, DownloadState};
use tempfile::NamedTempFile;

async fn test_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

fn new_task(key: &DownloadKey) -> NewDownloadTask {
    NewDownloadTask {
        article_id: key.article_id.clone(),
        link: key.link.clone(),
        name: Some("Show.S01E01".to_string()),
        staging_dir_name: "1700000000000_42".to_string(),
        download_date: 1_700_000_000_000,
        size_bytes: 1024,
        progress: 0.25,
        state: DownloadState::Downloading.to_i32(),
        task_handle_id: Some("task-1".to_string()),
    }
}

#[tokio::test]
async fn test_upsert_and_get_download() {
    let (db, _guard) = test_db().await;
    let key = DownloadKey::new("a1", "magnet:?xt=urn:btih:abc");

    db.ensure_article(&key.article_id).await.unwrap();
    db.upsert_download(&new_task(&key)).await.unwrap();

    let task = db.get_download(&key).await.unwrap().unwrap();
    assert_eq!(task.name.as_deref(), Some("Show.S01E01"));
    assert_eq!(task.staging_dir_name, "1700000000000_42");
    assert_eq!(task.progress, 0.25);
    assert_eq!(task.state, DownloadState::Downloading.to_i32());
    assert_eq!(task.task_handle_id.as_deref(), Some("task-1"));

    db.close().await;
}

#[tokio::test]
async fn test_upsert_keeps_identity_fields_on_conflict() {
    let (db, _guard) = test_db().await;
    let key = DownloadKey::new("a1", "magnet:?xt=urn:btih:abc");

    db.ensure_article(&key.article_id).await.unwrap();
    db.upsert_download(&new_task(&key)).await.unwrap();

    // Second upsert with a different staging dir must not clobber the original
    let mut second = new_task(&key);
    second.staging_dir_name = "9999999999999_1".to_string();
    second.name = Some("Show.S01E01.1080p".to_string());
    second.progress = 0.5;
    db.upsert_download(&second).await.unwrap();

    let task = db.get_download(&key).await.unwrap().unwrap();
    assert_eq!(task.staging_dir_name, "1700000000000_42");
    assert_eq!(task.name.as_deref(), Some("Show.S01E01.1080p"));
    assert_eq!(task.progress, 0.5);

    db.close().await;
}

#[tokio::test]
async fn test_field_getters_return_none_without_row() {
    let (db, _guard) = test_db().await;
    let key = DownloadKey::new("a1", "magnet:?xt=urn:btih:abc");

    assert!(db.get_download_state(&key).await.unwrap().is_none());
    assert!(db.get_download_name(&key).await.unwrap().is_none());
    assert!(db.get_download_progress(&key).await.unwrap().is_none());
    assert!(db.get_download_size(&key).await.unwrap().is_none());
    assert!(db.get_staging_dir_name(&key).await.unwrap().is_none());
    assert!(!db.contains_download(&key).await.unwrap());

    db.close().await;
}

#[tokio::test]
async fn test_field_updates() {
    let (db, _guard) = test_db().await;
    let key = DownloadKey::new("a1", "magnet:?xt=urn:btih:abc");

    db.ensure_article(&key.article_id).await.unwrap();
    db.upsert_download(&new_task(&key)).await.unwrap();

    db.update_download_name(&key, "Renamed").await.unwrap();
    db.update_download_progress(&key, 0.75).await.unwrap();
    db.update_download_size(&key, 4096).await.unwrap();
    db.update_download_description(&key, Some("seeding"))
        .await
        .unwrap();
    db.update_download_state(&key, DownloadState::Paused)
        .await
        .unwrap();
    db.update_task_handle(&key, "task-2").await.unwrap();

    let task = db.get_download(&key).await.unwrap().unwrap();
    assert_eq!(task.name.as_deref(), Some("Renamed"));
    assert_eq!(task.progress, 0.75);
    assert_eq!(task.size_bytes, 4096);
    assert_eq!(task.description.as_deref(), Some("seeding"));
    assert_eq!(task.state, DownloadState::Paused.to_i32());
    assert_eq!(task.task_handle_id.as_deref(), Some("task-2"));

    db.close().await;
}

#[tokio::test]
async fn test_delete_download() {
    let (db, _guard) = test_db().await;
    let key = DownloadKey::new("a1", "magnet:?xt=urn:btih:abc");

    db.ensure_article(&key.article_id).await.unwrap();
    db.upsert_download(&new_task(&key)).await.unwrap();
    db.delete_download(&key).await.unwrap();

    assert!(db.get_download(&key).await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
async fn test_article_delete_cascades_to_downloads() {
    let (db, _guard) = test_db().await;
    let key = DownloadKey::new("a1", "magnet:?xt=urn:btih:abc");

    db.ensure_article(&key.article_id).await.unwrap();
    db.upsert_download(&new_task(&key)).await.unwrap();

    db.delete_article(&key.article_id).await.unwrap();

    assert!(db.get_download(&key).await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
async fn test_list_downloads_newest_first() {
    let (db, _guard) = test_db().await;

    db.ensure_article("a1").await.unwrap();
    for i in 0..3 {
        let key = DownloadKey::new("a1", format!("magnet:?xt=urn:btih:{i}"));
        let mut task = new_task(&key);
        task.download_date = i;
        db.upsert_download(&task).await.unwrap();
    }

    let downloads = db.list_downloads().await.unwrap();
    assert_eq!(downloads.len(), 3);
    assert_eq!(downloads[0].link, "magnet:?xt=urn:btih:2");
    assert_eq!(downloads[2].link, "magnet:?xt=urn:btih:0");

    db.close().await;
}
