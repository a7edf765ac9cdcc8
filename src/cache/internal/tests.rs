use std::io::ErrorKind;

use mocks::{CacheWrite, TestCacheIo};
use crate::data::{NotebookRef, SyncState};
use super::*;

mod mocks;

fn make_cache() -> CacheImpl<TestCacheIo> {
    CacheImpl::new_internal(Path::new("/cache"), TestCacheIo::new())
}

fn sample_notebook(id: u128, name: &str) -> Notebook {
    Notebook {
        id: Uuid::from_u128(id),
        name: name.into(),
        parent_folder_id: "folder-1".into(),
        created_at: UtcDateTime::from_unix_timestamp(42).unwrap(),
        state: SyncState::Clean,
        deleted: false,
    }
}

fn sample_note(id: u128, title: &str) -> Note {
    Note {
        id: Uuid::from_u128(id),
        title: title.into(),
        notebook_id: NotebookRef::Unfiled,
        is_password_protected: false,
        created_at: UtcDateTime::from_unix_timestamp(42).unwrap(),
        modified_at: UtcDateTime::from_unix_timestamp(43).unwrap(),
        checksum: "00ff00ff00ff00ff".into(),
        state: SyncState::Clean,
        remote_file_id: None,
    }
}

#[tokio::test]
async fn empty_cache_yields_empty_snapshots() {
    let cache = make_cache();
    assert!(cache.notebooks().await.expect("read failed").is_empty());
    assert!(cache.notes().await.expect("read failed").is_empty());
    assert!(cache.last_sync_time().await.expect("read failed").is_none());
    assert!(cache.load_session().await.expect("read failed").is_none());
}

#[tokio::test]
async fn notebooks_round_trip() {
    let cache = make_cache();
    let notebooks =
        vec![sample_notebook(1, "Work"), sample_notebook(2, "Home")];
    cache.save_notebooks(&notebooks).await.expect("save failed");
    assert_eq!(cache.notebooks().await.expect("read failed"), notebooks);
}

#[tokio::test]
async fn notes_round_trip() {
    let cache = make_cache();
    let notes = vec![sample_note(1, "first"), sample_note(2, "second")];
    cache.save_notes(&notes).await.expect("save failed");
    assert_eq!(cache.notes().await.expect("read failed"), notes);
}

#[tokio::test]
async fn save_notes_replaces_everything() {
    let cache = make_cache();
    cache.save_notes(&[sample_note(1, "doomed")]).await
        .expect("save failed");
    cache.save_notes(&[]).await.expect("save failed");
    assert!(cache.notes().await.expect("read failed").is_empty());
}

#[tokio::test]
async fn failed_write_preserves_committed_state() {
    let cache = make_cache();
    let committed = vec![sample_note(1, "committed")];
    cache.save_notes(&committed).await.expect("save failed");

    cache.io.set_write_error(Some(ErrorKind::Other));
    cache.save_notes(&[sample_note(2, "lost")]).await
        .expect_err("should fail");
    cache.io.set_write_error(None);

    assert_eq!(cache.notes().await.expect("read failed"), committed);
}

#[tokio::test]
async fn quota_error_is_distinct() {
    let cache = make_cache();
    cache.io.set_write_error(Some(ErrorKind::StorageFull));
    let err = cache.save_notes(&[sample_note(1, "too big")]).await
        .expect_err("should fail");
    assert!(matches!(err, CacheError::Quota), "wrong error type: {err:#?}");
}

#[tokio::test]
async fn writes_go_through_a_shadow_file() {
    let cache = make_cache();
    cache.save_notes(&[sample_note(1, "note")]).await.expect("save failed");
    let writes_to_final_path = cache.io.events()
        .iter()
        .filter(|event| matches!(
            event,
            CacheWrite::Write { path } if path == Path::new("/cache/notes.json")
        ))
        .count();
    assert_eq!(writes_to_final_path, 0);
    assert!(
        cache.io.events().iter().any(|event| matches!(
            event,
            CacheWrite::Rename { to, .. } if to == Path::new("/cache/notes.json")
        ))
    );
}

#[tokio::test]
async fn syncing_state_loads_as_dirty() {
    let cache = make_cache();
    let mut note = sample_note(1, "mid-flight");
    note.state = SyncState::Syncing;
    cache.save_notes(&[note]).await.expect("save failed");
    let notes = cache.notes().await.expect("read failed");
    assert_eq!(notes[0].state, SyncState::Dirty);
}

#[tokio::test]
async fn note_content_round_trip() {
    let cache = make_cache();
    let id = Uuid::from_u128(7);
    cache.save_note_content(id, b"plain body", false).await
        .expect("save failed");
    let (content, is_secret) = cache.note_content(id).await
        .expect("read failed")
        .expect("content missing");
    assert_eq!(content, b"plain body");
    assert!(!is_secret);
}

#[tokio::test]
async fn secret_content_keeps_its_flag() {
    let cache = make_cache();
    let id = Uuid::from_u128(7);
    cache.save_note_content(id, b"ciphertext", true).await
        .expect("save failed");
    let (content, is_secret) = cache.note_content(id).await
        .expect("read failed")
        .expect("content missing");
    assert_eq!(content, b"ciphertext");
    assert!(is_secret);
}

#[tokio::test]
async fn protection_change_replaces_the_old_variant() {
    let cache = make_cache();
    let id = Uuid::from_u128(7);
    cache.save_note_content(id, b"plain", false).await.expect("save failed");
    cache.save_note_content(id, b"cipher", true).await.expect("save failed");
    let (content, is_secret) = cache.note_content(id).await
        .expect("read failed")
        .expect("content missing");
    assert_eq!(content, b"cipher");
    assert!(is_secret);
}

#[tokio::test]
async fn missing_content_is_none() {
    let cache = make_cache();
    assert!(
        cache.note_content(Uuid::from_u128(9)).await
            .expect("read failed")
            .is_none()
    );
}

#[tokio::test]
async fn delete_note_content_is_idempotent() {
    let cache = make_cache();
    let id = Uuid::from_u128(7);
    cache.save_note_content(id, b"body", false).await.expect("save failed");
    cache.delete_note_content(id).await.expect("delete failed");
    assert!(cache.note_content(id).await.expect("read failed").is_none());
    cache.delete_note_content(id).await.expect("delete failed");
}

#[tokio::test]
async fn sync_watermark_round_trip() {
    let cache = make_cache();
    let timestamp = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
    cache.set_last_sync_time(timestamp).await.expect("save failed");
    assert_eq!(
        cache.last_sync_time().await.expect("read failed"),
        Some(timestamp),
    );
}

#[tokio::test]
async fn session_round_trip() {
    let cache = make_cache();
    let session = Session {
        access_token: "token-1".into(),
        expires_at: UtcDateTime::from_unix_timestamp(2_000_000_000).unwrap(),
        user: crate::data::UserProfile {
            id: "user-1".into(),
            name: "Test User".into(),
            picture: None,
        },
    };
    cache.store_session(&session).await.expect("save failed");
    assert_eq!(
        cache.load_session().await.expect("read failed"),
        Some(session),
    );

    cache.clear_session().await.expect("clear failed");
    assert!(cache.load_session().await.expect("read failed").is_none());
}

#[tokio::test]
async fn session_and_watermark_do_not_clobber_each_other() {
    let cache = make_cache();
    let timestamp = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
    cache.set_last_sync_time(timestamp).await.expect("save failed");
    let session = Session {
        access_token: "token-1".into(),
        expires_at: UtcDateTime::from_unix_timestamp(2_000_000_000).unwrap(),
        user: crate::data::UserProfile {
            id: "user-1".into(),
            name: "Test User".into(),
            picture: None,
        },
    };
    cache.store_session(&session).await.expect("save failed");
    cache.clear_session().await.expect("clear failed");
    assert_eq!(
        cache.last_sync_time().await.expect("read failed"),
        Some(timestamp),
    );
}

#[tokio::test]
async fn init_runs_once() {
    let cache = make_cache();
    cache.init().await.expect("init failed");
    cache.init().await.expect("init failed");
    cache.notes().await.expect("read failed");
    let dir_creations = cache.io.events()
        .iter()
        .filter(|event| matches!(event, CacheWrite::CreateDir { .. }))
        .count();
    assert_eq!(dir_creations, 2);
}

#[tokio::test]
async fn production_io_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir creation failed");
    let mut config = AppConfig::default();
    config.data_directory = dir.path().join("cache");
    let cache = LocalCache::new(&config);

    let notes = vec![sample_note(1, "on disk")];
    cache.save_notes(&notes).await.expect("save failed");
    cache.save_note_content(notes[0].id, b"body", false).await
        .expect("save failed");

    let reopened = LocalCache::new(&config);
    assert_eq!(reopened.notes().await.expect("read failed"), notes);
    let (content, is_secret) = reopened.note_content(notes[0].id).await
        .expect("read failed")
        .expect("content missing");
    assert_eq!(content, b"body");
    assert!(!is_secret);
}
