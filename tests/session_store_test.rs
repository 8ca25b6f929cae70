mod common;

use std::sync::Arc;

use chrono::Utc;
use listenlink::{
    error::Error,
    management::{FileSessionStore, MemorySessionStore, SessionStore},
};

use common::*;

async fn exercise(store: &dyn SessionStore) {
    assert_eq!(store.load(USER).await.unwrap(), None);

    let original = session("access-1", "refresh-1", 3600);
    store.save(&original).await.unwrap();
    assert_eq!(store.load(USER).await.unwrap(), Some(original.clone()));

    let expires = Utc::now() + chrono::Duration::hours(2);
    let updated = store
        .update_credentials(USER, "access-2", None, expires)
        .await
        .unwrap();
    assert_eq!(updated.access_token, "access-2");
    assert_eq!(updated.refresh_token, "refresh-1");

    let rotated = store
        .update_credentials(USER, "access-3", Some("refresh-2"), expires)
        .await
        .unwrap();
    assert_eq!(rotated.refresh_token, "refresh-2");

    store.set_active_device(USER, Some(DEVICE)).await.unwrap();
    let stored = store.load(USER).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "access-3");
    assert_eq!(stored.active_device_id.as_deref(), Some(DEVICE));

    assert_eq!(store.list().await.unwrap().len(), 1);
    assert!(store.remove(USER).await.unwrap());
    assert!(!store.remove(USER).await.unwrap());
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_memory_store_round_trip() {
    exercise(&MemorySessionStore::new()).await;
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    exercise(&FileSessionStore::new(dir.path())).await;
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let original = session("access-1", "refresh-1", 3600);
    FileSessionStore::new(dir.path()).save(&original).await.unwrap();

    let reopened = FileSessionStore::new(dir.path());
    assert_eq!(reopened.load(USER).await.unwrap(), Some(original));
    assert!(dir.path().join("sessions").join("alice.json").is_file());
}

#[tokio::test]
async fn test_updates_for_unknown_user_are_not_connected() {
    let dir = tempfile::tempdir().unwrap();
    let file = FileSessionStore::new(dir.path());
    let memory = MemorySessionStore::new();

    for store in [&file as &dyn SessionStore, &memory as &dyn SessionStore] {
        let err = store
            .update_credentials(USER, "a", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected(_)));
        assert!(matches!(
            store.set_active_device(USER, Some(DEVICE)).await,
            Err(Error::NotConnected(_))
        ));
    }
}

#[tokio::test]
async fn test_file_store_rejects_path_like_user_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path());

    assert!(matches!(
        store.load("../escape").await,
        Err(Error::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_concurrent_updates_keep_file_readable() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSessionStore::new(dir.path()));
    store
        .save(&session("access-0", "refresh-1", 3600))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 1..=10 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store
                .update_credentials(
                    USER,
                    &format!("access-{}", i),
                    None,
                    Utc::now() + chrono::Duration::hours(1),
                )
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = store.load(USER).await.unwrap().unwrap();
    assert!(stored.access_token.starts_with("access-"));
    assert_eq!(stored.refresh_token, "refresh-1");
}
