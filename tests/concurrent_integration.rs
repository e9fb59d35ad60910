//! Concurrency tests: create races and counter/ledger agreement

use kurz::service::{LinkService, ServiceError};
use kurz::storage::{CachedStore, SqliteStore, Store};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

async fn create_test_store() -> Arc<dyn Store> {
    let store = SqliteStore::new("sqlite::memory:", 1).await.unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_concurrent_duplicate_creates_one_winner() {
    let store = create_test_store().await;
    let service = Arc::new(LinkService::new(Arc::clone(&store)));

    let mut handles = Vec::new();
    for i in 0..10 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .create_link(&format!("owner{}", i), Some("race"), "https://example.com")
                .await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(ServiceError::DuplicateCode) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 9);
}

#[tokio::test]
async fn test_sequential_resolutions_counter_matches_ledger() {
    let store = create_test_store().await;
    let service = LinkService::new(Arc::clone(&store));

    let link = store
        .create_link("seq", "https://example.com", "alice")
        .await
        .unwrap();

    const N: usize = 20;
    for _ in 0..N {
        let destination = service.resolve("seq", None).await.unwrap();
        assert_eq!(destination, "https://example.com");
    }

    let found = store.find_by_code("seq").await.unwrap().unwrap();
    let ledger = store.clicks_for_link(link.id).await.unwrap();
    assert_eq!(found.clicks as usize, N);
    assert_eq!(ledger.len(), N);
}

#[tokio::test]
async fn test_concurrent_resolutions_lose_no_updates() {
    let store = create_test_store().await;
    let service = Arc::new(LinkService::new(Arc::clone(&store)));

    let link = store
        .create_link("hot", "https://example.com", "alice")
        .await
        .unwrap();

    const N: usize = 25;
    let mut handles = Vec::new();
    for _ in 0..N {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.resolve("hot", Some("siteA")).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let found = store.find_by_code("hot").await.unwrap().unwrap();
    let ledger = store.clicks_for_link(link.id).await.unwrap();
    assert_eq!(found.clicks as usize, N);
    assert_eq!(ledger.len(), N);
}

#[tokio::test]
async fn test_cached_store_buffers_then_flushes_clicks() {
    let inner = create_test_store().await;
    let cached = Arc::new(CachedStore::new(Arc::clone(&inner), 1000, 1));
    let service = LinkService::new(Arc::clone(&cached) as Arc<dyn Store>);

    let link = service
        .create_link("alice", Some("buffered"), "https://example.com")
        .await
        .unwrap();

    for _ in 0..3 {
        service.resolve("buffered", None).await.unwrap();
    }

    // The ledger is written synchronously
    assert_eq!(inner.clicks_for_link(link.id).await.unwrap().len(), 3);

    // The owner-facing read folds pending increments in
    let owner_view = cached
        .find_by_code_for_owner("buffered", "alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner_view.clicks, 3);

    // After a flush interval the counter lands in the backing store
    sleep(Duration::from_millis(1500)).await;
    let persisted = inner.find_by_code("buffered").await.unwrap().unwrap();
    assert_eq!(persisted.clicks, 3);
}

#[tokio::test]
async fn test_cached_store_drops_buffer_on_delete() {
    let inner = create_test_store().await;
    let cached = Arc::new(CachedStore::new(Arc::clone(&inner), 1000, 3600));
    let service = LinkService::new(Arc::clone(&cached) as Arc<dyn Store>);

    let link = service
        .create_link("alice", Some("doomed"), "https://example.com")
        .await
        .unwrap();
    service.resolve("doomed", None).await.unwrap();

    service.delete_link("alice", link.id).await.unwrap();

    // Neither the row nor any buffered increment survives
    assert!(inner.find_by_code("doomed").await.unwrap().is_none());
    assert!(inner.clicks_for_link(link.id).await.unwrap().is_empty());

    // A fresh link under the same code starts from zero
    let relink = cached
        .create_link("doomed", "https://example.com", "alice")
        .await
        .unwrap();
    let view = cached
        .find_by_code_for_owner("doomed", "alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.id, relink.id);
    assert_eq!(view.clicks, 0);
}
