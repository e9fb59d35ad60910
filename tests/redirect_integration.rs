//! Redirect router tests
//!
//! Drive the public router with oneshot requests and assert on the
//! redirect response and the recorded clicks.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use kurz::redirect::create_redirect_router;
use kurz::service::LinkService;
use kurz::storage::{SqliteStore, Store};
use std::sync::Arc;
use tower::ServiceExt;

async fn create_test_store() -> Arc<dyn Store> {
    let store = SqliteStore::new("sqlite::memory:", 1).await.unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_redirect_known_code() {
    let store = create_test_store().await;
    let service = Arc::new(LinkService::new(Arc::clone(&store)));

    let link = store
        .create_link("hop", "https://example.com/destination", "alice")
        .await
        .unwrap();

    let app = create_redirect_router(Arc::clone(&service));

    let request = Request::builder()
        .uri("/hop")
        .header(header::REFERER, "https://news.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://example.com/destination"
    );

    // One ledger row with the referrer, one counted click
    let clicks = store.clicks_for_link(link.id).await.unwrap();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].referrer, "https://news.example");

    let found = store.find_by_code("hop").await.unwrap().unwrap();
    assert_eq!(found.clicks, 1);
}

#[tokio::test]
async fn test_redirect_without_referer_records_empty_referrer() {
    let store = create_test_store().await;
    let service = Arc::new(LinkService::new(Arc::clone(&store)));

    let link = store
        .create_link("direct", "https://example.com", "alice")
        .await
        .unwrap();

    let app = create_redirect_router(service);

    let request = Request::builder()
        .uri("/direct")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let clicks = store.clicks_for_link(link.id).await.unwrap();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].referrer, "");
}

#[tokio::test]
async fn test_redirect_unknown_code() {
    let store = create_test_store().await;
    let service = Arc::new(LinkService::new(store));

    let app = create_redirect_router(service);

    let request = Request::builder()
        .uri("/nothing-here")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_root_serves_health_not_redirect() {
    let store = create_test_store().await;
    let service = Arc::new(LinkService::new(store));

    let app = create_redirect_router(service);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_header_unsafe_destination_is_served_as_not_found() {
    let store = create_test_store().await;
    let service = Arc::new(LinkService::new(Arc::clone(&store)));

    // Written straight into the store, bypassing the API's URL validation
    store
        .create_link("inj", "https://x\n\rSet-Cookie: evil=1", "alice")
        .await
        .unwrap();

    let app = create_redirect_router(service);

    let request = Request::builder().uri("/inj").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    // Detail-free 404, no Location header, no panic
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(header::LOCATION).is_none());
}

#[tokio::test]
async fn test_repeated_resolutions_count_each_hit() {
    let store = create_test_store().await;
    let service = Arc::new(LinkService::new(Arc::clone(&store)));

    let link = store
        .create_link("busy", "https://example.com", "alice")
        .await
        .unwrap();

    for _ in 0..5 {
        let app = create_redirect_router(Arc::clone(&service));
        let request = Request::builder()
            .uri("/busy")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    let found = store.find_by_code("busy").await.unwrap().unwrap();
    assert_eq!(found.clicks, 5);
    assert_eq!(store.clicks_for_link(link.id).await.unwrap().len(), 5);
}
