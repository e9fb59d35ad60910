use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::auth::{identity_middleware, IdentityService};
use crate::service::LinkService;

use super::handlers::{
    create_link, delete_link, get_stats, health_check, list_links, AppState,
};

pub fn create_api_router(service: Arc<LinkService>, identity: Arc<IdentityService>) -> Router {
    let state = Arc::new(AppState { service });

    let protected_routes = Router::new()
        .route("/api/links", post(create_link))
        .route("/api/links", get(list_links))
        .route("/api/links/{id}", delete(delete_link))
        .route("/api/links/{code}/stats", get(get_stats))
        .route_layer(middleware::from_fn(move |headers, req, next| {
            let identity = Arc::clone(&identity);
            identity_middleware(identity, headers, req, next)
        }))
        .with_state(Arc::clone(&state));

    Router::new()
        .route("/api/health", get(health_check))
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
}
