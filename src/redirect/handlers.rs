use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::service::{LinkService, ServiceError};

pub struct RedirectState {
    pub service: Arc<LinkService>,
}

/// Resolve a short code and redirect to its destination.
///
/// This is the public, unauthenticated hot path. A 307 keeps user agents
/// re-requesting through us so later clicks are still observed. Failures
/// carry no detail.
pub async fn resolve_redirect(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let referrer = headers
        .get(header::REFERER)
        .and_then(|h| h.to_str().ok());

    match state.service.resolve(&code, referrer).await {
        // The Location header is built fallibly: a stored destination that
        // cannot be a header value must not take down the handler task
        Ok(destination) => match HeaderValue::try_from(destination) {
            Ok(location) => {
                (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, location)]).into_response()
            }
            Err(_) => {
                tracing::error!(short_code = %code, "destination is not a valid Location header");
                (StatusCode::NOT_FOUND, "Link not found").into_response()
            }
        },
        Err(ServiceError::NotFound) => (StatusCode::NOT_FOUND, "Link not found").into_response(),
        Err(err) => {
            tracing::error!(short_code = %code, error = %err, "resolution failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Try again later").into_response()
        }
    }
}

pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
