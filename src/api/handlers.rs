use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::Identity;
use crate::models::{CreateLinkRequest, Link};
use crate::service::{LinkService, LinkStats, ServiceError};

pub struct AppState {
    pub service: Arc<LinkService>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct StatsQuery {
    /// Range start (unix seconds); defaults to 24 hours before the end
    pub start: Option<i64>,
    /// Range end (unix seconds); defaults to now
    pub end: Option<i64>,
}

fn error_response(err: ServiceError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        ServiceError::NotFound => StatusCode::NOT_FOUND,
        ServiceError::DuplicateCode => StatusCode::CONFLICT,
        ServiceError::InvalidCode | ServiceError::InvalidRange => StatusCode::BAD_REQUEST,
        ServiceError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Create a new link, with a generated code unless one was supplied
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Extension(Identity(owner_id)): Extension<Identity>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<Link>), (StatusCode, Json<ErrorResponse>)> {
    if payload.url.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "URL cannot be empty".to_string(),
            }),
        ));
    }

    // Control characters can never be sent back in a Location header
    if payload.url.chars().any(|c| c.is_ascii_control()) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "URL contains control characters".to_string(),
            }),
        ));
    }

    let link = state
        .service
        .create_link(&owner_id, payload.custom_code.as_deref(), &payload.url)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(link)))
}

/// List the caller's links, newest first
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Extension(Identity(owner_id)): Extension<Identity>,
) -> Result<Json<Vec<Link>>, (StatusCode, Json<ErrorResponse>)> {
    let links = state
        .service
        .list_links(&owner_id)
        .await
        .map_err(error_response)?;

    Ok(Json(links))
}

/// Delete one of the caller's links and its entire click history
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Extension(Identity(owner_id)): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, (StatusCode, Json<ErrorResponse>)> {
    let link = state
        .service
        .delete_link(&owner_id, id)
        .await
        .map_err(error_response)?;

    Ok(Json(SuccessResponse {
        message: format!("Deleted /{}", link.short_code),
    }))
}

/// Click history and referrer breakdown for one of the caller's links
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(Identity(owner_id)): Extension<Identity>,
    Path(code): Path<String>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<LinkStats>, (StatusCode, Json<ErrorResponse>)> {
    let end = params.end.unwrap_or_else(|| Utc::now().timestamp());
    let start = params.start.unwrap_or(end - 86_400);

    let stats = state
        .service
        .get_stats(&owner_id, &code, start, end)
        .await
        .map_err(error_response)?;

    Ok(Json(stats))
}

pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
