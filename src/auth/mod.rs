use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Opaque owner id supplied by the fronting identity provider. The core
/// trusts this value and performs no authentication of its own.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

pub struct IdentityService {
    header_name: String,
    /// Fallback identity for deployments without a fronting proxy
    dev_owner: Option<String>,
}

impl IdentityService {
    pub fn new(header_name: String, dev_owner: Option<String>) -> Self {
        Self {
            header_name,
            dev_owner,
        }
    }

    pub fn identify(&self, headers: &HeaderMap) -> Option<Identity> {
        headers
            .get(self.header_name.as_str())
            .and_then(|h| h.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| Identity(v.to_string()))
            .or_else(|| self.dev_owner.clone().map(Identity))
    }
}

pub async fn identity_middleware(
    identity_service: Arc<IdentityService>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    match identity_service.identify(&headers) {
        Some(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        None => (StatusCode::UNAUTHORIZED, "Missing caller identity").into_response(),
    }
}
