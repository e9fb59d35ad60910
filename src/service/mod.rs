//! Core link service: resolution, registry operations and stats
//!
//! Everything the HTTP layer exposes goes through [`LinkService`], which owns
//! the error taxonomy and trusts the opaque owner id handed to it. Store
//! failures are wrapped here; callers never see backend error types.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::analytics::{aggregate, Aggregation, TimeRange};
use crate::models::Link;
use crate::storage::{Store, StoreError};

/// Codes the routing layer claims for itself
pub const RESERVED_CODES: &[&str] = &["api", "health"];

const MAX_CODE_LEN: usize = 64;
const GENERATED_CODE_LEN: usize = 7;
const MAX_GENERATE_ATTEMPTS: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Unknown short code, or a link the caller does not own. The two are
    /// deliberately indistinguishable so code existence does not leak.
    #[error("link not found")]
    NotFound,
    #[error("short code already exists")]
    DuplicateCode,
    #[error("invalid short code")]
    InvalidCode,
    #[error("range start is after range end")]
    InvalidRange,
    #[error("store unavailable, try again")]
    StoreUnavailable,
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => ServiceError::DuplicateCode,
            StoreError::Unavailable => ServiceError::StoreUnavailable,
            StoreError::Other(e) => {
                tracing::error!("store failure: {e:#}");
                ServiceError::StoreUnavailable
            }
        }
    }
}

/// Owner-facing stats payload: the link identity plus its aggregation
#[derive(Debug, Clone, Serialize)]
pub struct LinkStats {
    pub short_code: String,
    pub destination_url: String,
    #[serde(flatten)]
    pub aggregation: Aggregation,
}

pub struct LinkService {
    store: Arc<dyn Store>,
}

impl LinkService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolve a short code on the public path, recording the click.
    ///
    /// The ledger row is written before the counter is touched, and the
    /// counter is only bumped when the row exists, so the counter never
    /// leads the ledger. Either write failing degrades to a warning; the
    /// redirect itself stays available and `reconcile` repairs the counter
    /// later.
    pub async fn resolve(
        &self,
        code: &str,
        referrer: Option<&str>,
    ) -> Result<String, ServiceError> {
        let link = self
            .store
            .find_by_code(code)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let referrer = referrer.unwrap_or("");
        let timestamp = Utc::now().timestamp();

        match self.store.append_click(link.id, referrer, timestamp).await {
            Ok(_) => {
                if let Err(err) = self.store.increment_clicks(link.id, 1).await {
                    tracing::warn!(short_code = %code, error = %err, "click counter increment failed");
                }
            }
            Err(err) => {
                tracing::warn!(short_code = %code, error = %err, "click append failed, skipping counter increment");
            }
        }

        Ok(link.destination_url)
    }

    /// Create a link with the given code, or a generated one when `code` is
    /// `None`. Creation races resolve in the store: exactly one concurrent
    /// create for a code succeeds.
    pub async fn create_link(
        &self,
        owner_id: &str,
        code: Option<&str>,
        destination_url: &str,
    ) -> Result<Link, ServiceError> {
        if let Some(code) = code {
            validate_code(code)?;
            return Ok(self
                .store
                .create_link(code, destination_url, owner_id)
                .await?);
        }

        for _ in 0..MAX_GENERATE_ATTEMPTS {
            let code = generate_short_code();
            match self.store.create_link(&code, destination_url, owner_id).await {
                Ok(link) => return Ok(link),
                Err(StoreError::Conflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!("exhausted short code generation attempts");
        Err(ServiceError::StoreUnavailable)
    }

    /// Delete an owned link and all of its clicks
    pub async fn delete_link(&self, owner_id: &str, link_id: i64) -> Result<Link, ServiceError> {
        self.store
            .delete_for_owner(link_id, owner_id)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    pub async fn list_links(&self, owner_id: &str) -> Result<Vec<Link>, ServiceError> {
        Ok(self.store.list_for_owner(owner_id).await?)
    }

    /// Aggregate an owned link's click history over `[start, end]`
    pub async fn get_stats(
        &self,
        owner_id: &str,
        code: &str,
        start: i64,
        end: i64,
    ) -> Result<LinkStats, ServiceError> {
        let range = TimeRange::new(start, end).ok_or(ServiceError::InvalidRange)?;

        let link = self
            .store
            .find_by_code_for_owner(code, owner_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let clicks = self.store.clicks_for_link(link.id).await?;

        Ok(LinkStats {
            short_code: link.short_code,
            destination_url: link.destination_url,
            aggregation: aggregate(&clicks, range),
        })
    }
}

/// Reject codes the resolver or router could not serve: empty, containing a
/// path separator, overlong, or claimed by the routing layer
fn validate_code(code: &str) -> Result<(), ServiceError> {
    if code.is_empty() || code.len() > MAX_CODE_LEN {
        return Err(ServiceError::InvalidCode);
    }
    if code.contains('/') {
        return Err(ServiceError::InvalidCode);
    }
    if RESERVED_CODES.iter().any(|r| code.eq_ignore_ascii_case(r)) {
        return Err(ServiceError::InvalidCode);
    }
    Ok(())
}

fn generate_short_code() -> String {
    use rand::distr::Alphanumeric;
    use rand::RngExt;

    rand::rng()
        .sample_iter(Alphanumeric)
        .take(GENERATED_CODE_LEN)
        .map(char::from)
        .collect()
}
