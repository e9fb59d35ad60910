use crate::models::{Click, Link};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("short code already exists")]
    Conflict,
    #[error("storage backend unavailable")]
    Unavailable,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            // Pool exhaustion and connection loss are transient; callers may
            // retry with backoff. Everything else is a real fault.
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable
            }
            other => StoreError::Other(other.into()),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Initialize the storage (create tables, indexes)
    async fn init(&self) -> Result<()>;

    /// Insert a new link. The uniqueness check and the insert are a single
    /// atomic operation; a concurrent create with the same code loses with
    /// `StoreError::Conflict`.
    async fn create_link(
        &self,
        short_code: &str,
        destination_url: &str,
        owner_id: &str,
    ) -> StoreResult<Link>;

    /// Public lookup by short code, no owner filter (resolution path)
    async fn find_by_code(&self, short_code: &str) -> StoreResult<Option<Link>>;

    /// Owner-scoped lookup. A link owned by someone else is reported as
    /// absent, not as a permission failure.
    async fn find_by_code_for_owner(
        &self,
        short_code: &str,
        owner_id: &str,
    ) -> StoreResult<Option<Link>>;

    /// Atomically add `amount` to a link's click counter
    async fn increment_clicks(&self, link_id: i64, amount: u64) -> StoreResult<()>;

    /// Delete a link and all of its click rows in one transaction,
    /// returning the deleted link. Owner-scoped like the lookup.
    async fn delete_for_owner(&self, link_id: i64, owner_id: &str) -> StoreResult<Option<Link>>;

    /// Links owned by `owner_id`, newest first
    async fn list_for_owner(&self, owner_id: &str) -> StoreResult<Vec<Link>>;

    /// All links, newest first (admin tooling)
    async fn list_all(&self) -> StoreResult<Vec<Link>>;

    /// Append one click row. Never conflicts; the ledger is append-only.
    async fn append_click(
        &self,
        link_id: i64,
        referrer: &str,
        timestamp: i64,
    ) -> StoreResult<Click>;

    /// All click rows for a link, newest first
    async fn clicks_for_link(&self, link_id: i64) -> StoreResult<Vec<Click>>;

    /// Remove every click row for a link, returning how many were deleted
    async fn delete_clicks_for_link(&self, link_id: i64) -> StoreResult<u64>;

    /// Rewrite every link's click counter from its ledger row count.
    /// Returns the number of links whose counter changed.
    async fn reconcile_click_counts(&self) -> StoreResult<u64>;
}
