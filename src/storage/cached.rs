use crate::models::{Click, Link};
use crate::storage::{Store, StoreResult};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;

/// Store wrapper that serves hot-path lookups from a read cache and buffers
/// click-counter increments in memory.
///
/// Click rows always go straight to the inner store; only the derived
/// counter is buffered, so the ledger stays the authoritative count while
/// the counter trails it by at most one flush interval.
pub struct CachedStore {
    inner: Arc<dyn Store>,
    /// Read cache for code lookups on the resolution path
    read_cache: Cache<String, Option<Link>>,
    /// Pending counter increments, keyed by link id
    click_buffer: Arc<DashMap<i64, u64>>,
    shutdown_tx: watch::Sender<bool>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn Store>, max_cache_entries: u64, flush_interval_secs: u64) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(max_cache_entries)
            .time_to_live(Duration::from_secs(300))
            .build();

        let click_buffer = Arc::new(DashMap::new());
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        // Background task flushing buffered increments into the inner store
        let store = Arc::clone(&inner);
        let buffer = Arc::clone(&click_buffer);
        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(flush_interval_secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = flush_click_buffer(&store, &buffer).await {
                            tracing::error!("failed to flush click buffer: {}", e);
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            if let Err(e) = flush_click_buffer(&store, &buffer).await {
                                tracing::error!("failed to flush click buffer on shutdown: {}", e);
                            } else {
                                tracing::info!("click buffer flushed on shutdown");
                            }
                            break;
                        }
                    }
                }
            }
        });

        Self {
            inner,
            read_cache,
            click_buffer,
            shutdown_tx,
        }
    }

    /// Signal the flush task to persist buffered increments and stop
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn buffered_clicks(&self, link_id: i64) -> u64 {
        self.click_buffer
            .get(&link_id)
            .map(|entry| *entry.value())
            .unwrap_or(0)
    }
}

/// Flush accumulated increments to the inner store
async fn flush_click_buffer(
    store: &Arc<dyn Store>,
    buffer: &Arc<DashMap<i64, u64>>,
) -> Result<()> {
    // Collect increments while zeroing counts so concurrent writers can
    // keep accumulating
    let pending = buffer
        .iter_mut()
        .filter_map(|mut entry| {
            let count = *entry.value();
            if count == 0 {
                return None;
            }
            *entry.value_mut() = 0;
            Some((*entry.key(), count))
        })
        .collect::<Vec<(i64, u64)>>();

    // Drop entries that stayed empty
    buffer.retain(|_, v| *v > 0);

    for (link_id, count) in pending {
        store.increment_clicks(link_id, count).await?;
    }

    Ok(())
}

#[async_trait]
impl Store for CachedStore {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn create_link(
        &self,
        short_code: &str,
        destination_url: &str,
        owner_id: &str,
    ) -> StoreResult<Link> {
        let link = self
            .inner
            .create_link(short_code, destination_url, owner_id)
            .await?;

        self.read_cache
            .insert(short_code.to_string(), Some(link.clone()))
            .await;

        Ok(link)
    }

    async fn find_by_code(&self, short_code: &str) -> StoreResult<Option<Link>> {
        if let Some(cached) = self.read_cache.get(short_code).await {
            return Ok(cached);
        }

        let link = self.inner.find_by_code(short_code).await?;

        // Negative results are cached too, shielding the store from
        // scans of nonexistent codes
        self.read_cache
            .insert(short_code.to_string(), link.clone())
            .await;

        Ok(link)
    }

    async fn find_by_code_for_owner(
        &self,
        short_code: &str,
        owner_id: &str,
    ) -> StoreResult<Option<Link>> {
        // Owner-facing reads bypass the cache and fold in pending increments
        let mut link = self.inner.find_by_code_for_owner(short_code, owner_id).await?;

        if let Some(ref mut link) = link {
            link.clicks += self.buffered_clicks(link.id) as i64;
        }

        Ok(link)
    }

    async fn increment_clicks(&self, link_id: i64, amount: u64) -> StoreResult<()> {
        if amount == 0 {
            return Ok(());
        }

        self.click_buffer
            .entry(link_id)
            .and_modify(|count| *count += amount)
            .or_insert(amount);

        Ok(())
    }

    async fn delete_for_owner(&self, link_id: i64, owner_id: &str) -> StoreResult<Option<Link>> {
        let deleted = self.inner.delete_for_owner(link_id, owner_id).await?;

        if let Some(ref link) = deleted {
            self.read_cache.invalidate(&link.short_code).await;
            // Pending increments for a deleted link must not resurrect its row
            self.click_buffer.remove(&link_id);
        }

        Ok(deleted)
    }

    async fn list_for_owner(&self, owner_id: &str) -> StoreResult<Vec<Link>> {
        let mut links = self.inner.list_for_owner(owner_id).await?;

        for link in &mut links {
            link.clicks += self.buffered_clicks(link.id) as i64;
        }

        Ok(links)
    }

    async fn list_all(&self) -> StoreResult<Vec<Link>> {
        let mut links = self.inner.list_all().await?;

        for link in &mut links {
            link.clicks += self.buffered_clicks(link.id) as i64;
        }

        Ok(links)
    }

    async fn append_click(
        &self,
        link_id: i64,
        referrer: &str,
        timestamp: i64,
    ) -> StoreResult<Click> {
        self.inner.append_click(link_id, referrer, timestamp).await
    }

    async fn clicks_for_link(&self, link_id: i64) -> StoreResult<Vec<Click>> {
        self.inner.clicks_for_link(link_id).await
    }

    async fn delete_clicks_for_link(&self, link_id: i64) -> StoreResult<u64> {
        self.inner.delete_clicks_for_link(link_id).await
    }

    async fn reconcile_click_counts(&self) -> StoreResult<u64> {
        // Pending increments would double-count after a recount; drain them
        // into the store first
        flush_click_buffer(&self.inner, &self.click_buffer)
            .await
            .map_err(crate::storage::StoreError::Other)?;

        self.inner.reconcile_click_counts().await
    }
}
