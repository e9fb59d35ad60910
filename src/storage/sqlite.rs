use crate::models::{Click, Link};
use crate::storage::{Store, StoreError, StoreResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

pub struct SqliteStore {
    pool: Arc<SqlitePool>,
}

impl SqliteStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_code TEXT NOT NULL UNIQUE,
                destination_url TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                clicks INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_owner ON links(owner_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                referrer TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_link_ts ON clicks(link_id, timestamp)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_link(
        &self,
        short_code: &str,
        destination_url: &str,
        owner_id: &str,
    ) -> StoreResult<Link> {
        let created_at = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO links (short_code, destination_url, owner_id, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(short_code) DO NOTHING
            "#,
        )
        .bind(short_code)
        .bind(destination_url)
        .bind(owner_id)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }

        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, short_code, destination_url, owner_id, clicks, created_at
            FROM links
            WHERE short_code = ?
            "#,
        )
        .bind(short_code)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn find_by_code(&self, short_code: &str) -> StoreResult<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, short_code, destination_url, owner_id, clicks, created_at
            FROM links
            WHERE short_code = ?
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn find_by_code_for_owner(
        &self,
        short_code: &str,
        owner_id: &str,
    ) -> StoreResult<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, short_code, destination_url, owner_id, clicks, created_at
            FROM links
            WHERE short_code = ? AND owner_id = ?
            "#,
        )
        .bind(short_code)
        .bind(owner_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn increment_clicks(&self, link_id: i64, amount: u64) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE links
            SET clicks = clicks + ?
            WHERE id = ?
            "#,
        )
        .bind(amount as i64)
        .bind(link_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn delete_for_owner(&self, link_id: i64, owner_id: &str) -> StoreResult<Option<Link>> {
        let mut tx = self.pool.begin().await?;

        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, short_code, destination_url, owner_id, clicks, created_at
            FROM links
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(link_id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(link) = link else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM clicks WHERE link_id = ?")
            .bind(link_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM links WHERE id = ?")
            .bind(link_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(link))
    }

    async fn list_for_owner(&self, owner_id: &str) -> StoreResult<Vec<Link>> {
        let links = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, short_code, destination_url, owner_id, clicks, created_at
            FROM links
            WHERE owner_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn list_all(&self) -> StoreResult<Vec<Link>> {
        let links = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, short_code, destination_url, owner_id, clicks, created_at
            FROM links
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn append_click(
        &self,
        link_id: i64,
        referrer: &str,
        timestamp: i64,
    ) -> StoreResult<Click> {
        // Single write on the hot path; the row is rebuilt from the
        // generated rowid instead of being re-selected.
        let result = sqlx::query(
            r#"
            INSERT INTO clicks (link_id, timestamp, referrer)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(link_id)
        .bind(timestamp)
        .bind(referrer)
        .execute(self.pool.as_ref())
        .await?;

        Ok(Click {
            id: result.last_insert_rowid(),
            link_id,
            timestamp,
            referrer: referrer.to_string(),
        })
    }

    async fn clicks_for_link(&self, link_id: i64) -> StoreResult<Vec<Click>> {
        let clicks = sqlx::query_as::<_, Click>(
            r#"
            SELECT id, link_id, timestamp, referrer
            FROM clicks
            WHERE link_id = ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(clicks)
    }

    async fn delete_clicks_for_link(&self, link_id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM clicks WHERE link_id = ?")
            .bind(link_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    async fn reconcile_click_counts(&self) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE links
            SET clicks = (SELECT COUNT(*) FROM clicks WHERE clicks.link_id = links.id)
            WHERE clicks <> (SELECT COUNT(*) FROM clicks WHERE clicks.link_id = links.id)
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }
}
