use crate::models::{Click, Link};
use crate::storage::{Store, StoreError, StoreResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
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
impl Store for PostgresStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id BIGSERIAL PRIMARY KEY,
                short_code TEXT NOT NULL UNIQUE,
                destination_url TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                clicks BIGINT NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL
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
                id BIGSERIAL PRIMARY KEY,
                link_id BIGINT NOT NULL,
                timestamp BIGINT NOT NULL,
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

        // Insert-if-absent and readback in one round trip; an empty result
        // means a concurrent create won the race.
        let link = sqlx::query_as::<_, Link>(
            r#"
            INSERT INTO links (short_code, destination_url, owner_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (short_code) DO NOTHING
            RETURNING id, short_code, destination_url, owner_id, clicks, created_at
            "#,
        )
        .bind(short_code)
        .bind(destination_url)
        .bind(owner_id)
        .bind(created_at)
        .fetch_optional(self.pool.as_ref())
        .await?;

        link.ok_or(StoreError::Conflict)
    }

    async fn find_by_code(&self, short_code: &str) -> StoreResult<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, short_code, destination_url, owner_id, clicks, created_at
            FROM links
            WHERE short_code = $1
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
            WHERE short_code = $1 AND owner_id = $2
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
            SET clicks = clicks + $1
            WHERE id = $2
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

        sqlx::query(
            r#"
            DELETE FROM clicks
            WHERE link_id IN (SELECT id FROM links WHERE id = $1 AND owner_id = $2)
            "#,
        )
        .bind(link_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        let link = sqlx::query_as::<_, Link>(
            r#"
            DELETE FROM links
            WHERE id = $1 AND owner_id = $2
            RETURNING id, short_code, destination_url, owner_id, clicks, created_at
            "#,
        )
        .bind(link_id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(link)
    }

    async fn list_for_owner(&self, owner_id: &str) -> StoreResult<Vec<Link>> {
        let links = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, short_code, destination_url, owner_id, clicks, created_at
            FROM links
            WHERE owner_id = $1
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
        let click = sqlx::query_as::<_, Click>(
            r#"
            INSERT INTO clicks (link_id, timestamp, referrer)
            VALUES ($1, $2, $3)
            RETURNING id, link_id, timestamp, referrer
            "#,
        )
        .bind(link_id)
        .bind(timestamp)
        .bind(referrer)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(click)
    }

    async fn clicks_for_link(&self, link_id: i64) -> StoreResult<Vec<Click>> {
        let clicks = sqlx::query_as::<_, Click>(
            r#"
            SELECT id, link_id, timestamp, referrer
            FROM clicks
            WHERE link_id = $1
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(clicks)
    }

    async fn delete_clicks_for_link(&self, link_id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM clicks WHERE link_id = $1")
            .bind(link_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    async fn reconcile_click_counts(&self) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE links
            SET clicks = ledger.count
            FROM (
                SELECT links.id AS link_id,
                       COUNT(clicks.id) AS count
                FROM links
                LEFT JOIN clicks ON clicks.link_id = links.id
                GROUP BY links.id
            ) AS ledger
            WHERE links.id = ledger.link_id AND links.clicks <> ledger.count
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }
}
