//! SQLite Score Shard Implementation
//!
//! One `SqliteScoreStore` backs one region shard. The durable store is
//! the system of record: the ranked cache can be rebuilt from it after
//! a cache loss, and read paths fall back to it on a cache miss.
//!
//! ## Schema
//!
//! ```text
//! leaderboard (
//!     user_id    TEXT PRIMARY KEY,
//!     name       TEXT NOT NULL,
//!     region     TEXT NOT NULL,
//!     score      INTEGER NOT NULL DEFAULT 0,
//!     updated_at TEXT NOT NULL
//! )
//! idx_leaderboard_region_score (region, score DESC)
//! idx_leaderboard_name (name)
//! ```
//!
//! Schema bootstrap runs once per shard at construction and is
//! idempotent (`CREATE TABLE IF NOT EXISTS`). The `(region, score)`
//! index supports direct-DB ranking via [`ScoreStore::top`], used when
//! the ranked cache is unavailable.
//!
//! ## Upsert Semantics
//!
//! `upsert` is a single `INSERT ... ON CONFLICT(user_id) DO UPDATE`
//! statement. Queue consumers apply events in enqueue order, so the last
//! statement applied for a user reflects the most recent regional write
//! at enqueue time. No partial state is observable: one statement, one
//! row.
//!
//! ## Thread Safety
//!
//! The SQLx connection pool handles concurrent access; the store is
//! `Send + Sync` and safe to share via `Arc`.

use crate::error::Result;
use async_trait::async_trait;
use podium_core::{Region, ScoreEntry};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

/// Durable score storage for one shard.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Insert-or-replace the row for `entry.user_id`.
    async fn upsert(&self, entry: &ScoreEntry) -> Result<()>;

    /// Fetch the row for a user, if present in this shard.
    async fn get(&self, user_id: &str) -> Result<Option<ScoreEntry>>;

    /// Top `limit` rows by descending score, ties by ascending user_id.
    ///
    /// Direct-DB ranking fallback; the steady-state read path serves
    /// top-N from the ranked cache instead.
    async fn top(&self, limit: u32) -> Result<Vec<ScoreEntry>>;
}

/// SQLite-backed score shard.
pub struct SqliteScoreStore {
    pool: SqlitePool,
}

impl SqliteScoreStore {
    /// Open (or create) a file-backed shard and bootstrap the schema.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", path.as_ref().display()))
                .map_err(sqlx::Error::from)?
                .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// In-memory shard (for testing and default config).
    ///
    /// Uses a single connection: each SQLite `:memory:` connection is
    /// its own database, so a larger pool would see empty tables.
    pub async fn new_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Idempotent schema bootstrap, run once per shard at startup.
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS leaderboard (
                user_id    TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                region     TEXT NOT NULL,
                score      INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_leaderboard_region_score \
             ON leaderboard(region, score DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_leaderboard_name ON leaderboard(name)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> ScoreEntry {
        ScoreEntry {
            user_id: row.get("user_id"),
            name: row.get("name"),
            region: Region::from_code(row.get::<String, _>("region").as_str()),
            score: row.get("score"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl ScoreStore for SqliteScoreStore {
    async fn upsert(&self, entry: &ScoreEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leaderboard (user_id, name, region, score, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                name = excluded.name,
                region = excluded.region,
                score = excluded.score,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.user_id)
        .bind(&entry.name)
        .bind(entry.region.as_str())
        .bind(entry.score)
        .bind(&entry.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<ScoreEntry>> {
        let row = sqlx::query(
            "SELECT user_id, name, region, score, updated_at \
             FROM leaderboard WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::row_to_entry))
    }

    async fn top(&self, limit: u32) -> Result<Vec<ScoreEntry>> {
        let rows = sqlx::query(
            "SELECT user_id, name, region, score, updated_at \
             FROM leaderboard ORDER BY score DESC, user_id ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_entry).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user_id: &str, score: i64) -> ScoreEntry {
        ScoreEntry {
            user_id: user_id.to_string(),
            name: format!("name-{user_id}"),
            region: Region::Eu,
            score,
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_and_get_roundtrip() {
        let store = SqliteScoreStore::new_in_memory().await.unwrap();

        store.upsert(&entry("u1", 100)).await.unwrap();

        let got = store.get("u1").await.unwrap().unwrap();
        assert_eq!(got.user_id, "u1");
        assert_eq!(got.score, 100);
        assert_eq!(got.region, Region::Eu);

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let store = SqliteScoreStore::new_in_memory().await.unwrap();

        store.upsert(&entry("u1", 100)).await.unwrap();

        let mut updated = entry("u1", 250);
        updated.name = "renamed".to_string();
        updated.updated_at = "2026-01-02T00:00:00Z".to_string();
        store.upsert(&updated).await.unwrap();

        let got = store.get("u1").await.unwrap().unwrap();
        assert_eq!(got.score, 250);
        assert_eq!(got.name, "renamed");
        assert_eq!(got.updated_at, "2026-01-02T00:00:00Z");
    }

    #[tokio::test]
    async fn top_orders_by_score_desc_then_user_id() {
        let store = SqliteScoreStore::new_in_memory().await.unwrap();

        store.upsert(&entry("charlie", 50)).await.unwrap();
        store.upsert(&entry("alice", 100)).await.unwrap();
        store.upsert(&entry("bob", 100)).await.unwrap();

        let top = store.top(10).await.unwrap();
        let ids: Vec<&str> = top.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "bob", "charlie"]);

        let top2 = store.top(2).await.unwrap();
        assert_eq!(top2.len(), 2);
    }

    #[tokio::test]
    async fn schema_bootstrap_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shard.db");

        {
            let store = SqliteScoreStore::new(&path).await.unwrap();
            store.upsert(&entry("u1", 100)).await.unwrap();
        }

        // Reopening the same file re-runs the bootstrap and must keep data.
        let store = SqliteScoreStore::new(&path).await.unwrap();
        let got = store.get("u1").await.unwrap().unwrap();
        assert_eq!(got.score, 100);
    }
}
