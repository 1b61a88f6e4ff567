use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use super::{ReviewStore, StoreError, StoredReview};

/// SQLite-backed [`ReviewStore`].
#[derive(Debug, Clone)]
pub struct SqliteReviewStore {
    pool: SqlitePool,
}

impl SqliteReviewStore {
    /// Opens (or creates) the backing database and bootstraps the schema.
    ///
    /// Accepts any SQLite connection string, e.g. `sqlite://reviews.db` or
    /// `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        // A single connection: in-memory databases exist per connection, and
        // the write volume is tens of rows per minute at worst.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(connection_err)?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS reviews (
                    review_id TEXT PRIMARY KEY,
                    package_name TEXT NOT NULL,
                    last_modified_at TEXT NOT NULL,
                    has_reply INTEGER NOT NULL
                );
            ",
        )
        .execute(&pool)
        .await
        .map_err(connection_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reviews_package_name ON reviews(package_name);",
        )
        .execute(&pool)
        .await
        .map_err(connection_err)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ReviewStore for SqliteReviewStore {
    async fn get(&self, review_id: &str) -> Result<Option<StoredReview>, StoreError> {
        let row = sqlx::query(
            r"
                SELECT review_id, package_name, last_modified_at, has_reply
                FROM reviews
                WHERE review_id = ?1
            ",
        )
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(connection_err)?;

        row.map(|row| map_review_row(&row)).transpose()
    }

    async fn upsert(&self, entry: &StoredReview) -> Result<(), StoreError> {
        sqlx::query(
            r"
                INSERT INTO reviews (review_id, package_name, last_modified_at, has_reply)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(review_id) DO UPDATE SET
                    package_name = excluded.package_name,
                    last_modified_at = excluded.last_modified_at,
                    has_reply = excluded.has_reply
            ",
        )
        .bind(&entry.review_id)
        .bind(&entry.package_name)
        .bind(entry.last_modified_at)
        .bind(entry.has_reply)
        .execute(&self.pool)
        .await
        .map_err(connection_err)?;

        Ok(())
    }

    async fn for_package(&self, package_name: &str) -> Result<Vec<StoredReview>, StoreError> {
        let rows = sqlx::query(
            r"
                SELECT review_id, package_name, last_modified_at, has_reply
                FROM reviews
                WHERE package_name = ?1
                ORDER BY last_modified_at DESC
            ",
        )
        .bind(package_name)
        .fetch_all(&self.pool)
        .await
        .map_err(connection_err)?;

        rows.iter().map(map_review_row).collect()
    }
}

fn connection_err(e: sqlx::Error) -> StoreError {
    StoreError::Connection(e.to_string())
}

fn map_review_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredReview, StoreError> {
    Ok(StoredReview {
        review_id: row
            .try_get("review_id")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        package_name: row
            .try_get("package_name")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        last_modified_at: row
            .try_get::<DateTime<Utc>, _>("last_modified_at")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        has_reply: row
            .try_get("has_reply")
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
    })
}
