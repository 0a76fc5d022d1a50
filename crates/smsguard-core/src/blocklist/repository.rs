//! Retention store: durable persistence of block records.
//!
//! The store is pure data. It never decides whether an identifier should be
//! blocked; [`BlocklistEngine`](super::BlocklistEngine) owns that policy.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

use super::model::BlockRecord;
use crate::{Error, Result};

/// Typed persistence for [`BlockRecord`]s keyed by identifier.
pub trait RetentionStore: Send + Sync {
    /// Insert an indefinite block.
    ///
    /// Fails with [`Error::DuplicateKey`] if the identifier is already stored.
    fn put(
        &self,
        identifier: &str,
        blocked_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Write a whole record in one statement, replacing any stored one.
    ///
    /// The row is reinserted, so it moves to the end of insertion order.
    fn replace(&self, record: &BlockRecord) -> impl Future<Output = Result<()>> + Send;

    /// Fetch the record for an identifier, expired or not.
    fn get(&self, identifier: &str) -> impl Future<Output = Result<Option<BlockRecord>>> + Send;

    /// Set the unblock instant and arm retention in one update.
    ///
    /// Returns the number of rows affected (0 if the identifier is absent).
    fn set_retention(
        &self,
        identifier: &str,
        unblock_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Remove the record. Returns the number of rows affected.
    fn delete(&self, identifier: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Remove every record whose unblock instant is at or before `now`.
    fn delete_expired(&self, now: DateTime<Utc>) -> impl Future<Output = Result<u64>> + Send;

    /// Identifiers that are still blocked at `now`, in insertion order.
    fn list_active(&self, now: DateTime<Utc>) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Records that are still blocked at `now`, in insertion order.
    fn list_active_records(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<BlockRecord>>> + Send;
}

/// `SQLite`-backed retention store.
pub struct SqliteRetentionStore {
    pool: SqlitePool,
}

impl SqliteRetentionStore {
    /// Create a new store with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS blocked_numbers (
                identifier TEXT PRIMARY KEY NOT NULL,
                unblock_at INTEGER,
                retention_armed INTEGER NOT NULL DEFAULT 0,
                blocked_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Index for sweeping expired blocks
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_blocked_numbers_unblock_at
            ON blocked_numbers(unblock_at) WHERE unblock_at IS NOT NULL
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl RetentionStore for SqliteRetentionStore {
    async fn put(&self, identifier: &str, blocked_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r"
            INSERT INTO blocked_numbers (identifier, unblock_at, retention_armed, blocked_at)
            VALUES (?, NULL, 0, ?)
            ",
        )
        .bind(identifier)
        .bind(blocked_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::DuplicateKey(identifier.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn replace(&self, record: &BlockRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT OR REPLACE INTO blocked_numbers
                (identifier, unblock_at, retention_armed, blocked_at)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(&record.identifier)
        .bind(record.unblock_at.map(|at| at.timestamp_millis()))
        .bind(i64::from(record.retention_armed))
        .bind(record.blocked_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, identifier: &str) -> Result<Option<BlockRecord>> {
        let row = sqlx::query(
            r"
            SELECT identifier, unblock_at, retention_armed, blocked_at
            FROM blocked_numbers
            WHERE identifier = ?
            ",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_record))
    }

    async fn set_retention(&self, identifier: &str, unblock_at: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE blocked_numbers
            SET unblock_at = ?,
                retention_armed = 1
            WHERE identifier = ?
            ",
        )
        .bind(unblock_at.timestamp_millis())
        .bind(identifier)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, identifier: &str) -> Result<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM blocked_numbers
            WHERE identifier = ?
            ",
        )
        .bind(identifier)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM blocked_numbers
            WHERE unblock_at IS NOT NULL AND unblock_at <= ?
            ",
        )
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r"
            SELECT identifier
            FROM blocked_numbers
            WHERE unblock_at IS NULL OR unblock_at > ?
            ORDER BY rowid ASC
            ",
        )
        .bind(now.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("identifier")).collect())
    }

    async fn list_active_records(&self, now: DateTime<Utc>) -> Result<Vec<BlockRecord>> {
        let rows = sqlx::query(
            r"
            SELECT identifier, unblock_at, retention_armed, blocked_at
            FROM blocked_numbers
            WHERE unblock_at IS NULL OR unblock_at > ?
            ORDER BY rowid ASC
            ",
        )
        .bind(now.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }
}

/// Convert a database row to a `BlockRecord`.
fn row_to_record(row: &SqliteRow) -> BlockRecord {
    let blocked_at: i64 = row.get("blocked_at");
    BlockRecord {
        identifier: row.get("identifier"),
        unblock_at: row
            .get::<Option<i64>, _>("unblock_at")
            .and_then(DateTime::from_timestamp_millis),
        retention_armed: row.get::<i64, _>("retention_armed") != 0,
        blocked_at: DateTime::from_timestamp_millis(blocked_at).unwrap_or_default(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = SqliteRetentionStore::in_memory().await.unwrap();

        store.put("+15551230000", at(1_000)).await.unwrap();

        let record = store.get("+15551230000").await.unwrap().unwrap();
        assert_eq!(record.identifier, "+15551230000");
        assert_eq!(record.unblock_at, None);
        assert!(!record.retention_armed);
        assert_eq!(record.blocked_at, at(1_000));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = SqliteRetentionStore::in_memory().await.unwrap();
        assert!(store.get("+15550000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_duplicate_is_rejected() {
        let store = SqliteRetentionStore::in_memory().await.unwrap();

        store.put("+15551230000", at(0)).await.unwrap();
        let err = store.put("+15551230000", at(1)).await.unwrap_err();

        assert!(matches!(err, Error::DuplicateKey(id) if id == "+15551230000"));
    }

    #[tokio::test]
    async fn test_set_retention_updates_both_fields() {
        let store = SqliteRetentionStore::in_memory().await.unwrap();
        store.put("+15551230000", at(0)).await.unwrap();

        let affected = store.set_retention("+15551230000", at(500)).await.unwrap();
        assert_eq!(affected, 1);

        let record = store.get("+15551230000").await.unwrap().unwrap();
        assert_eq!(record.unblock_at, Some(at(500)));
        assert!(record.retention_armed);
    }

    #[tokio::test]
    async fn test_set_retention_absent_affects_nothing() {
        let store = SqliteRetentionStore::in_memory().await.unwrap();
        assert_eq!(store.set_retention("+1", at(500)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_writes_all_fields_and_reorders() {
        let store = SqliteRetentionStore::in_memory().await.unwrap();
        store.put("first", at(0)).await.unwrap();
        store.put("second", at(1)).await.unwrap();
        store.set_retention("first", at(5)).await.unwrap();

        let record = BlockRecord {
            identifier: "first".to_string(),
            unblock_at: Some(at(900)),
            retention_armed: true,
            blocked_at: at(100),
        };
        store.replace(&record).await.unwrap();

        assert_eq!(store.get("first").await.unwrap().unwrap(), record);
        assert_eq!(
            store.list_active(at(100)).await.unwrap(),
            vec!["second".to_string(), "first".to_string()]
        );

        // Absent identifiers are inserted
        store.replace(&BlockRecord::new("third", at(200))).await.unwrap();
        let third = store.get("third").await.unwrap().unwrap();
        assert_eq!(third.unblock_at, None);
        assert!(!third.retention_armed);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = SqliteRetentionStore::in_memory().await.unwrap();
        store.put("+15551230000", at(0)).await.unwrap();

        assert_eq!(store.delete("+15551230000").await.unwrap(), 1);
        assert_eq!(store.delete("+15551230000").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_expired_and_list_active() {
        let store = SqliteRetentionStore::in_memory().await.unwrap();
        let now = at(10_000);

        store.put("indefinite", at(0)).await.unwrap();
        store.put("expired", at(1)).await.unwrap();
        store.put("boundary", at(2)).await.unwrap();
        store.put("pending", at(3)).await.unwrap();
        store
            .set_retention("expired", now - Duration::hours(1))
            .await
            .unwrap();
        store.set_retention("boundary", now).await.unwrap();
        store
            .set_retention("pending", now + Duration::hours(1))
            .await
            .unwrap();

        // Listing never reports lapsed rows, even before a sweep
        assert_eq!(
            store.list_active(now).await.unwrap(),
            vec!["indefinite".to_string(), "pending".to_string()]
        );

        assert_eq!(store.delete_expired(now).await.unwrap(), 2);
        assert_eq!(store.delete_expired(now).await.unwrap(), 0);
        assert!(store.get("expired").await.unwrap().is_none());
        assert!(store.get("boundary").await.unwrap().is_none());

        let records = store.list_active_records(now).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].unblock_at, Some(now + Duration::hours(1)));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let path = std::env::temp_dir().join(format!(
            "smsguard-store-{}-{}.db",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let path_str = path.to_str().unwrap();

        {
            let store = SqliteRetentionStore::new(path_str).await.unwrap();
            store.put("+15551230000", at(0)).await.unwrap();
            store.pool.close().await;
        }

        let store = SqliteRetentionStore::new(path_str).await.unwrap();
        assert!(store.get("+15551230000").await.unwrap().is_some());
        store.pool.close().await;

        let _ = std::fs::remove_file(&path);
    }
}
