//! Key-value state store with per-key time-to-live.
//!
//! Values are opaque strings (callers store JSON). An expired key reads as
//! absent and is purged on that read.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// State store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite failure.
    #[error("state store database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Stored value could not be (de)serialized.
    #[error("state store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value store with TTL semantics.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value, expiring
    /// after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Read a live value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local store over a tokio mutex.
///
/// Expiry uses [`tokio::time::Instant`], so paused-clock tests can advance
/// past a TTL without sleeping.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), (value.to_owned(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        let Some((value, expires_at)) = entries.get(key) else {
            return Ok(None);
        };
        if Instant::now() < *expires_at {
            return Ok(Some(value.clone()));
        }
        entries.remove(key);
        trace!(key, "purged expired entry");
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS state_entries (\
    key TEXT PRIMARY KEY, \
    value TEXT NOT NULL, \
    expires_at INTEGER NOT NULL)";

/// SQLite-backed store. Expiry is stored as unix seconds.
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    db: SqlitePool,
}

impl SqliteStateStore {
    /// Wrap a pool, creating the table if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the schema cannot be created.
    pub async fn new(db: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(SCHEMA).execute(&db).await?;
        Ok(Self { db })
    }

    /// Delete every expired row. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on SQLite failure.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM state_entries WHERE expires_at <= ?1")
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = chrono::Utc::now().timestamp().saturating_add(ttl_secs);
        sqlx::query(
            "INSERT INTO state_entries (key, value, expires_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT value, expires_at FROM state_entries WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.db)
                .await?;
        match row {
            Some((value, expires_at)) if expires_at > chrono::Utc::now().timestamp() => {
                Ok(Some(value))
            }
            Some(_) => {
                self.delete(key).await?;
                trace!(key, "purged expired row");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM state_entries WHERE key = ?1")
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
