//! Quota storage layer
//!
//! Persists the cached quota through a small key-value interface so a host
//! can show the last known limits before its first refresh completes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::cache::QuotaCache;
use super::types::CachedQuota;
use crate::db::Database;
use crate::error::Result;

/// Key under which the cached quota is stored
pub const QUOTA_CACHE_KEY: &str = "api_limits";

// ============================================================================
// Key-value stores
// ============================================================================

/// Minimal persistence used by [`QuotaStore`]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>>;

    async fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// Key-value store backed by the `cache_entries` table
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    db: Database,
}

impl SqliteKeyValueStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let value: Option<(String,)> =
            sqlx::query_as("SELECT value FROM cache_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.db.pool)
                .await?;

        Ok(value.map(|(v,)| v))
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.db.pool)
        .await?;

        Ok(())
    }
}

/// Process-local key-value store
#[derive(Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// QuotaStore
// ============================================================================

/// Reads and writes the cached quota as JSON
#[derive(Clone)]
pub struct QuotaStore {
    backend: Arc<dyn KeyValueStore>,
}

impl QuotaStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Store backed by SQLite
    pub fn sqlite(db: Database) -> Self {
        Self::new(Arc::new(SqliteKeyValueStore::new(db)))
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()))
    }

    /// Last persisted value
    ///
    /// Missing or unreadable entries load as "unknown".
    pub async fn load(&self) -> CachedQuota {
        let raw = match self.backend.read(QUOTA_CACHE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                log::debug!("[limits:store] No persisted quota");
                return None;
            }
            Err(e) => {
                log::warn!("[limits:store] Failed to read persisted quota: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<CachedQuota>(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                log::warn!("[limits:store] Ignoring unreadable persisted quota: {}", e);
                None
            }
        }
    }

    /// Persist a cache value
    pub async fn save(&self, cached: &CachedQuota) -> Result<()> {
        let raw = serde_json::to_string(cached)?;
        self.backend.write(QUOTA_CACHE_KEY, &raw).await?;
        log::debug!(
            "[limits:store] Persisted quota ({})",
            if cached.is_some() { "snapshot" } else { "empty" }
        );
        Ok(())
    }

    /// Create a cache seeded with the persisted value
    pub async fn restore_cache(&self) -> QuotaCache {
        QuotaCache::with_initial(self.load().await)
    }
}

/// Write every cache change to `store` until the cache is dropped
///
/// Persistence failures are logged and skipped; the in-memory cache stays
/// authoritative.
pub fn spawn_persistence(cache: &QuotaCache, store: QuotaStore) -> JoinHandle<()> {
    let mut rx = cache.subscribe();

    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let value = rx.borrow_and_update().clone();
            if let Err(e) = store.save(&value).await {
                log::warn!("[limits:store] Failed to persist quota: {}", e);
            }
        }
        log::debug!("[limits:store] Cache closed, persistence stopped");
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::quota::types::{QuotaSnapshot, QuotaWindow};
    use chrono::{TimeZone, Utc};

    fn snapshot() -> QuotaSnapshot {
        let reset = Utc.with_ymd_and_hms(2030, 5, 1, 0, 0, 0).unwrap();
        QuotaSnapshot::new(QuotaWindow::new(9_000, 10_000, reset), QuotaWindow::new(450, 500, reset))
            .with_fetched_at(Utc.with_ymd_and_hms(2030, 4, 30, 12, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = QuotaStore::in_memory();
        assert_eq!(store.load().await, None);

        store.save(&Some(snapshot())).await.unwrap();
        assert_eq!(store.load().await, Some(snapshot()));

        store.save(&None).await.unwrap();
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_sqlite_store_overwrites_single_row() {
        let db = Database::in_memory().await.unwrap();
        let store = QuotaStore::sqlite(db.clone());

        store.save(&Some(snapshot())).await.unwrap();
        store.save(&Some(snapshot())).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cache_entries")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.load().await, Some(snapshot()));
    }

    #[tokio::test]
    async fn test_corrupt_entry_loads_as_unknown() {
        let backend = MemoryKeyValueStore::new();
        backend.write(QUOTA_CACHE_KEY, "{not json").await.unwrap();

        let store = QuotaStore::new(Arc::new(backend));
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_restore_cache() {
        let store = QuotaStore::in_memory();
        store.save(&Some(snapshot())).await.unwrap();

        let cache = store.restore_cache().await;
        assert_eq!(cache.get_snapshot(), Some(snapshot()));
    }

    #[tokio::test]
    async fn test_spawn_persistence_follows_cache() {
        let store = QuotaStore::in_memory();
        let cache = QuotaCache::new();
        let handle = spawn_persistence(&cache, store.clone());

        cache.store(snapshot());
        let mut persisted = None;
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            persisted = store.load().await;
            if persisted.is_some() {
                break;
            }
        }
        assert_eq!(persisted, Some(snapshot()));

        drop(cache);
        handle.await.unwrap();
    }
}
