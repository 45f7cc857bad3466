//! Quota cache
//!
//! Holds the most recently observed [`CachedQuota`]. Writes replace the
//! whole value and wake every subscriber; reads never block on a writer for
//! longer than a clone.

use std::sync::Arc;

use tokio::sync::watch;

use super::types::{CachedQuota, QuotaSnapshot};

/// Shared, cloneable handle to the current quota
///
/// Every clone refers to the same cache. Create one per host and pass it to
/// the fetcher, the scheduler and any reader.
#[derive(Clone)]
pub struct QuotaCache {
    tx: Arc<watch::Sender<CachedQuota>>,
}

impl QuotaCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::with_initial(None)
    }

    /// Create a cache seeded with a previously persisted value
    pub fn with_initial(initial: CachedQuota) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Current value
    pub fn get_snapshot(&self) -> CachedQuota {
        self.tx.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_none()
    }

    /// Replace the cached value and notify subscribers
    pub fn set_snapshot(&self, value: CachedQuota) {
        log::debug!(
            "[limits:cache] Replacing cached quota ({})",
            if value.is_some() { "snapshot" } else { "empty" }
        );
        self.tx.send_replace(value);
    }

    /// Store a snapshot
    pub fn store(&self, snapshot: QuotaSnapshot) {
        self.set_snapshot(Some(snapshot));
    }

    /// Mark the quota as unknown
    pub fn clear(&self) {
        self.set_snapshot(None);
    }

    /// Receive every subsequent write
    ///
    /// The receiver starts with the current value marked as seen; call
    /// `changed().await` to wait for the next write.
    pub fn subscribe(&self) -> watch::Receiver<CachedQuota> {
        self.tx.subscribe()
    }
}

impl Default for QuotaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QuotaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaCache")
            .field("current", &*self.tx.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::quota::types::QuotaWindow;
    use chrono::Utc;

    fn snapshot(daily: u32) -> QuotaSnapshot {
        let reset = Utc::now() + chrono::Duration::hours(1);
        QuotaSnapshot::new(QuotaWindow::new(daily, 10_000, reset), QuotaWindow::new(1, 500, reset))
    }

    #[test]
    fn test_starts_empty() {
        let cache = QuotaCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get_snapshot(), None);
    }

    #[test]
    fn test_get_is_idempotent() {
        let cache = QuotaCache::new();
        cache.store(snapshot(42));
        assert_eq!(cache.get_snapshot(), cache.get_snapshot());
    }

    #[test]
    fn test_clones_share_state() {
        let cache = QuotaCache::new();
        let other = cache.clone();
        other.store(snapshot(7));
        assert_eq!(cache.get_snapshot().map(|s| s.daily.remaining), Some(7));

        cache.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn test_with_initial() {
        let seeded = snapshot(100);
        let cache = QuotaCache::with_initial(Some(seeded.clone()));
        assert_eq!(cache.get_snapshot(), Some(seeded));
    }

    #[tokio::test]
    async fn test_subscribers_see_every_write() {
        let cache = QuotaCache::new();
        let mut rx = cache.subscribe();

        cache.store(snapshot(5));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().map(|s| s.daily.remaining), Some(5));

        // Clearing is a change too, even though the previous value was Some
        cache.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
    }
}
