//! Refresh scheduler
//!
//! Keeps the quota cache fresh without the host having to think about it.
//!
//! # Triggers
//!
//! ```text
//!   start() ──► recurring timer (every interval) ─┐
//!   start() with empty cache ──► immediate fetch ─┤
//!   on_identity_changed() ──► immediate fetch ────┼──► QuotaProvider ──► QuotaCache
//!   request_manual_refresh() ──► debounce ────────┘         │
//!                                                           ▼ (on failure)
//!                                                     error observer
//! ```
//!
//! Every fetch runs in its own task so a slow request never delays the timer
//! or a stop request. Fetch errors are logged and handed to the registered
//! error observer; they never stop the timer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::cache::QuotaCache;
use super::provider::{QuotaError, QuotaErrorKind, QuotaProvider, TokenSource};
use super::types::QuotaSnapshot;
use crate::config::RefreshConfig;

// ============================================================================
// State & Status
// ============================================================================

/// Scheduler state as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// No recurring timer armed
    Idle,
    /// Recurring timer armed
    RecurringActive,
    /// A debounced manual refresh is waiting to fire
    ManualPending,
}

/// What caused a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Startup,
    Recurring,
    IdentityChanged,
    Manual,
}

impl std::fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshTrigger::Startup => write!(f, "startup"),
            RefreshTrigger::Recurring => write!(f, "scheduled"),
            RefreshTrigger::IdentityChanged => write!(f, "identity change"),
            RefreshTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Status of the refresh scheduler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshStatus {
    /// Whether the recurring timer is armed
    pub is_running: bool,
    /// Whether at least one fetch is in flight
    pub is_refreshing: bool,
    /// When the last fetch finished
    pub last_refresh_at: Option<DateTime<Utc>>,
    /// When the recurring timer fires next
    pub next_refresh_at: Option<DateTime<Utc>>,
    /// Message of the last failed fetch, cleared by a success or an identity change
    pub last_error: Option<String>,
}

/// Callback receiving `(kind, message)` for every failed fetch
pub type ErrorObserver = Box<dyn Fn(QuotaErrorKind, &str) + Send + Sync>;

// ============================================================================
// Scheduler
// ============================================================================

struct SchedulerInner {
    provider: Arc<dyn QuotaProvider>,
    tokens: Arc<dyn TokenSource>,
    cache: QuotaCache,
    config: RefreshConfig,
    status: RwLock<RefreshStatus>,
    running: AtomicBool,
    manual_pending: AtomicBool,
    in_flight: AtomicUsize,
    error_observer: std::sync::RwLock<Option<ErrorObserver>>,
}

/// Drives a [`QuotaProvider`] from a recurring timer and on-demand triggers
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
    /// Shutdown signal for the timer loop; `Some` while running
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl RefreshScheduler {
    pub fn new(
        provider: Arc<dyn QuotaProvider>,
        tokens: Arc<dyn TokenSource>,
        cache: QuotaCache,
        config: RefreshConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                provider,
                tokens,
                cache,
                config,
                status: RwLock::new(RefreshStatus::default()),
                running: AtomicBool::new(false),
                manual_pending: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
                error_observer: std::sync::RwLock::new(None),
            }),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Register the error observer at construction
    pub fn with_error_observer<F>(self, observer: F) -> Self
    where
        F: Fn(QuotaErrorKind, &str) + Send + Sync + 'static,
    {
        self.on_error(observer);
        self
    }

    /// Replace the error observer
    pub fn on_error<F>(&self, observer: F)
    where
        F: Fn(QuotaErrorKind, &str) + Send + Sync + 'static,
    {
        let mut guard = self
            .inner
            .error_observer
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *guard = Some(Box::new(observer));
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &QuotaCache {
        &self.inner.cache
    }

    pub fn state(&self) -> SchedulerState {
        if self.inner.manual_pending.load(Ordering::SeqCst) {
            SchedulerState::ManualPending
        } else if self.inner.running.load(Ordering::SeqCst) {
            SchedulerState::RecurringActive
        } else {
            SchedulerState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn is_manual_pending(&self) -> bool {
        self.inner.manual_pending.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> RefreshStatus {
        self.inner.status.read().await.clone()
    }

    /// Arm the recurring timer
    ///
    /// Fetches straight away when the cache is empty. Calling `start` while
    /// already running does nothing.
    pub async fn start(&self) {
        let mut shutdown = self.shutdown_tx.lock().await;
        if shutdown.is_some() {
            log::info!("[limits:scheduler] Refresh scheduler is already running");
            return;
        }

        let (tx, mut shutdown_rx) = oneshot::channel::<()>();
        *shutdown = Some(tx);
        drop(shutdown);

        let period = self.inner.config.interval();
        self.inner.running.store(true, Ordering::SeqCst);
        {
            let mut status = self.inner.status.write().await;
            status.is_running = true;
            status.next_refresh_at = Some(self.inner.next_tick_at());
        }

        log::info!(
            "[limits:scheduler] Starting refresh scheduler with {:?} interval",
            period
        );

        if self.inner.cache.is_empty() {
            log::debug!("[limits:scheduler] Cache is empty, refreshing now");
            self.inner.spawn_refresh(RefreshTrigger::Startup);
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // Skip the first tick (immediate)
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        inner.status.write().await.next_refresh_at = Some(inner.next_tick_at());
                        inner.spawn_refresh(RefreshTrigger::Recurring);
                    }
                    _ = &mut shutdown_rx => {
                        log::debug!("[limits:scheduler] Timer loop received shutdown signal");
                        break;
                    }
                }
            }
        });
    }

    /// Disarm the recurring timer
    ///
    /// Fetches already in flight still complete and write the cache. A
    /// pending manual refresh still fires. Safe to call repeatedly.
    pub async fn stop(&self) {
        let tx = self.shutdown_tx.lock().await.take();

        if let Some(tx) = tx {
            let _ = tx.send(());
            log::info!("[limits:scheduler] Refresh scheduler stopped");
        }

        self.inner.running.store(false, Ordering::SeqCst);
        let mut status = self.inner.status.write().await;
        status.is_running = false;
        status.next_refresh_at = None;
    }

    /// The signed-in identity changed: forget the last error and fetch now
    pub fn on_identity_changed(&self) -> JoinHandle<()> {
        log::info!("[limits:scheduler] Identity changed, refreshing limits");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.status.write().await.last_error = None;
            let _ = inner.refresh(RefreshTrigger::IdentityChanged).await;
        })
    }

    /// Ask for a refresh after the debounce delay
    ///
    /// Returns `false` when a manual refresh is already pending; the request
    /// is folded into that one.
    pub fn request_manual_refresh(&self) -> bool {
        if self
            .inner
            .manual_pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("[limits:scheduler] Manual refresh already pending");
            return false;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.config.manual_debounce()).await;
            inner.manual_pending.store(false, Ordering::SeqCst);
            let _ = inner.refresh(RefreshTrigger::Manual).await;
        });
        true
    }
}

impl SchedulerInner {
    fn next_tick_at(&self) -> DateTime<Utc> {
        let period = chrono::Duration::from_std(self.config.interval())
            .unwrap_or_else(|_| chrono::Duration::minutes(10));
        Utc::now() + period
    }

    fn spawn_refresh(self: &Arc<Self>, trigger: RefreshTrigger) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let _ = inner.refresh(trigger).await;
        })
    }

    /// Run one fetch and record its outcome
    async fn refresh(&self, trigger: RefreshTrigger) -> Result<QuotaSnapshot, QuotaError> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.status.write().await.is_refreshing = true;

        log::debug!(
            "[limits:scheduler] {} refresh via {} provider",
            trigger,
            self.provider.provider_id()
        );

        let token = self.tokens.token();
        let result = self.provider.fetch_limits(token.as_deref()).await;

        {
            let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
            let mut status = self.status.write().await;
            status.is_refreshing = remaining > 0;
            status.last_refresh_at = Some(Utc::now());
            status.last_error = result.as_ref().err().map(|e| e.to_string());
        }

        match &result {
            Ok(snapshot) => log::info!(
                "[limits:scheduler] {} refresh done: daily {}/{}, hourly {}/{}",
                trigger,
                snapshot.daily.remaining,
                snapshot.daily.limit,
                snapshot.hourly.remaining,
                snapshot.hourly.limit
            ),
            Err(e) => self.report_error(trigger, e),
        }

        result
    }

    fn report_error(&self, trigger: RefreshTrigger, error: &QuotaError) {
        log::warn!("[limits:scheduler] {} refresh failed: {}", trigger, error);

        let guard = self
            .error_observer
            .read()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(observer) = guard.as_ref() {
            observer(error.kind(), &error.to_string());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::quota::provider::StaticToken;
    use crate::services::quota::types::QuotaWindow;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedProvider {
        cache: QuotaCache,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuotaProvider for FixedProvider {
        fn provider_id(&self) -> &'static str {
            "fixed"
        }

        async fn fetch_limits(&self, token: Option<&str>) -> Result<QuotaSnapshot, QuotaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if token.is_none() {
                self.cache.clear();
                return Err(QuotaError::unauthorized());
            }
            let reset = Utc::now() + chrono::Duration::hours(1);
            let snapshot =
                QuotaSnapshot::new(QuotaWindow::new(10, 20, reset), QuotaWindow::new(5, 10, reset));
            self.cache.store(snapshot.clone());
            Ok(snapshot)
        }
    }

    fn scheduler(token: Option<&str>, interval_ms: u64) -> (RefreshScheduler, Arc<FixedProvider>) {
        let cache = QuotaCache::new();
        let provider = Arc::new(FixedProvider {
            cache: cache.clone(),
            calls: AtomicUsize::new(0),
        });
        let scheduler = RefreshScheduler::new(
            provider.clone(),
            Arc::new(StaticToken::new(token.map(String::from))),
            cache,
            RefreshConfig::from_durations(
                Duration::from_millis(interval_ms),
                Duration::from_millis(30),
            ),
        );
        (scheduler, provider)
    }

    #[tokio::test]
    async fn test_initial_state() {
        let (scheduler, _) = scheduler(Some("t"), 60_000);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        let status = scheduler.status().await;
        assert!(!status.is_running);
        assert!(status.next_refresh_at.is_none());
    }

    #[tokio::test]
    async fn test_start_and_stop_transitions() {
        let (scheduler, _) = scheduler(Some("t"), 60_000);

        scheduler.start().await;
        assert_eq!(scheduler.state(), SchedulerState::RecurringActive);
        assert!(scheduler.status().await.next_refresh_at.is_some());

        scheduler.stop().await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(scheduler.status().await.next_refresh_at.is_none());
    }

    #[tokio::test]
    async fn test_manual_pending_state() {
        let (scheduler, provider) = scheduler(Some("t"), 60_000);

        assert!(scheduler.request_manual_refresh());
        assert_eq!(scheduler.state(), SchedulerState::ManualPending);
        assert!(!scheduler.request_manual_refresh());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_in_status() {
        let (scheduler, _) = scheduler(None, 60_000);

        scheduler.on_identity_changed().await.unwrap();

        let status = scheduler.status().await;
        assert_eq!(status.last_error.as_deref(), Some("Not authorised"));
        assert!(status.last_refresh_at.is_some());
        assert!(!status.is_refreshing);
    }

    #[test]
    fn test_trigger_display() {
        assert_eq!(RefreshTrigger::Recurring.to_string(), "scheduled");
        assert_eq!(RefreshTrigger::IdentityChanged.to_string(), "identity change");
    }
}
