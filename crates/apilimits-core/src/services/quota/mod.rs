//! Quota tracking module
//!
//! Tracks the remote service's daily and hourly request allowance and keeps
//! a shared cache of the latest observation fresh.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ RefreshScheduler                                        │
//! │   - start() / stop()           (recurring timer)        │
//! │   - on_identity_changed()      (immediate fetch)        │
//! │   - request_manual_refresh()   (debounced fetch)        │
//! └─────────────────────────────────────────────────────────┘
//!          │                               │ errors
//!          ▼                               ▼
//! ┌─────────────────────────────┐   ┌──────────────┐
//! │ trait QuotaProvider         │   │ErrorObserver │
//! │   - fetch_limits()          │   └──────────────┘
//! │   LimitFetcher (X-RL-*)     │
//! └─────────────────────────────┘
//!          │ one write per fetch
//!          ▼
//! ┌─────────────────────────────┐   ┌──────────────────────┐
//! │ QuotaCache (watch channel)  │──►│ subscribers          │
//! │   - get_snapshot()          │   │   spawn_persistence  │
//! │   - set_snapshot()          │   │   UI / CLI output    │
//! └─────────────────────────────┘   └──────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use apilimits_core::config::RefreshConfig;
//! use apilimits_core::services::quota::{LimitFetcher, QuotaCache, RefreshScheduler, SharedToken};
//!
//! let cache = QuotaCache::new();
//! let fetcher = Arc::new(LimitFetcher::new(cache.clone()));
//! let token = Arc::new(SharedToken::new(Some(api_key)));
//!
//! let scheduler = RefreshScheduler::new(fetcher, token, cache.clone(), RefreshConfig::default())
//!     .with_error_observer(|kind, message| eprintln!("{kind}: {message}"));
//! scheduler.start().await;
//! ```

pub mod cache;
pub mod fetcher;
pub mod provider;
pub mod scheduler;
pub mod store;
pub mod types;

// Re-export main types
pub use types::{
    AlertLevel, CachedQuota, QuotaSnapshot, QuotaStatus, QuotaWindow, QuotaWindowType, HELP_URL,
};

// Re-export provider trait and error
pub use provider::{QuotaError, QuotaErrorKind, QuotaProvider, SharedToken, StaticToken, TokenSource};

pub use cache::QuotaCache;

pub use fetcher::{LimitFetcher, DEFAULT_ENDPOINT_URL};

// Re-export store
pub use store::{
    spawn_persistence, KeyValueStore, MemoryKeyValueStore, QuotaStore, SqliteKeyValueStore,
    QUOTA_CACHE_KEY,
};

// Re-export scheduler types
pub use scheduler::{ErrorObserver, RefreshScheduler, RefreshStatus, RefreshTrigger, SchedulerState};
