//! # apilimits-core
//!
//! Rate-limit tracking engine - shared between the CLI and embedding hosts.
//!
//! This crate provides:
//! - The limit fetcher, quota cache and refresh scheduler (`services::quota`)
//! - The check-limits action and notifications (`services::check`)
//! - Relative time phrases (`services::relative_time`)
//! - Persisted cache storage (`db` module)
//! - Configuration from the environment (`config` module)
//! - Unified error handling (`error` module)

pub mod config;
pub mod db;
pub mod error;
pub mod services;

// Re-exports for convenience
pub use config::{LimitsConfig, RefreshConfig};
pub use db::Database;
pub use error::{Error, Result};

// Re-export commonly used types from services
pub use services::quota::{
    spawn_persistence, CachedQuota, LimitFetcher, QuotaCache, QuotaError, QuotaErrorKind,
    QuotaProvider, QuotaSnapshot, QuotaStatus, QuotaStore, QuotaWindow, QuotaWindowType,
    RefreshScheduler, SharedToken, StaticToken, TokenSource,
};
pub use services::{check_limits, format_relative, LogNotifier, Notification, Notifier};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}
