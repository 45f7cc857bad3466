//! Configuration
//!
//! Settings are read from `APILIMITS_*` environment variables on top of
//! built-in defaults. Hosts that embed the engine can also build the
//! structs directly.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::services::quota::fetcher::DEFAULT_ENDPOINT_URL;

// ============================================================================
// Constants
// ============================================================================

/// Minimum user-configurable refresh interval in minutes
pub const MIN_INTERVAL_MINUTES: u32 = 1;

/// Default refresh interval in minutes
pub const DEFAULT_INTERVAL_MINUTES: u32 = 10;

/// Default delay before a manual refresh fires
pub const DEFAULT_MANUAL_DEBOUNCE_MS: u64 = 500;

pub const ENV_ENDPOINT: &str = "APILIMITS_ENDPOINT";
pub const ENV_TIMEOUT_SECS: &str = "APILIMITS_TIMEOUT_SECS";
pub const ENV_INTERVAL_MINUTES: &str = "APILIMITS_INTERVAL_MINUTES";
pub const ENV_DEBOUNCE_MS: &str = "APILIMITS_DEBOUNCE_MS";
pub const ENV_DB_PATH: &str = "APILIMITS_DB_PATH";

// ============================================================================
// Refresh configuration
// ============================================================================

/// Timing for the refresh scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Recurring refresh period in milliseconds
    pub interval_ms: u64,
    /// Delay before a manual refresh fires, in milliseconds
    pub manual_debounce_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self::with_interval_minutes(DEFAULT_INTERVAL_MINUTES)
    }
}

impl RefreshConfig {
    /// Create a configuration with the given interval (minimum 1 minute)
    pub fn with_interval_minutes(interval_minutes: u32) -> Self {
        let minutes = interval_minutes.max(MIN_INTERVAL_MINUTES);
        Self {
            interval_ms: u64::from(minutes) * 60 * 1000,
            manual_debounce_ms: DEFAULT_MANUAL_DEBOUNCE_MS,
        }
    }

    /// Create a configuration from exact durations, without clamping
    pub fn from_durations(interval: Duration, manual_debounce: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            manual_debounce_ms: manual_debounce.as_millis() as u64,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn manual_debounce(&self) -> Duration {
        Duration::from_millis(self.manual_debounce_ms)
    }
}

// ============================================================================
// Top-level configuration
// ============================================================================

/// Everything needed to run a limits tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Quota-check URL
    pub endpoint_url: String,
    /// Transport timeout; `None` leaves it to the HTTP client
    pub request_timeout_secs: Option<u64>,
    /// Scheduler timing
    pub refresh: RefreshConfig,
    /// Explicit database path; `None` means the platform data directory
    pub db_path: Option<PathBuf>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            request_timeout_secs: None,
            refresh: RefreshConfig::default(),
            db_path: None,
        }
    }
}

impl LimitsConfig {
    /// Load the defaults overridden by `APILIMITS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_ENDPOINT) {
            config.endpoint_url = url.trim().to_string();
        }

        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            config.request_timeout_secs = Some(parse_number(ENV_TIMEOUT_SECS, &raw)?);
        }

        if let Some(raw) = get(ENV_INTERVAL_MINUTES) {
            let minutes: u32 = parse_number(ENV_INTERVAL_MINUTES, &raw)?;
            let debounce = config.refresh.manual_debounce_ms;
            config.refresh = RefreshConfig::with_interval_minutes(minutes);
            config.refresh.manual_debounce_ms = debounce;
        }

        if let Some(raw) = get(ENV_DEBOUNCE_MS) {
            config.refresh.manual_debounce_ms = parse_number(ENV_DEBOUNCE_MS, &raw)?;
        }

        if let Some(path) = get(ENV_DB_PATH) {
            config.db_path = Some(expand_path(&path));
        }

        config.validate()
    }

    /// Check the configuration is usable
    pub fn validate(self) -> Result<Self> {
        if !(self.endpoint_url.starts_with("http://") || self.endpoint_url.starts_with("https://")) {
            return Err(Error::config(format!(
                "{} must be an http(s) URL, got {}",
                ENV_ENDPOINT, self.endpoint_url
            )));
        }
        if self.refresh.interval_ms == 0 {
            return Err(Error::config("refresh interval must be greater than zero"));
        }
        Ok(self)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Resolved database path
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => default_db_path(),
        }
    }
}

/// Default database location in the platform data directory
pub fn default_db_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "apilimits", "ApiLimits")
        .ok_or_else(|| Error::config("Could not determine project directories"))?;

    Ok(dirs.data_dir().join("apilimits.db"))
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw.trim()).into_owned())
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| Error::config(format!("{} must be a number, got {:?}", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LimitsConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.endpoint_url, DEFAULT_ENDPOINT_URL);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.refresh.interval(), Duration::from_secs(600));
        assert_eq!(config.refresh.manual_debounce(), Duration::from_millis(500));
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = LimitsConfig::from_lookup(lookup(&[
            (ENV_ENDPOINT, "http://localhost:8080/v1/limits"),
            (ENV_TIMEOUT_SECS, "15"),
            (ENV_DEBOUNCE_MS, "250"),
            (ENV_INTERVAL_MINUTES, "30"),
            (ENV_DB_PATH, "/tmp/limits.db"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint_url, "http://localhost:8080/v1/limits");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.refresh.interval(), Duration::from_secs(30 * 60));
        assert_eq!(config.refresh.manual_debounce_ms, 250);
        assert_eq!(config.resolved_db_path().unwrap(), PathBuf::from("/tmp/limits.db"));
    }

    #[test]
    fn test_interval_is_clamped() {
        let config = LimitsConfig::from_lookup(lookup(&[(ENV_INTERVAL_MINUTES, "0")])).unwrap();
        assert_eq!(config.refresh.interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = LimitsConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(ENV_TIMEOUT_SECS));
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = LimitsConfig::from_lookup(lookup(&[(ENV_ENDPOINT, "ftp://example.com")]))
            .unwrap_err();
        assert!(err.to_string().contains("http(s) URL"));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = LimitsConfig::from_lookup(lookup(&[(ENV_ENDPOINT, "  ")])).unwrap();
        assert_eq!(config.endpoint_url, DEFAULT_ENDPOINT_URL);
    }

    #[test]
    fn test_from_durations_keeps_exact_values() {
        let refresh =
            RefreshConfig::from_durations(Duration::from_millis(50), Duration::from_millis(20));
        assert_eq!(refresh.interval(), Duration::from_millis(50));
        assert_eq!(refresh.manual_debounce(), Duration::from_millis(20));
    }

    #[test]
    fn test_default_db_path() {
        let path = default_db_path().unwrap();
        assert!(path.to_string_lossy().ends_with("apilimits.db"));
    }
}
