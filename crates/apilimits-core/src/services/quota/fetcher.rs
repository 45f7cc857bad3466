//! Rate-limit fetcher
//!
//! Performs one authenticated `GET` against the quota-check endpoint and
//! reads the limits from the response headers.
//!
//! # Response handling
//!
//! | Response            | Outcome                                         |
//! |---------------------|-------------------------------------------------|
//! | 2xx                 | snapshot parsed from the `X-RL-*` headers       |
//! | 429                 | conservative all-zero snapshot (not an error)   |
//! | any other status    | `RemoteError { status, status_text }`           |
//! | transport failure   | `Transport`                                     |
//!
//! Whatever happens, the cache is written exactly once: with the snapshot
//! on success, or cleared to "unknown" on failure so stale limits are never
//! shown next to a failed refresh.
//!
//! # Example
//!
//! ```ignore
//! use apilimits_core::services::quota::{LimitFetcher, QuotaCache};
//!
//! let cache = QuotaCache::new();
//! let fetcher = LimitFetcher::new(cache.clone());
//! let snapshot = fetcher.fetch(Some("token")).await?;
//! println!("{} daily requests left", snapshot.daily.remaining);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};

use super::cache::QuotaCache;
use super::provider::{QuotaError, QuotaProvider};
use super::types::{QuotaSnapshot, QuotaWindow};
use crate::config::LimitsConfig;

// ============================================================================
// Constants
// ============================================================================

/// Default quota-check endpoint
pub const DEFAULT_ENDPOINT_URL: &str = "https://api.nexusmods.com/v1/games.json";

/// Daily ceiling assumed when the service answers 429
pub const RATE_LIMITED_DAILY_LIMIT: u32 = 10_000;

/// Hourly ceiling assumed when the service answers 429
pub const RATE_LIMITED_HOURLY_LIMIT: u32 = 500;

pub const HOURLY_LIMIT_HEADER: &str = "X-RL-Hourly-Limit";
pub const HOURLY_REMAINING_HEADER: &str = "X-RL-Hourly-Remaining";
pub const HOURLY_RESET_HEADER: &str = "X-RL-Hourly-Reset";
pub const DAILY_LIMIT_HEADER: &str = "X-RL-Daily-Limit";
pub const DAILY_REMAINING_HEADER: &str = "X-RL-Daily-Remaining";
pub const DAILY_RESET_HEADER: &str = "X-RL-Daily-Reset";

// ============================================================================
// LimitFetcher
// ============================================================================

/// Checks the remote service's rate limits and records them in a [`QuotaCache`]
pub struct LimitFetcher {
    /// HTTP client for API requests
    client: Client,

    /// Quota-check URL
    endpoint_url: String,

    /// Cache written after every check
    cache: QuotaCache,
}

impl LimitFetcher {
    /// Create a fetcher for the default endpoint
    pub fn new(cache: QuotaCache) -> Self {
        Self::with_endpoint(cache, DEFAULT_ENDPOINT_URL)
    }

    /// Create a fetcher for a custom endpoint
    pub fn with_endpoint(cache: QuotaCache, endpoint_url: impl Into<String>) -> Self {
        Self {
            client: build_client(None),
            endpoint_url: endpoint_url.into(),
            cache,
        }
    }

    /// Create a fetcher from configuration
    pub fn from_config(config: &LimitsConfig, cache: QuotaCache) -> Self {
        Self::with_endpoint(cache, config.endpoint_url.clone())
            .with_timeout(config.request_timeout())
    }

    /// Apply a transport timeout; `None` keeps the client default
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.client = build_client(timeout);
        self
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    pub fn cache(&self) -> &QuotaCache {
        &self.cache
    }

    /// Check the limits once
    ///
    /// A missing or empty token fails with `Unauthorized` without touching
    /// the network.
    pub async fn fetch(&self, token: Option<&str>) -> Result<QuotaSnapshot, QuotaError> {
        let result = match token.filter(|t| !t.is_empty()) {
            Some(token) => self.call_limits_api(token).await,
            None => Err(QuotaError::unauthorized()),
        };

        match result {
            Ok(snapshot) => {
                self.cache.store(snapshot.clone());
                Ok(snapshot)
            }
            Err(e) => {
                log::error!("[limits:fetch] Unexpected error getting API limits: {}", e);
                self.cache.clear();
                Err(e)
            }
        }
    }

    /// Issue the request and classify the response
    async fn call_limits_api(&self, token: &str) -> Result<QuotaSnapshot, QuotaError> {
        log::debug!("[limits:fetch] Checking rate limits at {}", self.endpoint_url);

        let response = self
            .client
            .get(&self.endpoint_url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        let status = response.status();
        log::debug!("[limits:fetch] API response status: {}", status);

        if status.is_success() {
            let snapshot = parse_limit_headers(response.headers(), Utc::now())?;
            log::debug!(
                "[limits:fetch] Rate limits fetched from the API: daily {}/{}, hourly {}/{}",
                snapshot.daily.remaining,
                snapshot.daily.limit,
                snapshot.hourly.remaining,
                snapshot.hourly.limit
            );
            return Ok(snapshot);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            log::warn!("[limits:fetch] Could not get API limits due to rate limiting, assuming 0");
            return Ok(rate_limited_snapshot(Utc::now()));
        }

        Err(QuotaError::remote(
            status.as_u16(),
            status
                .canonical_reason()
                .unwrap_or("Unable to check API limits"),
        ))
    }
}

fn build_client(timeout: Option<Duration>) -> Client {
    let mut builder = Client::builder().user_agent(concat!("apilimits/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    match builder.build() {
        Ok(client) => client,
        Err(e) => {
            log::warn!("[limits:fetch] Failed to build HTTP client, using defaults: {}", e);
            Client::new()
        }
    }
}

#[async_trait]
impl QuotaProvider for LimitFetcher {
    fn provider_id(&self) -> &'static str {
        "http"
    }

    async fn fetch_limits(&self, token: Option<&str>) -> Result<QuotaSnapshot, QuotaError> {
        self.fetch(token).await
    }
}

// ============================================================================
// Header parsing
// ============================================================================

/// Build a snapshot from the six `X-RL-*` headers
///
/// Every header must be present and well formed; the windows must satisfy
/// `0 < limit` and `remaining <= limit`.
pub fn parse_limit_headers(
    headers: &HeaderMap,
    fetched_at: DateTime<Utc>,
) -> Result<QuotaSnapshot, QuotaError> {
    let daily = parse_window(
        headers,
        DAILY_LIMIT_HEADER,
        DAILY_REMAINING_HEADER,
        DAILY_RESET_HEADER,
    )?;
    let hourly = parse_window(
        headers,
        HOURLY_LIMIT_HEADER,
        HOURLY_REMAINING_HEADER,
        HOURLY_RESET_HEADER,
    )?;

    Ok(QuotaSnapshot::new(daily, hourly).with_fetched_at(fetched_at))
}

fn parse_window(
    headers: &HeaderMap,
    limit_header: &str,
    remaining_header: &str,
    reset_header: &str,
) -> Result<QuotaWindow, QuotaError> {
    let limit = parse_count(headers, limit_header)?;
    let remaining = parse_count(headers, remaining_header)?;

    if limit == 0 {
        return Err(QuotaError::malformed(format!("{} is zero", limit_header)));
    }
    if remaining > limit {
        return Err(QuotaError::malformed(format!(
            "{} ({}) exceeds {} ({})",
            remaining_header, remaining, limit_header, limit
        )));
    }

    let raw_reset = header_str(headers, reset_header)?;
    let reset_at = parse_reset(raw_reset).ok_or_else(|| {
        QuotaError::malformed(format!("{} is not a timestamp: {}", reset_header, raw_reset))
    })?;

    Ok(QuotaWindow::new(remaining, limit, reset_at))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, QuotaError> {
    let value = headers
        .get(name)
        .ok_or_else(|| QuotaError::malformed(format!("missing header {}", name)))?;

    value
        .to_str()
        .map(str::trim)
        .map_err(|_| QuotaError::malformed(format!("{} is not valid text", name)))
}

fn parse_count(headers: &HeaderMap, name: &str) -> Result<u32, QuotaError> {
    let raw = header_str(headers, name)?;
    raw.parse::<u32>()
        .map_err(|_| QuotaError::malformed(format!("{} is not a count: {}", name, raw)))
}

/// Parse a reset timestamp
///
/// Accepts RFC 3339 (`2024-01-16T00:00:00Z`), the space-separated form with
/// an offset (`2024-01-16 00:00:00 +0000`), and naive UTC forms.
pub fn parse_reset(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }

    log::warn!("[limits:fetch] Failed to parse reset time: {}", s);
    None
}

// ============================================================================
// Rate-limited fallback
// ============================================================================

/// The snapshot recorded when the service answers 429
///
/// Both windows are assumed spent; the daily window resets at the next UTC
/// midnight and the hourly window at the top of the next UTC hour.
pub fn rate_limited_snapshot(now: DateTime<Utc>) -> QuotaSnapshot {
    QuotaSnapshot::new(
        QuotaWindow::new(0, RATE_LIMITED_DAILY_LIMIT, start_of_next_utc_day(now)),
        QuotaWindow::new(0, RATE_LIMITED_HOURLY_LIMIT, start_of_next_utc_hour(now)),
    )
    .with_fetched_at(now)
}

pub fn start_of_next_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|| now + chrono::Duration::days(1))
}

pub fn start_of_next_utc_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .map(|top| top + chrono::Duration::hours(1))
        .unwrap_or_else(|| now + chrono::Duration::hours(1))
}

// ============================================================================
// Tests
// ============================================================================
