//! Quota tracking types
//!
//! The canonical two-window quota model and the classifications derived
//! from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Help page shown when a limit has been reached
pub const HELP_URL: &str = "https://help.nexusmods.com/article/105-i-have-reached-a-daily-or-hourly-limit-api-requests-have-been-consumed-rate-limit-exceeded-what-does-this-mean";

// ============================================================================
// Window Types
// ============================================================================

/// Rate-limit accounting period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaWindowType {
    Daily,
    Hourly,
}

impl std::fmt::Display for QuotaWindowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaWindowType::Daily => write!(f, "daily"),
            QuotaWindowType::Hourly => write!(f, "hourly"),
        }
    }
}

impl std::str::FromStr for QuotaWindowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(QuotaWindowType::Daily),
            "hourly" | "hour" => Ok(QuotaWindowType::Hourly),
            _ => Err(format!("Unknown window type: {}", s)),
        }
    }
}

// ============================================================================
// Quota Window
// ============================================================================

/// One rate-limit window as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaWindow {
    /// Requests left in this window
    pub remaining: u32,
    /// Window ceiling, always > 0
    pub limit: u32,
    /// When the window resets
    pub reset_at: DateTime<Utc>,
}

impl QuotaWindow {
    pub fn new(remaining: u32, limit: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            remaining,
            limit,
            reset_at,
        }
    }

    /// Requests consumed so far
    pub fn used(&self) -> u32 {
        self.limit.saturating_sub(self.remaining)
    }

    /// Remaining share of the window as a floored percentage
    pub fn remaining_percent(&self) -> u32 {
        if self.limit == 0 {
            return 0;
        }
        (u64::from(self.remaining) * 100 / u64::from(self.limit)) as u32
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// The paired daily and hourly windows observed by one fetch
///
/// Snapshots are replaced wholesale; nothing edits a window in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub daily: QuotaWindow,
    pub hourly: QuotaWindow,
    /// When this snapshot was observed
    pub fetched_at: DateTime<Utc>,
}

impl QuotaSnapshot {
    pub fn new(daily: QuotaWindow, hourly: QuotaWindow) -> Self {
        Self {
            daily,
            hourly,
            fetched_at: Utc::now(),
        }
    }

    /// Override the observation time
    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    pub fn window(&self, window_type: QuotaWindowType) -> &QuotaWindow {
        match window_type {
            QuotaWindowType::Daily => &self.daily,
            QuotaWindowType::Hourly => &self.hourly,
        }
    }

    /// The window a single progress indicator should show: daily while it
    /// has requests left, hourly once it is spent
    pub fn display_window(&self) -> (QuotaWindowType, &QuotaWindow) {
        if self.daily.remaining > 0 {
            (QuotaWindowType::Daily, &self.daily)
        } else {
            (QuotaWindowType::Hourly, &self.hourly)
        }
    }
}

/// Cache contents: `None` means "unknown", which is not the same as a
/// snapshot with zero requests remaining
pub type CachedQuota = Option<QuotaSnapshot>;

// ============================================================================
// Status
// ============================================================================

/// Overall state of the quota as a host would present it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaStatus {
    /// Nothing cached (never fetched, or the last fetch failed)
    Unknown,
    /// Requests are available in the daily window
    Available,
    /// Daily window spent; hourly requests still available
    DailyLimitReached,
    /// Both windows spent
    Exhausted,
}

impl QuotaStatus {
    pub fn from_cached(cached: &CachedQuota) -> Self {
        match cached {
            None => QuotaStatus::Unknown,
            Some(s) if s.daily.is_exhausted() && s.hourly.is_exhausted() => QuotaStatus::Exhausted,
            Some(s) if s.daily.is_exhausted() => QuotaStatus::DailyLimitReached,
            Some(_) => QuotaStatus::Available,
        }
    }

    /// Whether the help link should be offered
    pub fn is_limited(&self) -> bool {
        matches!(self, QuotaStatus::DailyLimitReached | QuotaStatus::Exhausted)
    }
}

impl std::fmt::Display for QuotaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaStatus::Unknown => write!(f, "unknown"),
            QuotaStatus::Available => write!(f, "available"),
            QuotaStatus::DailyLimitReached => write!(f, "daily limit reached"),
            QuotaStatus::Exhausted => write!(f, "no requests available"),
        }
    }
}

// ============================================================================
// Alert Level
// ============================================================================

/// Severity of a window's remaining share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Normal,
    /// Under 25% remaining
    Warning,
    /// Under 10% remaining
    Critical,
}

impl AlertLevel {
    pub fn from_remaining_percent(remaining_percent: u32) -> Self {
        if remaining_percent < 10 {
            AlertLevel::Critical
        } else if remaining_percent < 25 {
            AlertLevel::Warning
        } else {
            AlertLevel::Normal
        }
    }

    pub fn for_window(window: &QuotaWindow) -> Self {
        Self::from_remaining_percent(window.remaining_percent())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reset() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    fn snapshot(daily_remaining: u32, hourly_remaining: u32) -> QuotaSnapshot {
        QuotaSnapshot::new(
            QuotaWindow::new(daily_remaining, 10_000, reset()),
            QuotaWindow::new(hourly_remaining, 500, reset()),
        )
    }

    #[test]
    fn test_window_type_display() {
        assert_eq!(QuotaWindowType::Daily.to_string(), "daily");
        assert_eq!(QuotaWindowType::Hourly.to_string(), "hourly");
    }

    #[test]
    fn test_window_type_from_str() {
        assert_eq!("daily".parse::<QuotaWindowType>().unwrap(), QuotaWindowType::Daily);
        assert_eq!("Hour".parse::<QuotaWindowType>().unwrap(), QuotaWindowType::Hourly);
        assert!("weekly".parse::<QuotaWindowType>().is_err());
    }

    #[test]
    fn test_window_helpers() {
        let window = QuotaWindow::new(2_499, 10_000, reset());
        assert_eq!(window.used(), 7_501);
        assert_eq!(window.remaining_percent(), 24);
        assert!(!window.is_exhausted());
        assert!(QuotaWindow::new(0, 500, reset()).is_exhausted());
    }

    #[test]
    fn test_display_window_prefers_daily() {
        let fresh = snapshot(9_999, 499);
        let (kind, window) = fresh.display_window();
        assert_eq!(kind, QuotaWindowType::Daily);
        assert_eq!(window.remaining, 9_999);

        let spent = snapshot(0, 120);
        let (kind, window) = spent.display_window();
        assert_eq!(kind, QuotaWindowType::Hourly);
        assert_eq!(window.remaining, 120);
    }

    #[test]
    fn test_status_from_cached() {
        assert_eq!(QuotaStatus::from_cached(&None), QuotaStatus::Unknown);
        assert_eq!(
            QuotaStatus::from_cached(&Some(snapshot(10, 10))),
            QuotaStatus::Available
        );
        assert_eq!(
            QuotaStatus::from_cached(&Some(snapshot(0, 10))),
            QuotaStatus::DailyLimitReached
        );
        assert_eq!(
            QuotaStatus::from_cached(&Some(snapshot(0, 0))),
            QuotaStatus::Exhausted
        );
        // Hourly spent but daily left is still "available"
        assert_eq!(
            QuotaStatus::from_cached(&Some(snapshot(10, 0))),
            QuotaStatus::Available
        );
    }

    #[test]
    fn test_unknown_is_not_zero() {
        let zero = Some(snapshot(0, 0));
        assert_ne!(QuotaStatus::from_cached(&zero), QuotaStatus::from_cached(&None));
        assert!(QuotaStatus::Exhausted.is_limited());
        assert!(!QuotaStatus::Unknown.is_limited());
    }

    #[test]
    fn test_alert_level_thresholds() {
        assert_eq!(AlertLevel::from_remaining_percent(5), AlertLevel::Critical);
        assert_eq!(AlertLevel::from_remaining_percent(10), AlertLevel::Warning);
        assert_eq!(AlertLevel::from_remaining_percent(24), AlertLevel::Warning);
        assert_eq!(AlertLevel::from_remaining_percent(25), AlertLevel::Normal);
        assert_eq!(
            AlertLevel::for_window(&QuotaWindow::new(40, 500, reset())),
            AlertLevel::Critical
        );
    }

    #[test]
    fn test_snapshot_serde() {
        let original = snapshot(9_999, 499);
        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains("\"reset_at\""));
        let parsed: QuotaSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }
}
