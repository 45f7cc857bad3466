//! Check-limits action
//!
//! The user-facing "check limits now" action: one fetch, one notification.
//! Independent of the refresh scheduler and its debounce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::quota::{QuotaError, QuotaProvider, QuotaSnapshot, QuotaWindow, TokenSource};
use crate::services::relative_time::format_relative;

/// How long hosts should keep a check-limits notification on screen
pub const NOTIFICATION_DISPLAY_MS: u64 = 10_000;

// =============================================================================
// Types
// =============================================================================

/// Notification level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

impl NotificationLevel {
    fn title(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "API Rate Limits",
            NotificationLevel::Error => "Failed to get API Rate Limits",
        }
    }
}

/// A message for the host's notification surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub display_ms: u64,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            title: level.title().to_string(),
            message: message.into(),
            display_ms: NOTIFICATION_DISPLAY_MS,
        }
    }
}

/// Delivers notifications to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        let message = notification.message.replace('\n', " / ");
        match notification.level {
            NotificationLevel::Info => log::info!("{}: {}", notification.title, message),
            NotificationLevel::Error => log::error!("{}: {}", notification.title, message),
        }
    }
}

// =============================================================================
// Action
// =============================================================================

/// Render a snapshot as the two-line notification body
pub fn format_limits_message(snapshot: &QuotaSnapshot, now: DateTime<Utc>) -> String {
    format!(
        "Daily: {}\nHourly: {}",
        window_line(&snapshot.daily, now),
        window_line(&snapshot.hourly, now)
    )
}

fn window_line(window: &QuotaWindow, now: DateTime<Utc>) -> String {
    let resets = format_relative(Some(window.reset_at), now).unwrap_or_else(|| "???".to_string());
    format!("{}/{} | Resets {}", window.remaining, window.limit, resets)
}

/// Fetch once and report the outcome through `notifier`
pub async fn check_limits(
    provider: &dyn QuotaProvider,
    tokens: &dyn TokenSource,
    notifier: &dyn Notifier,
) -> Result<QuotaSnapshot, QuotaError> {
    let token = tokens.token();

    match provider.fetch_limits(token.as_deref()).await {
        Ok(snapshot) => {
            let message = format_limits_message(&snapshot, Utc::now());
            notifier.notify(Notification::new(NotificationLevel::Info, message));
            Ok(snapshot)
        }
        Err(e) => {
            log::error!("[limits:check] Error checking API limits: {}", e);
            notifier.notify(Notification::new(NotificationLevel::Error, e.to_string()));
            Err(e)
        }
    }
}
