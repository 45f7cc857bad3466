//! Status command
//!
//! Shows the last persisted limits without contacting the service.

use anyhow::Result;
use apilimits_core::services::quota::{AlertLevel, HELP_URL};
use apilimits_core::{format_relative, CachedQuota, QuotaSnapshot, QuotaStatus, QuotaWindowType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{colored_status, print_info, print_json, print_output, OutputFormat};

/// One quota window for table display
#[derive(Debug, Serialize, Tabled)]
pub struct WindowRow {
    #[tabled(rename = "Window")]
    pub window: QuotaWindowType,
    #[tabled(rename = "Remaining")]
    pub remaining: u32,
    #[tabled(rename = "Limit")]
    pub limit: u32,
    #[tabled(rename = "Left")]
    pub percent: String,
    #[tabled(rename = "Resets")]
    pub resets: String,
    #[tabled(skip)]
    pub reset_at: DateTime<Utc>,
    #[tabled(skip)]
    pub alert: AlertLevel,
}

/// Everything `status --format json` prints
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub status: QuotaStatus,
    pub fetched_at: Option<DateTime<Utc>>,
    pub windows: Vec<WindowRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_url: Option<&'static str>,
}

impl StatusReport {
    pub fn new(cached: &CachedQuota, now: DateTime<Utc>) -> Self {
        let status = QuotaStatus::from_cached(cached);
        Self {
            status,
            fetched_at: cached.as_ref().map(|s| s.fetched_at),
            windows: cached
                .as_ref()
                .map(|s| window_rows(s, now))
                .unwrap_or_default(),
            help_url: status.is_limited().then_some(HELP_URL),
        }
    }
}

pub fn window_rows(snapshot: &QuotaSnapshot, now: DateTime<Utc>) -> Vec<WindowRow> {
    [QuotaWindowType::Daily, QuotaWindowType::Hourly]
        .into_iter()
        .map(|window_type| {
            let window = snapshot.window(window_type);
            WindowRow {
                window: window_type,
                remaining: window.remaining,
                limit: window.limit,
                percent: format!("{}%", window.remaining_percent()),
                resets: format_relative(Some(window.reset_at), now)
                    .unwrap_or_else(|| "???".to_string()),
                reset_at: window.reset_at,
                alert: AlertLevel::for_window(window),
            }
        })
        .collect()
}

pub async fn execute(ctx: &Context) -> Result<()> {
    let store = ctx.open_store().await?;
    let cached = store.load().await;
    let now = Utc::now();
    let report = StatusReport::new(&cached, now);

    if ctx.format == OutputFormat::Json {
        return print_json(&report);
    }

    if !report.windows.is_empty() {
        print_output(&report.windows, ctx.format)?;
    }

    print_info(&format!("Status: {}", colored_status(report.status)), ctx.quiet);

    match report.fetched_at {
        Some(fetched_at) => {
            let ago = format_relative(Some(fetched_at), now).unwrap_or_default();
            print_info(&format!("Last update: {}", ago), ctx.quiet);
        }
        None => print_info("No limits recorded yet. Run `apilimits check`.", ctx.quiet),
    }

    if let Some(url) = report.help_url {
        print_info(&format!("See {}", url), ctx.quiet);
    }

    Ok(())
}
