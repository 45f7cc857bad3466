//! Watch command
//!
//! Runs the refresh scheduler in the foreground, persists and prints every
//! cache change. Pressing Enter requests a manual refresh; Ctrl-C stops.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use apilimits_core::{
    format_relative, spawn_persistence, CachedQuota, LimitFetcher, QuotaStatus, RefreshConfig,
    RefreshScheduler,
};
use chrono::{DateTime, Local, Utc};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::Context;
use crate::output::{colored_status, print_error, print_info, OutputFormat};

#[derive(Args)]
pub struct WatchArgs {
    /// Refresh interval in minutes (default: APILIMITS_INTERVAL_MINUTES or 10)
    #[arg(long)]
    pub interval: Option<u32>,
}

pub async fn execute(ctx: &Context, args: WatchArgs) -> Result<()> {
    let store = ctx.open_store().await?;
    let cache = store.restore_cache().await;
    let persistence = spawn_persistence(&cache, store);

    let refresh = match args.interval {
        Some(minutes) => RefreshConfig {
            manual_debounce_ms: ctx.config.refresh.manual_debounce_ms,
            ..RefreshConfig::with_interval_minutes(minutes)
        },
        None => ctx.config.refresh.clone(),
    };

    let fetcher = Arc::new(LimitFetcher::from_config(&ctx.config, cache.clone()));
    let scheduler = RefreshScheduler::new(
        fetcher,
        Arc::new(ctx.token_source()),
        cache.clone(),
        refresh,
    )
    .with_error_observer(|kind, message| {
        print_error(&format!("Refresh failed ({}): {}", kind, message));
    });

    let mut updates = cache.subscribe();
    print_update(&cache.get_snapshot(), ctx.format);

    scheduler.start().await;
    print_info(
        &format!(
            "Refreshing every {} min. Press Enter to refresh now, Ctrl-C to stop.",
            scheduler.config().interval().as_secs() / 60
        ),
        ctx.quiet,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let value = updates.borrow_and_update().clone();
                print_update(&value, ctx.format);
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(_)) => {
                        if scheduler.request_manual_refresh() {
                            print_info("Refreshing...", ctx.quiet);
                        }
                    }
                    // No terminal attached; keep watching on the timer only
                    _ => stdin_open = false,
                }
            }
            _ = &mut ctrl_c => {
                log::debug!("[limits:cli] Ctrl-C received");
                break;
            }
        }
    }

    scheduler.stop().await;
    drop(scheduler);
    drop(updates);
    drop(cache);
    // Let the last write reach the database
    if tokio::time::timeout(Duration::from_secs(2), persistence).await.is_err() {
        log::warn!("[limits:cli] Gave up waiting for the final cache write");
    }

    print_info("Stopped.", ctx.quiet);
    Ok(())
}

/// Print one cache value as a single line
fn print_update(value: &CachedQuota, format: OutputFormat) {
    if format == OutputFormat::Json {
        match serde_json::to_string(value) {
            Ok(line) => println!("{}", line),
            Err(e) => print_error(&format!("Failed to render update: {}", e)),
        }
        return;
    }

    println!("[{}] {}", Local::now().format("%H:%M:%S"), summary_line(value));
}

fn summary_line(value: &CachedQuota) -> String {
    let status = colored_status(QuotaStatus::from_cached(value));
    let Some(snapshot) = value else {
        return format!("Limits {}", status);
    };

    let now = Utc::now();
    let resets = |at: DateTime<Utc>| format_relative(Some(at), now).unwrap_or_default();
    format!(
        "Daily {}/{} (resets {}) | Hourly {}/{} (resets {}) | {}",
        snapshot.daily.remaining,
        snapshot.daily.limit,
        resets(snapshot.daily.reset_at),
        snapshot.hourly.remaining,
        snapshot.hourly.limit,
        resets(snapshot.hourly.reset_at),
        status
    )
}
