//! Check command
//!
//! Runs the check-limits action once, persists the outcome and prints the
//! resulting notification.

use anyhow::Result;
use apilimits_core::services::NotificationLevel;
use apilimits_core::{check_limits, LimitFetcher, Notification, Notifier, QuotaCache};
use colored::Colorize;

use super::Context;
use crate::output::{print_error, print_json, OutputFormat};

/// Prints notifications to the terminal
struct TerminalNotifier {
    format: OutputFormat,
    quiet: bool,
}

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: Notification) {
        if self.format == OutputFormat::Json {
            if let Err(e) = print_json(&notification) {
                print_error(&format!("Failed to render notification: {}", e));
            }
            return;
        }

        match notification.level {
            NotificationLevel::Info => {
                if !self.quiet {
                    println!("{}", notification.title.bold());
                    println!("{}", notification.message);
                }
            }
            NotificationLevel::Error => {
                print_error(&format!("{}: {}", notification.title, notification.message));
            }
        }
    }
}

pub async fn execute(ctx: &Context) -> Result<()> {
    let store = ctx.open_store().await?;
    let cache = QuotaCache::new();
    let fetcher = LimitFetcher::from_config(&ctx.config, cache.clone());
    let notifier = TerminalNotifier {
        format: ctx.format,
        quiet: ctx.quiet,
    };

    let result = check_limits(&fetcher, &ctx.token_source(), &notifier).await;

    // Failures persist as "unknown" too
    store.save(&cache.get_snapshot()).await?;

    result?;
    Ok(())
}
