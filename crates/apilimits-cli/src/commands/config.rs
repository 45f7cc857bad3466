//! Config commands
//!
//! Shows the effective configuration and where each value came from.

use anyhow::Result;
use apilimits_core::config::{
    ENV_DB_PATH, ENV_DEBOUNCE_MS, ENV_ENDPOINT, ENV_INTERVAL_MINUTES, ENV_TIMEOUT_SECS,
};
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::print_output;

const ENV_TOKEN: &str = "APILIMITS_TOKEN";

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
}

/// Config row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}

impl ConfigRow {
    fn new(key: &str, value: impl Into<String>, source: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
            source: source.to_string(),
        }
    }
}

pub async fn execute(ctx: &Context, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    let rows = get_all_config(ctx)?;
    print_output(&rows, ctx.format)?;
    Ok(())
}

fn env_source(key: &str) -> &'static str {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => "env",
        _ => "default",
    }
}

fn get_all_config(ctx: &Context) -> Result<Vec<ConfigRow>> {
    let config = &ctx.config;
    let mut rows = Vec::new();

    rows.push(ConfigRow::new(
        ENV_ENDPOINT,
        config.endpoint_url.clone(),
        if ctx.overrides.endpoint { "flag" } else { env_source(ENV_ENDPOINT) },
    ));

    rows.push(ConfigRow::new(
        ENV_TIMEOUT_SECS,
        config
            .request_timeout_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "client default".to_string()),
        env_source(ENV_TIMEOUT_SECS),
    ));

    rows.push(ConfigRow::new(
        ENV_INTERVAL_MINUTES,
        format!("{} min", config.refresh.interval_ms / 60_000),
        env_source(ENV_INTERVAL_MINUTES),
    ));

    rows.push(ConfigRow::new(
        ENV_DEBOUNCE_MS,
        format!("{} ms", config.refresh.manual_debounce_ms),
        env_source(ENV_DEBOUNCE_MS),
    ));

    let db_path = config
        .resolved_db_path()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "Unknown".to_string());
    rows.push(ConfigRow::new(
        ENV_DB_PATH,
        db_path,
        if ctx.overrides.db { "flag" } else { env_source(ENV_DB_PATH) },
    ));

    rows.push(ConfigRow::new(
        ENV_TOKEN,
        if ctx.token.is_some() { "****" } else { "Not set" },
        match (&ctx.token, env_source(ENV_TOKEN)) {
            (None, _) => "n/a",
            (Some(_), "env") => "env",
            (Some(_), _) => "flag",
        },
    ));

    Ok(rows)
}
