//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod check;
pub mod config;
pub mod status;
pub mod watch;

use anyhow::Result;
use apilimits_core::{Database, LimitsConfig, QuotaStore, StaticToken};

use crate::output::OutputFormat;

/// Settings given as flags rather than environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub db: bool,
    pub endpoint: bool,
}

/// Shared context for all commands
pub struct Context {
    pub config: LimitsConfig,
    pub format: OutputFormat,
    pub quiet: bool,
    pub token: Option<String>,
    pub overrides: Overrides,
}

impl Context {
    /// Open the persisted quota cache
    pub async fn open_store(&self) -> Result<QuotaStore> {
        let path = self.config.resolved_db_path()?;
        let db = Database::open(path).await?;
        Ok(QuotaStore::sqlite(db))
    }

    pub fn token_source(&self) -> StaticToken {
        StaticToken::new(self.token.clone())
    }
}
