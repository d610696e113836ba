//! Ledger configuration, loaded from the environment with defaults.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::transaction::{RetryPolicy, millis};

pub const ENV_MAX_ATTEMPTS: &str = "STOCK_LEDGER_MAX_ATTEMPTS";
pub const ENV_BASE_BACKOFF_MS: &str = "STOCK_LEDGER_BASE_BACKOFF_MS";
pub const ENV_MAX_BACKOFF_MS: &str = "STOCK_LEDGER_MAX_BACKOFF_MS";
pub const ENV_LOCK_TIMEOUT_MS: &str = "STOCK_LEDGER_LOCK_TIMEOUT_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerConfig {
    pub retry: RetryPolicy,
    #[serde(with = "millis")]
    pub lock_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl LedgerConfig {
    /// Defaults overridden by `STOCK_LEDGER_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(attempts) = parse_var::<u32>(&lookup, ENV_MAX_ATTEMPTS)? {
            anyhow::ensure!(attempts > 0, "{ENV_MAX_ATTEMPTS} must be at least 1");
            config.retry.max_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_BASE_BACKOFF_MS)? {
            config.retry.base_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_MAX_BACKOFF_MS)? {
            config.retry.max_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_LOCK_TIMEOUT_MS)? {
            config.lock_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value {raw:?} for {name}"))
        })
        .transpose()
}
