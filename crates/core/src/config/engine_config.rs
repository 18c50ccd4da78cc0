use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MAX_COMMIT_ATTEMPTS, DEFAULT_PRICE_MAX_AGE_SECS,
    DEFAULT_REFRESH_CONCURRENCY,
};
use crate::errors::{Error, Result};

/// Tunables for the cost basis engine and the valuation refresher.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use holdfolio_core::config::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "refreshConcurrency": 8 }"#).unwrap();
/// assert_eq!(config.refresh_concurrency, 8);
/// assert_eq!(config.max_commit_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// How many times a read-plan-commit cycle runs before a concurrent
    /// modification is reported to the caller.
    pub max_commit_attempts: u32,

    /// Upper bound on in-flight price fetches during a refresh.
    pub refresh_concurrency: usize,

    /// Timeout applied to each individual price fetch.
    pub fetch_timeout_ms: u64,

    /// Staleness budget handed to the price provider when the caller
    /// does not force a refresh.
    pub price_max_age_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            refresh_concurrency: DEFAULT_REFRESH_CONCURRENCY,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            price_max_age_secs: DEFAULT_PRICE_MAX_AGE_SECS,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_commit_attempts == 0 {
            return Err(Error::InvalidConfigValue(
                "maxCommitAttempts must be at least 1".to_string(),
            ));
        }
        if self.refresh_concurrency == 0 {
            return Err(Error::InvalidConfigValue(
                "refreshConcurrency must be at least 1".to_string(),
            ));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(Error::InvalidConfigValue(
                "fetchTimeoutMs must be positive".to_string(),
            ));
        }
        if self.price_max_age_secs < 0 {
            return Err(Error::InvalidConfigValue(
                "priceMaxAgeSecs cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn price_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.price_max_age_secs)
    }
}
