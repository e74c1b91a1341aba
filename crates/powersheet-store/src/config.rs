//! Store configuration

use crate::error::{StoreError, StoreResult};
use std::time::Duration;

/// Environment variable overriding [`StoreConfig::base_url`]
pub const API_URL_ENV: &str = "POWERSHEET_API_URL";
/// Environment variable overriding [`StoreConfig::timeout`], in seconds
pub const API_TIMEOUT_ENV: &str = "POWERSHEET_API_TIMEOUT_SECS";

/// Connection settings for [`HttpStore`](crate::HttpStore)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// API root, e.g. `http://localhost:8000/api`
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("powersheet/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl StoreConfig {
    /// Defaults with a different API root
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `POWERSHEET_API_URL` / `POWERSHEET_API_TIMEOUT_SECS`
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup(API_URL_ENV) {
            config.base_url = url;
        }
        if let Some(secs) = lookup(API_TIMEOUT_ENV) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                StoreError::Config(format!("{} must be whole seconds, got '{}'", API_TIMEOUT_ENV, secs))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Full URL for an API path such as `/schema`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
