//! Schema fetch configuration.
//!
//! Remote schemas are fetched with a shared `reqwest::Client`. By default
//! requests have no timeout and nothing is retried. Override the timeout
//! via environment variables or explicit construction.

use std::time::Duration;

use ysv_core::ConfigError;

use crate::error::SchemaError;

/// Configuration for fetching remote schemas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Request timeout in seconds. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `YSV_FETCH_TIMEOUT_SECS` (default: unset, no timeout)
    /// - `YSV_USER_AGENT` (default: `ysv/<version>`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = match std::env::var("YSV_FETCH_TIMEOUT_SECS") {
            Ok(raw) => Some(parse_timeout("YSV_FETCH_TIMEOUT_SECS", &raw)?),
            Err(_) => None,
        };

        Ok(Self {
            timeout_secs,
            user_agent: std::env::var("YSV_USER_AGENT").unwrap_or_else(|_| default_user_agent()),
        })
    }

    /// Build the HTTP client described by this configuration.
    pub fn build_client(&self) -> Result<reqwest::Client, SchemaError> {
        let mut builder = reqwest::Client::builder().user_agent(self.user_agent.clone());
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build().map_err(SchemaError::Client)
    }
}

fn default_user_agent() -> String {
    format!("ysv/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_timeout(var: &str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            reason: "timeout must be greater than zero".to_string(),
        }),
        Ok(secs) => Ok(secs),
        Err(e) => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            reason: e.to_string(),
        }),
    }
}
