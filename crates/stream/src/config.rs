//! Backend connection settings loaded from environment variables.
//!
//! | Env Var                         | Default                 |
//! |---------------------------------|-------------------------|
//! | `API_BASE_URL`                  | `http://localhost:5001` |
//! | `STREAM_MAX_RECONNECT_ATTEMPTS` | `3`                     |
//! | `STREAM_RECONNECT_DELAY_MS`     | `1000`                  |

use std::time::Duration;

use crate::reconnect::ReconnectConfig;

/// Default backend base URL for local development.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5001";

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Backend base URL, without trailing slash.
    pub base_url: String,
    pub reconnect: ReconnectConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl StreamConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.into());
        let mut config = Self::new(base_url);

        if let Some(attempts) = parse_var::<u32, _>(&lookup, "STREAM_MAX_RECONNECT_ATTEMPTS")? {
            config.reconnect.max_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "STREAM_RECONNECT_DELAY_MS")? {
            config.reconnect.initial_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

/// Read and parse an optional variable; present-but-invalid is an error.
pub fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}
