//! Console configuration loaded from environment variables.
//!
//! | Variable                 | Required | Default | Description                      |
//! |--------------------------|----------|---------|----------------------------------|
//! | `RESEARCH_KIND`          | no       | `stock` | `stock` or `sector`              |
//! | `RESEARCH_TARGET`        | yes      | --      | Ticker symbol or sector name     |
//! | `RESEARCH_EXCHANGE`      | no       | `US`    | Exchange code                    |
//! | `RESEARCH_NUM_COMPANIES` | no       | `5`     | Companies to cover (sector only) |
//! | `AUTH_TOKEN`             | no       | --      | Bearer credential                |
//!
//! Backend address and reconnect settings come from
//! [`StreamConfig`](analyst_stream::config::StreamConfig).

use analyst_core::stages::JobKind;
use analyst_stream::api::JobRequest;
use analyst_stream::config::{parse_var, ConfigError, StreamConfig};

pub const DEFAULT_EXCHANGE: &str = "US";
pub const DEFAULT_NUM_COMPANIES: u32 = 5;

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub request: JobRequest,
    pub auth_token: Option<String>,
    pub stream: StreamConfig,
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = parse_var::<JobKind, _>(&lookup, "RESEARCH_KIND")?.unwrap_or_default();

        let target = non_empty(&lookup, "RESEARCH_TARGET")
            .ok_or(ConfigError::Missing("RESEARCH_TARGET"))?;
        let exchange =
            non_empty(&lookup, "RESEARCH_EXCHANGE").unwrap_or_else(|| DEFAULT_EXCHANGE.into());

        let request = match kind {
            JobKind::Stock => JobRequest::Stock {
                symbol: target.to_uppercase(),
                exchange,
            },
            JobKind::Sector => JobRequest::Sector {
                sector: target,
                exchange,
                num_companies: parse_var(&lookup, "RESEARCH_NUM_COMPANIES")?
                    .unwrap_or(DEFAULT_NUM_COMPANIES),
            },
        };

        Ok(Self {
            request,
            auth_token: non_empty(&lookup, "AUTH_TOKEN"),
            stream: StreamConfig::from_lookup(&lookup)?,
        })
    }
}

/// Trimmed value, with blank treated as unset.
fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
