//! Runtime configuration read from the environment.

use std::time::Duration;

use taleweaver_client::DEFAULT_REQUEST_TIMEOUT;
use taleweaver_jobs::application::poller::{DEFAULT_POLL_INTERVAL, PollerConfig};

use crate::error::AppError;

/// Base URL of a locally running backend.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Backend base URL including the `/api` prefix.
    pub api_url: String,
    /// Delay between job status polls.
    pub poll_interval: Duration,
    /// Consecutive transient poll failures tolerated; `None` is unbounded.
    pub max_poll_failures: Option<u32>,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// OTLP collector endpoint; span export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_failures: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            otlp_endpoint: None,
        }
    }
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the offending variable if a value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the offending variable if a value
    /// cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let poll_interval = match get("TALEWEAVER_POLL_INTERVAL_SECS") {
            Some(raw) => {
                let secs = parse_u64("TALEWEAVER_POLL_INTERVAL_SECS", &raw)?;
                if secs == 0 {
                    return Err(AppError::Config(
                        "TALEWEAVER_POLL_INTERVAL_SECS must be at least 1".to_owned(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => defaults.poll_interval,
        };

        let max_poll_failures = match get("TALEWEAVER_MAX_POLL_FAILURES") {
            Some(raw) => {
                let cap = raw.parse::<u32>().map_err(|e| {
                    AppError::Config(format!("TALEWEAVER_MAX_POLL_FAILURES must be a valid u32: {e}"))
                })?;
                if cap == 0 {
                    return Err(AppError::Config(
                        "TALEWEAVER_MAX_POLL_FAILURES must be at least 1".to_owned(),
                    ));
                }
                Some(cap)
            }
            None => None,
        };

        let request_timeout = match get("TALEWEAVER_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_u64("TALEWEAVER_REQUEST_TIMEOUT_SECS", &raw)?),
            None => defaults.request_timeout,
        };

        Ok(Self {
            api_url: get("TALEWEAVER_API_URL").unwrap_or(defaults.api_url),
            poll_interval,
            max_poll_failures,
            request_timeout,
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    /// Poller settings derived from this configuration.
    #[must_use]
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            poll_interval: self.poll_interval,
            max_consecutive_transient_failures: self.max_poll_failures,
        }
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, AppError> {
    raw.parse()
        .map_err(|e| AppError::Config(format!("{key} must be a valid u64: {e}")))
}
