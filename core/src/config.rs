//! Client configuration: base URL and transport timeouts.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8081";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const ENV_BASE_URL: &str = "MOVIES_BASE_URL";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "MOVIES_CONNECT_TIMEOUT_MS";
pub const ENV_READ_TIMEOUT_MS: &str = "MOVIES_READ_TIMEOUT_MS";
pub const ENV_WRITE_TIMEOUT_MS: &str = "MOVIES_WRITE_TIMEOUT_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a number of milliseconds, got {value:?}")]
    InvalidTimeout { var: &'static str, value: String },
}

/// Settings used to build a `MoviesClient` and its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Upper bound on waiting for the response head and body.
    pub read_timeout: Duration,
    /// Upper bound on sending the request head and body.
    pub write_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with the `MOVIES_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(timeout) = millis(&lookup, ENV_CONNECT_TIMEOUT_MS)? {
            config.connect_timeout = timeout;
        }
        if let Some(timeout) = millis(&lookup, ENV_READ_TIMEOUT_MS)? {
            config.read_timeout = timeout;
        }
        if let Some(timeout) = millis(&lookup, ENV_WRITE_TIMEOUT_MS)? {
            config.write_timeout = timeout;
        }
        Ok(config)
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration, write: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u64>()
        .map(|ms| Some(Duration::from_millis(ms)))
        .map_err(|_| ConfigError::InvalidTimeout { var, value })
}
