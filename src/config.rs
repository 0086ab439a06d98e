use chrono::Duration;
use std::env;
use std::path::PathBuf;
use std::time::Duration as StdDuration;
use thiserror::Error;

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Feed file to replay; stdin when unset.
    pub feed_path: Option<PathBuf>,
    pub short_poll_timeout: Duration,
    pub sweep_interval: StdDuration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_path: None,
            short_poll_timeout: crate::poll::SHORT_POLL_TIMEOUT,
            sweep_interval: StdDuration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl Config {
    /// Reads configuration from the environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let feed_path = lookup("POLL_FEED_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        let short_poll_timeout = match lookup("POLL_SHORT_POLL_TIMEOUT_MS") {
            Some(value) => Duration::milliseconds(parse_positive("POLL_SHORT_POLL_TIMEOUT_MS", &value)? as i64),
            None => defaults.short_poll_timeout,
        };
        let sweep_interval = match lookup("POLL_SWEEP_INTERVAL_SECS") {
            Some(value) => StdDuration::from_secs(parse_positive("POLL_SWEEP_INTERVAL_SECS", &value)?),
            None => defaults.sweep_interval,
        };
        Ok(Self { feed_path, short_poll_timeout, sweep_interval })
    }
}

fn parse_positive(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(parsed) if parsed > 0 => Ok(u64::from(parsed)),
        _ => Err(ConfigError::InvalidNumber { name, value: value.to_string() }),
    }
}
