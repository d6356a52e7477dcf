//! Daemon configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use medlink_core::models::parse_time_of_day;
use thiserror::Error;

pub const ENV_DB_PATH: &str = "MEDLINK_DB_PATH";
pub const ENV_POLL_SECS: &str = "MEDLINK_POLL_SECS";
pub const ENV_SWEEP_AT: &str = "MEDLINK_SWEEP_AT";
pub const ENV_REMINDER_GRACE_SECS: &str = "MEDLINK_REMINDER_GRACE_SECS";
pub const ENV_EXPO_PUSH_URL: &str = "MEDLINK_EXPO_PUSH_URL";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive number of seconds, got '{value}'")]
    InvalidSeconds { key: &'static str, value: String },

    #[error("{key} must be HH:MM, got '{value}'")]
    InvalidTime { key: &'static str, value: String },
}

/// Settings shared by both background loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub database_path: PathBuf,
    /// Sleep between loop iterations
    pub poll_interval: Duration,
    /// Local wall-clock time of the daily expiry sweep
    pub sweep_at: NaiveTime,
    /// How late after its time a reminder may still be sent
    pub reminder_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("medlink.db"),
            poll_interval: Duration::from_secs(60),
            sweep_at: NaiveTime::MIN,
            reminder_grace: Duration::from_secs(120),
        }
    }
}

impl SchedulerConfig {
    /// Read overrides from `MEDLINK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(value) = lookup(ENV_POLL_SECS) {
            config.poll_interval = parse_seconds(ENV_POLL_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_SWEEP_AT) {
            config.sweep_at = parse_time_of_day(&value).ok_or(ConfigError::InvalidTime {
                key: ENV_SWEEP_AT,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_REMINDER_GRACE_SECS) {
            config.reminder_grace = parse_seconds(ENV_REMINDER_GRACE_SECS, &value)?;
        }

        Ok(config)
    }
}

fn parse_seconds(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidSeconds {
            key,
            value: value.to_string(),
        }),
    }
}

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medlink_core=info,medlink_scheduler=info,medlinkd=info"
}
