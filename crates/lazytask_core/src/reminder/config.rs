//! Reminder configuration.
//!
//! # Invariants
//! - `threshold_ms > 0` and `tick_interval_ms > 0` after `validate()`.
//! - Missing JSON fields fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Default "due soon" window: 60 minutes.
pub const DEFAULT_THRESHOLD_MS: i64 = 60 * 60 * 1000;
/// Default evaluation cadence: one minute.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 60 * 1000;

/// Tunables for the reminder scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Width of the "due soon" window in milliseconds, inclusive.
    pub threshold_ms: i64,
    /// Period of the interval trigger in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            threshold_ms: DEFAULT_THRESHOLD_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    NonPositiveThreshold(i64),
    ZeroTickInterval,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid reminder config: {err}"),
            Self::NonPositiveThreshold(value) => {
                write!(f, "threshold_ms must be positive, got {value}")
            }
            Self::ZeroTickInterval => write!(f, "tick_interval_ms must be positive"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::NonPositiveThreshold(_) | Self::ZeroTickInterval => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl ReminderConfig {
    /// Parses and validates a JSON config object.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold_ms <= 0 {
            return Err(ConfigError::NonPositiveThreshold(self.threshold_ms));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Soon window rounded down to whole minutes, for user-facing text.
    pub fn threshold_minutes(&self) -> i64 {
        self.threshold_ms / 60_000
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ReminderConfig, DEFAULT_THRESHOLD_MS};

    #[test]
    fn defaults_match_documented_values() {
        let config = ReminderConfig::default();
        assert_eq!(config.threshold_ms, 3_600_000);
        assert_eq!(config.tick_interval_ms, 60_000);
        assert_eq!(config.threshold_minutes(), 60);
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config = ReminderConfig::from_json(r#"{"tick_interval_ms": 5000}"#).unwrap();
        assert_eq!(config.tick_interval_ms, 5_000);
        assert_eq!(config.threshold_ms, DEFAULT_THRESHOLD_MS);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ReminderConfig::from_json(r#"{"threshold_ms": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveThreshold(0)));

        let err = ReminderConfig::from_json(r#"{"tick_interval_ms": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTickInterval));

        let err = ReminderConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
