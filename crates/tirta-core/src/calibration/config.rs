//! Timing configuration for the calibration workflow.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default time a node has to finish a calibration, measured from submission.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default period of the timeout check.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Timing of status polls and the timeout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationConfig {
    /// Interval between status polls. The first poll runs immediately.
    pub poll_interval: Duration,
    /// Time allowed from submission to a terminal status.
    pub timeout: Duration,
    /// Period at which the elapsed time is compared with `timeout`.
    pub tick_interval: Duration,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl CalibrationConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shorter 30 second timeout used by older dashboard builds.
    pub fn legacy() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ..Self::default()
        }
    }

    /// Set the poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout check period.
    #[must_use]
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Validate the config and return an error if invalid.
    ///
    /// Checks that:
    /// - all durations are > 0
    /// - `timeout` >= `poll_interval`
    /// - `timeout` >= `tick_interval`
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_config("poll_interval must be > 0"));
        }
        if self.timeout.is_zero() {
            return Err(Error::invalid_config("timeout must be > 0"));
        }
        if self.tick_interval.is_zero() {
            return Err(Error::invalid_config("tick_interval must be > 0"));
        }
        if self.timeout < self.poll_interval {
            return Err(Error::invalid_config(
                "timeout must be >= poll_interval",
            ));
        }
        if self.timeout < self.tick_interval {
            return Err(Error::invalid_config(
                "timeout must be >= tick_interval",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CalibrationConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_legacy_preset() {
        let config = CalibrationConfig::legacy();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = CalibrationConfig::new().poll_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = CalibrationConfig::new().tick_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_timeout_shorter_than_poll() {
        let config = CalibrationConfig::new()
            .poll_interval(Duration::from_secs(10))
            .timeout(Duration::from_secs(5));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout must be >= poll_interval"));
    }

    #[test]
    fn test_validate_tick_longer_than_timeout() {
        let config = CalibrationConfig::new()
            .timeout(Duration::from_secs(10))
            .tick_interval(Duration::from_secs(20));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout must be >= tick_interval"));
    }
}
