//! Background sync schedule

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest periodic interval the scheduler accepts, in minutes
pub const MIN_INTERVAL_MINUTES: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Minutes between periodic runs
    pub interval_minutes: u64,

    /// Retries after a failed run before it is reported as failed
    pub max_retries: u32,

    /// First retry delay in seconds; doubles on every further retry
    pub initial_backoff_secs: u64,

    /// Wait for connectivity before each run
    pub requires_network: bool,

    /// Synced location pings older than this are deleted
    pub ping_retention_hours: u32,
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_minutes: MIN_INTERVAL_MINUTES,
            max_retries: 3,
            initial_backoff_secs: 30,
            requires_network: true,
            ping_retention_hours: 72,
        }
    }
}

impl ConfigSection for SyncConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::in_range(
                self.interval_minutes,
                MIN_INTERVAL_MINUTES,
                24 * 60,
                "sync.interval_minutes",
            ),
            Validator::in_range(self.max_retries, 0, 10, "sync.max_retries"),
            Validator::in_range(self.initial_backoff_secs, 1, 3600, "sync.initial_backoff_secs"),
            Validator::at_least(self.ping_retention_hours, 1, "sync.ping_retention_hours"),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.interval_minutes = other.interval_minutes;
        self.max_retries = other.max_retries;
        self.initial_backoff_secs = other.initial_backoff_secs;
        self.requires_network = other.requires_network;
        self.ping_retention_hours = other.ping_retention_hours;
    }

    fn section_name(&self) -> &'static str {
        "sync"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval(), Duration::from_secs(15 * 60));
        assert_eq!(config.initial_backoff(), Duration::from_secs(30));
    }

    #[test]
    fn test_interval_below_minimum() {
        let config = SyncConfig {
            interval_minutes: 14,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors[0].field, "sync.interval_minutes");
    }

    #[test]
    fn test_zero_retention_rejected() {
        let config = SyncConfig {
            ping_retention_hours: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge() {
        let mut base = SyncConfig::default();
        base.merge(SyncConfig {
            requires_network: false,
            max_retries: 5,
            ..Default::default()
        });
        assert!(!base.requires_network);
        assert_eq!(base.max_retries, 5);
    }
}
