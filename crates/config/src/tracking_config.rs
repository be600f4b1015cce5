//! Courier location tracking

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    /// Seconds between two position readings
    pub interval_secs: u64,

    /// Walk a simulated route instead of reading a real provider
    pub simulate: bool,
}

impl TrackingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            simulate: false,
        }
    }
}

impl ConfigSection for TrackingConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::in_range(self.interval_secs, 1, 3600, "tracking.interval_secs")
            .map_err(|e| vec![e])
    }

    fn merge(&mut self, other: Self) {
        self.interval_secs = other.interval_secs;
        self.simulate = other.simulate;
    }

    fn section_name(&self) -> &'static str {
        "tracking"
    }
}
