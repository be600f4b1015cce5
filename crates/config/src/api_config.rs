//! Backend REST API and geocoding endpoints

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote endpoints and their timeouts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// REST API base, ending in `/api/`
    pub base_url: String,

    /// TCP connect deadline in seconds
    pub connect_timeout_secs: u64,

    /// Deadline between two reads of a response, in seconds
    pub read_timeout_secs: u64,

    /// Deadline for a whole request, body upload included, in seconds
    pub write_timeout_secs: u64,

    /// Nominatim-compatible geocoding service
    pub geocoding_url: String,

    /// Addresses kept in the in-process geocoding cache
    pub geocoding_cache_capacity: u64,
}

impl ApiConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api/".to_string(),
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
            geocoding_url: "https://nominatim.openstreetmap.org".to_string(),
            geocoding_cache_capacity: 500,
        }
    }
}

impl ConfigSection for ApiConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::http_url(&self.base_url, "api.base_url"),
            Validator::in_range(self.connect_timeout_secs, 1, 300, "api.connect_timeout_secs"),
            Validator::in_range(self.read_timeout_secs, 1, 300, "api.read_timeout_secs"),
            Validator::in_range(self.write_timeout_secs, 1, 300, "api.write_timeout_secs"),
            Validator::http_url(&self.geocoding_url, "api.geocoding_url"),
            Validator::in_range(
                self.geocoding_cache_capacity,
                1,
                100_000,
                "api.geocoding_cache_capacity",
            ),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.base_url = other.base_url;
        self.connect_timeout_secs = other.connect_timeout_secs;
        self.read_timeout_secs = other.read_timeout_secs;
        self.write_timeout_secs = other.write_timeout_secs;
        self.geocoding_url = other.geocoding_url;
        self.geocoding_cache_capacity = other.geocoding_cache_capacity;
    }

    fn section_name(&self) -> &'static str {
        "api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let config = ApiConfig {
            base_url: "localhost:5000/api/".to_string(),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors[0].field, "api.base_url");
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let config = ApiConfig {
            read_timeout_secs: 0,
            write_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap_err().len(), 2);
    }

    #[test]
    fn test_rejects_empty_geocoding_cache() {
        let config = ApiConfig {
            geocoding_cache_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
