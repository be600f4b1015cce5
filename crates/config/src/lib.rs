//! Reparto configuration
//!
//! One TOML file holds every section; each section implements [`ConfigSection`]
//! so it validates and merges itself. Durable user preferences live in a
//! separate `preferences.toml` next to it.
//!
//! - **Graceful degradation**: invalid values on disk load with a warning
//! - **Strict saves**: invalid values are never written
//! - **Atomic writes**: files are replaced via a temp file and rename
//!
//! # Example
//!
//! ```rust,no_run
//! use reparto_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load_with_env_overrides().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("API: {}", config.api.base_url);
//! ```

mod error;
mod manager;
mod persistence;
mod preferences;
mod validation;

// Config sections
pub mod api_config;
pub mod app_config;
pub mod sync_config;
pub mod tracking_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::{apply_overrides, ConfigManager, ENV_PREFIX};
pub use preferences::{PreferencesStore, RememberedUser, PREFERENCES_FILE};
pub use validation::{ConfigSection, Validator};

pub use api_config::ApiConfig;
pub use app_config::{AppConfig, LogLevel};
pub use sync_config::SyncConfig;
pub use tracking_config::TrackingConfig;

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Local storage and logging
    pub app: AppConfig,

    /// Backend and geocoding endpoints
    pub api: ApiConfig,

    /// Background sync schedule
    pub sync: SyncConfig,

    /// Courier location tracking
    pub tracking: TrackingConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every section, returning all errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.app.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.api.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.sync.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.tracking.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    ///
    /// Override chain: defaults < file < env vars < CLI args
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.api.merge(other.api);
        self.sync.merge(other.sync);
        self.tracking.merge(other.tracking);
    }

    /// Names of all sections, in file order
    pub fn section_names(&self) -> [&'static str; 4] {
        [
            self.app.section_name(),
            self.api.section_name(),
            self.sync.section_name(),
            self.tracking.section_name(),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            api: ApiConfig::default(),
            sync: SyncConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}
