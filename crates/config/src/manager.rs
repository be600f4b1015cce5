//! Configuration manager - main API for config operations

use crate::persistence::ConfigPersistence;
use crate::preferences::{PreferencesStore, PREFERENCES_FILE};
use crate::{Config, ConfigError, ConfigResult, LogLevel};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Prefix of environment overrides: `REPARTO_<SECTION>_<FIELD>`
pub const ENV_PREFIX: &str = "REPARTO";

const CONFIG_FILE: &str = "config.toml";

/// Loads, saves and locates configuration
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a new config manager using the platform config directory
    ///
    /// - Linux: `~/.config/reparto/`
    /// - macOS: `~/Library/Application Support/reparto/`
    /// - Windows: `%APPDATA%\reparto\`
    pub fn new() -> ConfigResult<Self> {
        let config_dir = Self::default_config_dir()?;
        Self::with_directory(config_dir)
    }

    /// Creates a config manager with a custom config directory
    pub fn with_directory(config_dir: PathBuf) -> ConfigResult<Self> {
        let persistence = ConfigPersistence::new(config_dir.join(CONFIG_FILE));

        Ok(Self {
            persistence,
            config_dir,
        })
    }

    fn default_config_dir() -> ConfigResult<PathBuf> {
        ProjectDirs::from("", "", "reparto")
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "Could not determine user config directory".to_string(),
            })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.persistence.path().to_path_buf()
    }

    /// Preferences store living beside the config file
    pub fn preferences(&self) -> PreferencesStore {
        PreferencesStore::new(self.config_dir.join(PREFERENCES_FILE))
    }

    /// Cache database location, resolved against the config dir when relative
    pub fn database_path(&self, config: &Config) -> PathBuf {
        let path = &config.app.database_path;
        if path.is_absolute() {
            path.clone()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Loads the configuration file, or the defaults when there is none
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    /// Validates, then saves atomically
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Loads, applies `update_fn`, and saves the result
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use reparto_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| {
    ///     config.sync.interval_minutes = 30;
    /// }).expect("Failed to update config");
    /// ```
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Writes a default config file if none exists
    ///
    /// Returns `Ok(true)` if a new file was created.
    pub fn initialize(&self) -> ConfigResult<bool> {
        let path = self.config_path();
        if path.exists() {
            log::info!("Config file already exists at {}", path.display());
            return Ok(false);
        }

        self.save(&Config::default())?;
        log::info!("Generated default config at {}", path.display());
        Ok(true)
    }

    /// Overwrites the config file with the defaults
    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Validation messages for the file on disk, empty when valid
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;

        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// Loads the file, then applies `REPARTO_*` environment overrides
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_overrides(&mut config, |name| std::env::var(name).ok());

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config validation warnings after env overrides: {:?}",
                errors
            );
        }

        Ok(config)
    }
}

/// Applies overrides read through `lookup`
///
/// Recognised variables: `REPARTO_API_BASE_URL`, `REPARTO_APP_DATABASE_PATH`,
/// `REPARTO_APP_LOG_LEVEL`, `REPARTO_SYNC_INTERVAL_MINUTES`,
/// `REPARTO_TRACKING_INTERVAL_SECS`. Unparsable values are ignored with a
/// warning. Returns how many overrides were applied.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    let var = |section: &str, field: &str| {
        let name = format!("{}_{}_{}", ENV_PREFIX, section, field);
        lookup(&name).map(|value| (name, value))
    };
    let mut applied = 0;

    if let Some((_, url)) = var("API", "BASE_URL") {
        config.api.base_url = url;
        applied += 1;
    }

    if let Some((_, path)) = var("APP", "DATABASE_PATH") {
        config.app.database_path = PathBuf::from(path);
        applied += 1;
    }

    if let Some((name, level)) = var("APP", "LOG_LEVEL") {
        match level.parse::<LogLevel>() {
            Ok(level) => {
                config.app.log_level = level;
                applied += 1;
            }
            Err(e) => log::warn!("Ignoring {}: {}", name, e),
        }
    }

    if let Some((name, minutes)) = var("SYNC", "INTERVAL_MINUTES") {
        match minutes.trim().parse::<u64>() {
            Ok(minutes) => {
                config.sync.interval_minutes = minutes;
                applied += 1;
            }
            Err(e) => log::warn!("Ignoring {}={}: {}", name, minutes, e),
        }
    }

    if let Some((name, secs)) = var("TRACKING", "INTERVAL_SECS") {
        match secs.trim().parse::<u64>() {
            Ok(secs) => {
                config.tracking.interval_secs = secs;
                applied += 1;
            }
            Err(e) => log::warn!("Ignoring {}={}: {}", name, secs, e),
        }
    }

    applied
}
