//! File system persistence for configuration
//!
//! - Atomic writes (no partial/corrupted files)
//! - Backup of the previous file before an overwrite
//! - Directory creation on first save

use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Handles configuration file persistence
pub struct ConfigPersistence {
    config_path: PathBuf,
}

impl ConfigPersistence {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    ///
    /// A missing file yields the defaults. An empty or unparsable file is an
    /// error. Values that fail validation are loaded with a warning.
    pub fn load(&self) -> ConfigResult<Config> {
        let Some(contents) = read_if_exists(&self.config_path)? else {
            log::info!(
                "Config file not found at {}, using defaults",
                self.config_path.display()
            );
            return Ok(Config::default());
        };

        let config: Config = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: self.config_path.clone(),
            source: e,
        })?;

        if config.version > CONFIG_VERSION {
            log::warn!(
                "Config version {} is newer than supported version {}, using as-is",
                config.version,
                CONFIG_VERSION
            );
        }

        if let Err(errors) = config.validate() {
            log::warn!("Config validation warnings: {}", join_errors(&errors));
        }

        Ok(config)
    }

    /// Validates, backs up the current file, then writes atomically
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        if let Err(errors) = config.validate() {
            return Err(ConfigError::ValidationError(join_errors(&errors)));
        }

        if self.config_path.exists() {
            self.backup_config()?;
        }

        let toml_string = toml::to_string_pretty(config)?;
        write_atomic(&self.config_path, &toml_string)?;

        log::info!("Config saved to {}", self.config_path.display());
        Ok(())
    }

    /// Path of the copy kept from the previous save
    pub fn backup_path(&self) -> PathBuf {
        self.config_path.with_extension("toml.backup")
    }

    fn backup_config(&self) -> ConfigResult<()> {
        let backup_path = self.backup_path();
        fs::copy(&self.config_path, &backup_path)
            .map_err(|e| ConfigError::BackupError { source: e })?;
        log::debug!("Backed up config to {}", backup_path.display());
        Ok(())
    }
}

/// Reads a whole file, `None` when it does not exist
///
/// Empty or whitespace-only files are treated as corrupted.
pub(crate) fn read_if_exists(path: &Path) -> ConfigResult<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    if contents.trim().is_empty() {
        return Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "File is empty or contains only whitespace",
            ),
        });
    }

    Ok(Some(contents))
}

/// Writes `content` to a temp file beside `path`, then renames it into place
pub(crate) fn write_atomic(path: &Path, content: &str) -> ConfigResult<()> {
    let dir = path.parent().ok_or_else(|| ConfigError::PathResolutionError {
        reason: format!("{} has no parent directory", path.display()),
    })?;
    ensure_directory_exists(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.flush()?;

    temp_file
        .persist(path)
        .map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e.error,
        })?;

    Ok(())
}

fn ensure_directory_exists(path: &Path) -> ConfigResult<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| ConfigError::DirectoryCreationError {
            path: path.to_path_buf(),
            source: e,
        })?;
        log::info!("Created config directory: {}", path.display());
    }
    Ok(())
}

fn join_errors(errors: &[crate::ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_dir() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.toml");
        (temp_dir, config_path)
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (_temp_dir, config_path) = setup_test_dir();
        let persistence = ConfigPersistence::new(config_path);

        let config = persistence.load().expect("Should load default config");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (_temp_dir, config_path) = setup_test_dir();
        let persistence = ConfigPersistence::new(config_path);

        let mut config = Config::default();
        config.sync.interval_minutes = 45;
        config.tracking.simulate = true;

        persistence.save(&config).expect("Should save config");
        let loaded = persistence.load().expect("Should load config");

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_creates_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("subdir").join("config.toml");
        let persistence = ConfigPersistence::new(config_path.clone());

        persistence
            .save(&Config::default())
            .expect("Should create directory and save");

        assert!(config_path.exists());
    }

    #[test]
    fn test_backup_holds_previous_contents() {
        let (_temp_dir, config_path) = setup_test_dir();
        let persistence = ConfigPersistence::new(config_path);

        let mut first = Config::default();
        first.sync.max_retries = 1;
        persistence.save(&first).expect("Should save config");
        persistence
            .save(&Config::default())
            .expect("Should save config again");

        let backup = fs::read_to_string(persistence.backup_path()).expect("Backup exists");
        let backed_up: Config = toml::from_str(&backup).expect("Backup parses");
        assert_eq!(backed_up.sync.max_retries, 1);
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(&config_path, "this is not valid TOML {{{").expect("Should write file");

        let persistence = ConfigPersistence::new(config_path);
        let result = persistence.load();

        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(&config_path, "  \n").expect("Should write file");

        let persistence = ConfigPersistence::new(config_path);
        assert!(matches!(
            persistence.load(),
            Err(ConfigError::ReadError { .. })
        ));
    }

    #[test]
    fn test_invalid_values_load_with_warning() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(&config_path, "[sync]\ninterval_minutes = 1\n").expect("Should write file");

        let persistence = ConfigPersistence::new(config_path);
        let config = persistence.load().expect("Invalid values still load");
        assert_eq!(config.sync.interval_minutes, 1);
    }

    #[test]
    fn test_validate_before_save() {
        let (_temp_dir, config_path) = setup_test_dir();
        let persistence = ConfigPersistence::new(config_path.clone());

        let mut config = Config::default();
        config.sync.interval_minutes = 5;

        let result = persistence.save(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
        assert!(!config_path.exists());
    }
}
