//! Edge case and error scenario tests

use std::fs;
use std::path::PathBuf;
use reparto_config::{Config, ConfigError, ConfigManager};
use tempfile::TempDir;

fn setup_test_manager() -> Result<(TempDir, ConfigManager), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())?;
    Ok((temp_dir, manager))
}

#[test]
fn test_corrupted_config_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    fs::write(manager.config_path(), "this is not valid TOML {{{")?;

    assert!(matches!(
        manager.load(),
        Err(ConfigError::ParseError { .. })
    ));
    assert_eq!(manager.load_or_default(), Config::default());

    Ok(())
}

#[test]
fn test_save_creates_parent_directories() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let nested_path = temp_dir.path().join("a").join("b").join("c");
    let manager = ConfigManager::with_directory(nested_path)?;

    manager.save(&Config::default())?;
    assert!(manager.config_path().exists());

    Ok(())
}

#[test]
fn test_boundary_values_validation() {
    let mut config = Config::default();

    config.sync.interval_minutes = 15;
    config.tracking.interval_secs = 1;
    assert!(config.validate().is_ok());

    config.sync.interval_minutes = 24 * 60;
    config.tracking.interval_secs = 3600;
    assert!(config.validate().is_ok());

    config.sync.interval_minutes = 14;
    assert!(config.validate().is_err());

    config.sync.interval_minutes = 15;
    config.tracking.interval_secs = 3601;
    assert!(config.validate().is_err());
}

#[test]
fn test_special_characters_in_database_path() {
    let mut config = Config::default();
    config.app.database_path = PathBuf::from("/path/with spaces/reparto cache.db");
    assert!(config.validate().is_ok());
}

#[test]
fn test_https_base_url_accepted() {
    let mut config = Config::default();
    config.api.base_url = "https://api.reparto.example.com/api/".to_string();
    assert!(config.validate().is_ok());
}

#[test]
#[cfg(unix)]
fn test_readonly_config_dir() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::fs::PermissionsExt;

    let (_temp_dir, manager) = setup_test_manager()?;
    manager.initialize()?;

    let dir = manager.config_dir().to_path_buf();
    let mut perms = fs::metadata(&dir)?.permissions();
    perms.set_mode(0o555);
    fs::set_permissions(&dir, perms)?;

    let result = manager.save(&Config::default());

    let mut perms = fs::metadata(&dir)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&dir, perms)?;

    // root ignores permission bits
    if result.is_ok() {
        return Ok(());
    }
    assert!(manager.load().is_ok());

    Ok(())
}

#[test]
fn test_rapid_saves() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    let mut config = Config::default();

    for i in 0..100 {
        config.sync.interval_minutes = 15 + i;
        manager.save(&config)?;
    }

    assert_eq!(manager.load()?.sync.interval_minutes, 114);
    Ok(())
}

#[test]
fn test_merge_with_defaults() {
    let mut base = Config::default();
    base.tracking.interval_secs = 90;

    base.merge(Config::default());

    assert_eq!(base.tracking.interval_secs, 10);
}

#[test]
fn test_config_file_deleted_during_operation() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.initialize()?;

    fs::remove_file(manager.config_path())?;

    assert_eq!(manager.load_or_default(), Config::default());
    Ok(())
}

#[test]
fn test_empty_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    fs::write(manager.config_path(), "")?;

    assert!(manager.load().is_err());
    assert_eq!(manager.load_or_default(), Config::default());

    Ok(())
}

#[test]
fn test_partial_config_toml() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    let partial_toml = r#"
version = 1

[api]
base_url = "http://192.168.1.20:5000/api/"
"#;

    fs::write(manager.config_path(), partial_toml)?;

    let config = manager.load()?;
    assert_eq!(config.api.base_url, "http://192.168.1.20:5000/api/");
    assert_eq!(config.api.read_timeout_secs, 30);
    assert_eq!(config.sync.interval_minutes, 15);

    Ok(())
}

#[test]
fn test_unknown_keys_are_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    fs::write(
        manager.config_path(),
        "[player]\ndefault_volume = 80\n\n[tracking]\nsimulate = true\n",
    )?;

    let config = manager.load()?;
    assert!(config.tracking.simulate);

    Ok(())
}

#[test]
fn test_update_with_invalid_value() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.initialize()?;

    let result = manager.update(|config| {
        config.sync.interval_minutes = 1;
    });

    assert!(result.is_err());
    assert_eq!(manager.load()?.sync.interval_minutes, 15);

    Ok(())
}

#[test]
fn test_backup_preserved_on_failed_save() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    let mut config = Config::default();
    config.sync.max_retries = 2;
    manager.save(&config)?;
    manager.save(&config)?;

    config.sync.max_retries = 200;
    assert!(manager.save(&config).is_err());

    let backup_path = manager.config_path().with_extension("toml.backup");
    let backup_config: Config = toml::from_str(&fs::read_to_string(&backup_path)?)?;
    assert_eq!(backup_config.sync.max_retries, 2);
    assert_eq!(manager.load()?.sync.max_retries, 2);

    Ok(())
}
