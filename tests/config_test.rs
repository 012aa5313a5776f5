//! Integration tests for configuration driving the query policy

use native_guard::config::{validate_config, Config, ConfigError, ConfigLoader};
use native_guard::GrowingBufferQuery;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_partial_file_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("native-guard.toml");
    fs::write(&path, "[query]\nmax_retries = 9\n").unwrap();

    let config = ConfigLoader::new(&path).load().unwrap();
    assert_eq!(config.query.max_retries, 9);
    assert_eq!(config.query.growth_margin_percent, 12);
    assert_eq!(config.privileges.request, vec!["SeDebugPrivilege".to_string()]);
    validate_config(&config).unwrap();

    let query = GrowingBufferQuery::from_config(&config.query);
    assert_eq!(query.max_retries(), 9);
    assert_eq!(query.allocation_size(100), 112);
}

#[test]
fn test_invalid_values_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("native-guard.toml");
    fs::write(
        &path,
        "[privileges]\nrequest = [\"DebugPrivilege\"]\n[enumeration]\nmax_processes = 0\n",
    )
    .unwrap();

    let config = ConfigLoader::new(&path).load().unwrap();
    assert!(matches!(validate_config(&config), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_missing_file_uses_defaults_but_bad_toml_fails() {
    let dir = TempDir::new().unwrap();
    let missing = ConfigLoader::new(dir.path().join("absent.toml"));
    assert_eq!(missing.load_or_default().unwrap(), Config::default());

    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "[query\nmax_retries = ").unwrap();
    assert!(matches!(
        ConfigLoader::new(&broken).load_or_default(),
        Err(ConfigError::TomlParse(_))
    ));
}

#[test]
fn test_save_round_trip() {
    let dir = TempDir::new().unwrap();
    let loader = ConfigLoader::new(dir.path().join("saved.toml"));
    let mut config = Config::default();
    config.enumeration.include_threads = true;
    config.logging.level = "debug".to_string();

    loader.save(&config).unwrap();
    assert_eq!(loader.load().unwrap(), config);
}
