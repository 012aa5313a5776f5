//! Configuration loader for native-guard
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory
pub const CONFIG_FILE: &str = "native-guard.toml";

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_query")]
    pub query: QueryConfig,

    #[serde(default = "default_privileges")]
    pub privileges: PrivilegeConfig,

    #[serde(default = "default_enumeration")]
    pub enumeration: EnumerationConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// Growing-buffer query policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Over-allocation applied to every reported size
    #[serde(default = "default_growth_margin_percent")]
    pub growth_margin_percent: u32,
}

/// Privileges enabled around process inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivilegeConfig {
    #[serde(default = "default_request")]
    pub request: Vec<String>,
}

/// Snapshot enumeration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumerationConfig {
    #[serde(default = "default_include_threads")]
    pub include_threads: bool,
    #[serde(default)]
    pub max_processes: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults only when the file is absent
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads configuration from the default location
pub fn load_config() -> Result<Config, ConfigError> {
    ConfigLoader::new(CONFIG_FILE).load_or_default()
}

// Default functions for serde
fn default_query() -> QueryConfig {
    let defaults = default_config();
    QueryConfig {
        max_retries: defaults.query.max_retries,
        growth_margin_percent: defaults.query.growth_margin_percent,
    }
}

fn default_privileges() -> PrivilegeConfig {
    PrivilegeConfig {
        request: default_config().privileges.request,
    }
}

fn default_enumeration() -> EnumerationConfig {
    let defaults = default_config();
    EnumerationConfig {
        include_threads: defaults.enumeration.include_threads,
        max_processes: defaults.enumeration.max_processes,
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_config().logging.level,
    }
}

// Individual field defaults
fn default_max_retries() -> u32 {
    default_config().query.max_retries
}

fn default_growth_margin_percent() -> u32 {
    default_config().query.growth_margin_percent
}

fn default_request() -> Vec<String> {
    default_config().privileges.request
}

fn default_include_threads() -> bool {
    default_config().enumeration.include_threads
}

fn default_log_level() -> String {
    default_config().logging.level
}

impl Default for Config {
    fn default() -> Self {
        Config {
            query: default_query(),
            privileges: default_privileges(),
            enumeration: default_enumeration(),
            logging: default_logging(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        default_query()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.query.max_retries, 4);
        assert_eq!(config.privileges.request, vec!["SeDebugPrivilege".to_string()]);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file() {
        let loader = ConfigLoader::new("nonexistent-native-guard.toml");
        let result = loader.load();
        assert!(matches!(result.unwrap_err(), ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_or_default() {
        let loader = ConfigLoader::new("nonexistent-native-guard.toml");
        let config = loader.load_or_default().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_reports_parse_errors() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[query\nmax_retries = ").unwrap();

        let result = ConfigLoader::new(&config_path).load_or_default();
        assert!(matches!(result.unwrap_err(), ConfigError::TomlParse(_)));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE);

        let mut config = Config::default();
        config.enumeration.max_processes = Some(64);
        config.privileges.request.push("SeBackupPrivilege".to_string());
        let loader = ConfigLoader::new(&config_path);

        loader.save(&config).unwrap();
        assert!(config_path.exists());

        let loaded = loader.load().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [query]
            max_retries = 8
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.query.max_retries, 8);
        // Check defaults are applied
        assert_eq!(config.query.growth_margin_percent, 12);
        assert!(!config.enumeration.include_threads);
        assert_eq!(config.privileges.request.len(), 1);
    }
}
