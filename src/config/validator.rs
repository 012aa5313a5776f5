//! Configuration validator for native-guard
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{
    Config, ConfigError, EnumerationConfig, LoggingConfig, PrivilegeConfig, QueryConfig,
};

/// Upper bound on growing-buffer retries
pub const MAX_QUERY_RETRIES: u32 = 32;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_query(&config.query)?;
        Self::validate_privileges(&config.privileges)?;
        Self::validate_enumeration(&config.enumeration)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    fn validate_query(query: &QueryConfig) -> Result<(), ConfigError> {
        if query.max_retries > MAX_QUERY_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "Query max_retries cannot exceed {}",
                MAX_QUERY_RETRIES
            )));
        }

        if query.growth_margin_percent > 100 {
            return Err(ConfigError::Invalid(
                "Query growth_margin_percent cannot exceed 100".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_privileges(privileges: &PrivilegeConfig) -> Result<(), ConfigError> {
        for name in &privileges.request {
            if !name.starts_with("Se") || !name.ends_with("Privilege") || name.len() <= 11 {
                return Err(ConfigError::Invalid(format!(
                    "Invalid privilege name: {}",
                    name
                )));
            }
        }
        Ok(())
    }

    fn validate_enumeration(enumeration: &EnumerationConfig) -> Result<(), ConfigError> {
        if enumeration.max_processes == Some(0) {
            return Err(ConfigError::Invalid(
                "Enumeration max_processes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, valid_levels
            )));
        }
        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}
