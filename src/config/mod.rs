//! Configuration module for native-guard
//!
//! Provides configuration loading, validation, and default settings
//! for the growing-buffer policy, privilege requests and enumeration.

mod defaults;
mod loader;
mod validator;

pub use defaults::{default_config, ConfigDefaults};
pub use loader::{load_config, ConfigLoader, CONFIG_FILE};
pub use validator::{validate_config, ConfigValidator, MAX_QUERY_RETRIES};

// Re-export the configuration structures
pub use loader::{Config, EnumerationConfig, LoggingConfig, PrivilegeConfig, QueryConfig};

// Configuration-related error type
pub use loader::ConfigError;

// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;
