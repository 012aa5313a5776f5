//! Default configuration values for native-guard

use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub query: QueryDefaults,
    pub privileges: PrivilegeDefaults,
    pub enumeration: EnumerationDefaults,
    pub logging: LoggingDefaults,
}

/// Default growing-buffer query policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDefaults {
    pub max_retries: u32,
    pub growth_margin_percent: u32,
}

/// Default privilege request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivilegeDefaults {
    pub request: Vec<String>,
}

/// Default enumeration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumerationDefaults {
    pub include_threads: bool,
    pub max_processes: Option<usize>,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        query: QueryDefaults {
            max_retries: 4,
            growth_margin_percent: 12,
        },
        privileges: PrivilegeDefaults {
            request: vec!["SeDebugPrivilege".to_string()],
        },
        enumeration: EnumerationDefaults {
            include_threads: false,
            max_processes: None,
        },
        logging: LoggingDefaults {
            level: "info".to_string(),
        },
    }
}
