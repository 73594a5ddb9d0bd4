use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::source::FileFormat;

pub const DEFAULT_API_BASE_URL: &str = "https://api.iterable.com/api";
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    pub api: ApiConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub batching: BatchingConfig,
    #[serde(default)]
    pub errors: ErrorOutputConfig,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub path: String,
    pub format: FileFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchingConfig {
    #[serde(default = "default_batch_size")]
    pub users_per_batch: usize,
    #[serde(default = "default_batch_size")]
    pub events_per_batch: usize,
}

/// Where failures are written. An absent path means the failures are only logged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ErrorOutputConfig {
    pub map_error_out: Option<String>,
    pub api_error_out: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    5
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            users_per_batch: DEFAULT_BATCH_SIZE,
            events_per_batch: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingField {
                field: "api.api_key".to_string(),
            });
        }
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "api.base_url".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "timeout must be greater than 0, 0 provided".to_string(),
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "max_retries must be greater than 0, 0 provided".to_string(),
            });
        }
        Ok(())
    }
}

impl BatchingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.users_per_batch < 1 {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "users_per_batch must be at least 1, {} provided",
                    self.users_per_batch
                ),
            });
        }
        if self.events_per_batch < 1 {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "events_per_batch must be at least 1, {} provided",
                    self.events_per_batch
                ),
            });
        }
        Ok(())
    }
}

pub async fn load_config(config_path: Option<&str>) -> Result<ImportConfig, ConfigError> {
    match config_path {
        Some(path) => ImportConfig::from_file(path),
        None => ImportConfig::from_env(),
    }
}

impl ImportConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            origin: path.to_string(),
            error: Box::new(e),
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            origin: path.to_string(),
            error: Box::new(e),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let config_str = std::env::var("IMPORT_CONFIG").map_err(|_| ConfigError::Invalid {
            message: "IMPORT_CONFIG environment variable not set".to_string(),
        })?;
        serde_yaml::from_str(&config_str).map_err(|e| ConfigError::LoadFailed {
            origin: "IMPORT_CONFIG".to_string(),
            error: Box::new(e),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()?;
        if self.source.path.is_empty() {
            return Err(ConfigError::MissingField {
                field: "source.path".to_string(),
            });
        }
        self.batching.validate()?;
        Ok(())
    }
}
