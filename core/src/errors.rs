use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    #[error("Unsupported import action: {reason}")]
    UnsupportedAction { reason: String },

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Failed to load configuration from {origin}: {error}")]
    LoadFailed {
        origin: String,
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open {path}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read CSV record: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON record on line {line}: {reason}")]
    Json { line: usize, reason: String },

    #[error("Failed to read line {line}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the user-supplied map function for a single record.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("{0}")]
    Failed(#[from] anyhow::Error),

    #[error("map function panicked: {0}")]
    Panicked(String),

    #[error("{kind} action has neither email nor userId")]
    MissingIdentity { kind: &'static str },
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Failed to create API client: {reason}")]
    ClientCreation { reason: String },

    #[error("Request to {url} failed after {attempts} attempt(s): {reason}")]
    Transport {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Failed to read response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ImportError>;
