//! Errors raised while loading and validating `conciergus.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Figment could not merge or extract the sources, e.g. an unknown log
    /// level or a malformed TOML file.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {message}")]
    ValidationError { message: String },

    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// A `logging.filters` key that `EnvFilter` would not accept as a target.
    #[error("Invalid logging filter target: {0:?}")]
    InvalidFilterTarget(String),

    /// A `[plugins.<id>]` table whose id is blank.
    #[error("Invalid plugin override id: {0:?}")]
    InvalidPluginOverride(String),
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
