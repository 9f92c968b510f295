//! Configuration module for the Conciergus runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for the global host settings, logging, plugin storage and per-plugin
//! overrides.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, RuntimeConfig, SpanEventConfig,
    StorageBackend, StorageConfig,
};
pub use validation::validate_config;
