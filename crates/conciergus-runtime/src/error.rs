//! Runtime error types.

use thiserror::Error;

use conciergus_core::PluginError;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Loading or validating the runtime configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A plugin operation failed.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Installing a shutdown signal handler failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
