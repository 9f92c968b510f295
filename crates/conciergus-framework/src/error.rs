//! Error types for the framework layer.
//!
//! Plugin lifecycle errors live in `conciergus_core::PluginError`; this module
//! only covers storage backends, whose failures are absorbed by
//! [`PluginStorage`](crate::storage::PluginStorage).

use thiserror::Error;

/// Errors raised by a [`KvStore`](crate::storage::KvStore) backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value or the backing document could not be (de)serialized.
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend refused the operation (e.g. quota exceeded).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage backend operations.
pub type StorageResult<T> = Result<T, StorageError>;
