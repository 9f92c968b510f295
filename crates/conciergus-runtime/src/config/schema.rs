//! Configuration schema definitions.
//!
//! ```toml
//! [conciergus]
//! environment = "production"
//! default_model = "gpt-4o"
//!
//! [logging]
//! level = "debug"
//! format = "pretty"
//!
//! [logging.filters]
//! conciergus_framework = "trace"
//!
//! [storage]
//! backend = "file"
//! path = "/var/lib/conciergus/plugins.json"
//!
//! [plugins.markdown]
//! priority = 10
//! options = { sanitize = true }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use conciergus_core::ConciergusConfig;
use conciergus_framework::PluginConfigPatch;

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    /// Global settings broadcast to every plugin.
    #[serde(default)]
    pub conciergus: ConciergusConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Backend for plugin storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-plugin config overrides keyed by plugin id. They take precedence
    /// over each plugin's own defaults at registration.
    #[serde(default)]
    pub plugins: HashMap<String, PluginConfigPatch>,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Newline-delimited JSON (requires the `json-log` feature).
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When the log file is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids in each line.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line in each line.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Per-target level overrides, e.g. `conciergus_framework = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            filters: HashMap::new(),
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Plugin storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON document on disk, falling back to memory if unusable.
    #[default]
    File,
    /// Process-lifetime map.
    Memory,
}

/// Plugin storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Location of the storage document for the `file` backend.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("conciergus"))
        .unwrap_or_else(|| PathBuf::from(".conciergus"))
        .join("plugin-storage.json")
}
