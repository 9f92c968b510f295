//! Host-owned global configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Deployment environment.
///
/// Used both by the host ([`ConciergusConfig::environment`]) and by each
/// plugin's config to declare where it is meant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Test,
    /// Any environment.
    #[default]
    All,
}

impl Environment {
    /// Returns the environment name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
            Self::All => "all",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global configuration handed to the plugin manager by the host.
///
/// The plugin system only reads and broadcasts this value. Host-specific
/// keys that the plugin system does not know about land in
/// [`extra`](Self::extra).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConciergusConfig {
    /// Environment the host is running in.
    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// Enables verbose diagnostics in plugins that honor it.
    #[serde(default)]
    pub debug: bool,

    /// Model identifier used when a request does not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    #[serde(default)]
    pub telemetry_enabled: bool,

    /// Host-defined keys.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

fn default_environment() -> Environment {
    Environment::Development
}

impl Default for ConciergusConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            debug: false,
            default_model: None,
            telemetry_enabled: false,
            extra: Map::new(),
        }
    }
}

impl ConciergusConfig {
    /// Looks up a host-defined key.
    pub fn get_extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}
