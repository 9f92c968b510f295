//! Per-plugin configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use conciergus_core::Environment;

/// Mutable settings of one registered plugin.
///
/// Created at registration as manager defaults ← plugin defaults ← host
/// override, then replaced wholesale by
/// [`PluginManager::update_config`](crate::PluginManager::update_config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    pub enabled: bool,
    /// Plugin-defined options.
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Dispatch ordering; higher runs first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub environment: Environment,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            options: Map::new(),
            priority: 0,
            environment: Environment::All,
        }
    }
}

impl PluginConfig {
    /// Returns a copy with every field present in `patch` replaced.
    ///
    /// The merge is shallow: a patch carrying `options` replaces the whole
    /// options map.
    pub fn merged(&self, patch: &PluginConfigPatch) -> Self {
        Self {
            enabled: patch.enabled.unwrap_or(self.enabled),
            options: patch
                .options
                .clone()
                .unwrap_or_else(|| self.options.clone()),
            priority: patch.priority.unwrap_or(self.priority),
            environment: patch.environment.unwrap_or(self.environment),
        }
    }

    /// JSON form used for schema validation.
    pub fn to_value(&self) -> Value {
        json!({
            "enabled": self.enabled,
            "options": Value::Object(self.options.clone()),
            "priority": self.priority,
            "environment": self.environment.as_str(),
        })
    }
}

/// A partial [`PluginConfig`]; absent fields keep their current value.
///
/// Used for plugin-declared defaults, host overrides from the config file,
/// and runtime updates.
///
/// ```rust
/// use conciergus_framework::PluginConfigPatch;
///
/// let patch = PluginConfigPatch::new().priority(10).option("mask", "*");
/// assert_eq!(patch.priority, Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
}

impl PluginConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Replaces the options map.
    pub fn options(mut self, options: Map<String, Value>) -> Self {
        self.options = Some(options);
        self
    }

    /// Adds a single option, creating the options map if needed.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}
