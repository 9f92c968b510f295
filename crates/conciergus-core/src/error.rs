//! Error types for the Conciergus plugin system.

use thiserror::Error;

/// Boxed error returned by plugin hooks.
///
/// Hooks are plugin-supplied code, so the manager accepts any error type and
/// wraps it into the matching [`PluginError`] variant.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by registration and explicit lifecycle calls.
///
/// Dispatch and broadcast failures never produce a `PluginError`; they are
/// logged through the failing plugin's logger and swallowed.
#[derive(Error, Debug)]
pub enum PluginError {
    /// Plugin metadata is malformed.
    #[error("Invalid plugin metadata: `{field}` {reason}")]
    Validation {
        /// Offending metadata field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A plugin with the same id is already registered.
    #[error("Plugin already registered: {0}")]
    DuplicateId(String),

    /// No plugin with this id is registered.
    #[error("Plugin not registered: {0}")]
    NotRegistered(String),

    /// `on_load` failed; the registration was rolled back.
    #[error("Plugin '{id}' failed to load: {source}")]
    Load {
        id: String,
        #[source]
        source: BoxError,
    },

    /// `on_unload` failed; the plugin stays registered.
    #[error("Plugin '{id}' failed to unload: {source}")]
    Unload {
        id: String,
        #[source]
        source: BoxError,
    },

    /// `on_enable` failed; the plugin stays disabled.
    #[error("Plugin '{id}' failed to enable: {source}")]
    Enable {
        id: String,
        #[source]
        source: BoxError,
    },

    /// `on_disable` failed; the plugin stays enabled.
    #[error("Plugin '{id}' failed to disable: {source}")]
    Disable {
        id: String,
        #[source]
        source: BoxError,
    },

    /// The merged configuration violates the plugin's config schema.
    #[error("Invalid configuration for plugin '{id}': {}", errors.join("; "))]
    InvalidConfig { id: String, errors: Vec<String> },

    /// `on_config_change` failed; the previous configuration was restored.
    #[error("Plugin '{id}' rejected configuration change: {source}")]
    ConfigChange {
        id: String,
        #[source]
        source: BoxError,
    },
}

impl PluginError {
    /// Creates a validation error for the given metadata field.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Returns the id of the plugin this error concerns, if any.
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            Self::Validation { .. } => None,
            Self::DuplicateId(id) | Self::NotRegistered(id) => Some(id),
            Self::Load { id, .. }
            | Self::Unload { id, .. }
            | Self::Enable { id, .. }
            | Self::Disable { id, .. }
            | Self::InvalidConfig { id, .. }
            | Self::ConfigChange { id, .. } => Some(id),
        }
    }
}

/// Result type for plugin management operations.
pub type PluginResult<T> = Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_lists_every_violation() {
        let err = PluginError::InvalidConfig {
            id: "filter".into(),
            errors: vec!["a is required".into(), "b must be number".into()],
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration for plugin 'filter': a is required; b must be number"
        );
        assert_eq!(err.plugin_id(), Some("filter"));
    }

    #[test]
    fn test_lifecycle_error_keeps_source() {
        let cause: BoxError = "boom".into();
        let err = PluginError::Load {
            id: "p".into(),
            source: cause,
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("boom"));
    }
}
