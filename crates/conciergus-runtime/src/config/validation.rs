//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, RuntimeConfig, StorageBackend, StorageConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &RuntimeConfig) -> ConfigResult<()> {
    validate_global_config(config)?;
    validate_logging_config(&config.logging)?;
    validate_storage_config(&config.storage)?;
    validate_plugin_overrides(config)?;
    Ok(())
}

fn validate_global_config(config: &RuntimeConfig) -> ConfigResult<()> {
    if let Some(model) = &config.conciergus.default_model
        && model.trim().is_empty()
    {
        return Err(ConfigError::validation(
            "conciergus.default_model cannot be an empty string",
        ));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    for target in logging.filters.keys() {
        if target.is_empty() || target.contains(char::is_whitespace) || target.contains('=') {
            return Err(ConfigError::InvalidFilterTarget(target.clone()));
        }
    }
    Ok(())
}

fn validate_storage_config(storage: &StorageConfig) -> ConfigResult<()> {
    if storage.backend == StorageBackend::File && storage.path.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("storage.path"));
    }
    Ok(())
}

fn validate_plugin_overrides(config: &RuntimeConfig) -> ConfigResult<()> {
    for id in config.plugins.keys() {
        if id.trim().is_empty() {
            return Err(ConfigError::InvalidPluginOverride(id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use conciergus_framework::PluginConfigPatch;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&RuntimeConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_storage_path() {
        let mut config = RuntimeConfig::default();
        config.storage.path = PathBuf::new();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { ref field }) if field == "storage.path"
        ));

        config.storage.backend = StorageBackend::Memory;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_file_output_requires_path() {
        let mut config = RuntimeConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some(PathBuf::from("conciergus.log"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_filter_targets() {
        let mut config = RuntimeConfig::default();
        config
            .logging
            .filters
            .insert("conciergus framework".into(), LogLevel::Debug);
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidFilterTarget(ref t)) if t == "conciergus framework"
        ));
    }

    #[test]
    fn test_validate_blank_override_id() {
        let mut config = RuntimeConfig::default();
        config.plugins.insert(" ".into(), PluginConfigPatch::new());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPluginOverride(_))
        ));
    }
}
