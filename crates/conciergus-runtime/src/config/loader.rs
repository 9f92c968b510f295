//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config`: enables TOML configuration files (`conciergus.toml`)
//! - `yaml-config`: enables YAML configuration files (`conciergus.yaml`, `conciergus.yml`)
//!
//! Both can be enabled at once, in which case both formats are searched.
//! With neither enabled only defaults and environment variables apply.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic layers added with [`ConfigLoader::merge`]
//! 3. Main config file (`conciergus.toml` / `conciergus.yaml`)
//! 4. Profile-specific config file (`conciergus.{profile}.toml`)
//! 5. Environment variables (`CONCIERGUS_*`)
//!
//! # Environment Variable Mapping
//!
//! Variables use the `CONCIERGUS_` prefix with `__` as the nesting separator:
//!
//! - `CONCIERGUS_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `CONCIERGUS_STORAGE__BACKEND=memory` → `storage.backend = "memory"`
//! - `CONCIERGUS_PLUGINS__MARKDOWN__PRIORITY=5` → `plugins.markdown.priority = 5`
//!
//! `CONCIERGUS_PROFILE` selects the profile and is not mapped.
//!
//! # Example
//!
//! ```rust,ignore
//! use conciergus_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/conciergus.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::RuntimeConfig;

const ENV_PREFIX: &str = "CONCIERGUS_";
const PROFILE_VAR: &str = "CONCIERGUS_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting `dev` and `prod` as shorthands.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `CONCIERGUS_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<user config dir>/conciergus` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("conciergus")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Adds a programmatic layer above the built-in defaults.
    pub fn merge(mut self, config: RuntimeConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<RuntimeConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: RuntimeConfig = figment.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;

        debug!(
            profile       = %profile,
            logging_level = %config.logging.level,
            overrides     = config.plugins.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(RuntimeConfig::default()));

        let user_figment = std::mem::take(&mut self.figment);
        figment = figment.merge(user_figment);

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["PROFILE"])
                    .split("__"),
            );
        }

        Ok(figment)
    }

    /// Merges a single config file, dispatching on its extension.
    ///
    /// Only extensions enabled via feature flags are accepted.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => {
                let _ = figment;
                Err(ConfigError::ParseError(format!(
                    "Unsupported or disabled configuration file format: .{ext}"
                )))
            }
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("conciergus"));
        }
        paths
    }

    /// Finds the first search path holding one of `base_names` and merges
    /// that file, then its profile-specific sibling on top.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let base_path = search_path.join(base_name);
                if !base_path.exists() {
                    continue;
                }
                info!(path = %base_path.display(), "Loading configuration file");
                figment = merge_fn(figment, &base_path);

                if let Some((stem, ext)) = base_name.rsplit_once('.') {
                    let profile_path =
                        search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                    if profile_path.exists() {
                        debug!(path = %profile_path.display(), "Loading profile-specific config");
                        figment = merge_fn(figment, &profile_path);
                    }
                }
                return (figment, true);
            }
        }
        (figment, false)
    }

    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_mut)
    )]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["conciergus.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["conciergus.yaml", "conciergus.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!(paths = ?search_paths, "No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads configuration from the default locations and environment.
pub fn load_config() -> ConfigResult<RuntimeConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path` plus environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<RuntimeConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================
