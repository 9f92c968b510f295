//! The per-plugin service bundle.
//!
//! One [`PluginContext`] is built when a plugin registers and lives exactly as
//! long as the registration. It is the only handle a plugin's hooks receive,
//! and it is never shared with another plugin:
//!
//! - **Identity**: the plugin's [`PluginMetadata`].
//! - **Configuration**: the plugin's current [`PluginConfig`] and the latest
//!   global [`ConciergusConfig`] snapshot. These are the only mutable parts;
//!   the manager updates them in place.
//! - **Services**: a [`PluginLogger`], a namespaced [`PluginStorage`], a
//!   private [`PluginEventEmitter`] and [`PluginUtils`].

use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use conciergus_core::{ConciergusConfig, PluginMetadata};

use crate::events::PluginEventEmitter;
use crate::logger::PluginLogger;
use crate::plugin::PluginConfig;
use crate::storage::{KvStore, PluginStorage};
use crate::utils::PluginUtils;

/// Context passed to every hook of one plugin.
///
/// # Example
///
/// ```rust,ignore
/// async fn on_load(&self, ctx: &PluginContext) -> HookResult {
///     let runs: u64 = ctx.storage().get("runs").await.unwrap_or(0);
///     ctx.storage().set("runs", &(runs + 1)).await;
///     ctx.logger().info(format_args!("loaded {} times", runs + 1));
///     Ok(())
/// }
/// ```
pub struct PluginContext {
    metadata: PluginMetadata,
    config: RwLock<PluginConfig>,
    global_config: RwLock<Arc<ConciergusConfig>>,
    logger: PluginLogger,
    storage: PluginStorage,
    events: PluginEventEmitter,
    utils: PluginUtils,
}

impl PluginContext {
    /// Builds a context with fresh services for `metadata.id`.
    pub fn new(
        metadata: PluginMetadata,
        config: PluginConfig,
        global_config: Arc<ConciergusConfig>,
        store: Arc<dyn KvStore>,
    ) -> Self {
        let id = metadata.id.clone();
        Self {
            logger: PluginLogger::new(id.as_str()),
            storage: PluginStorage::new(id.as_str(), store),
            events: PluginEventEmitter::new(id),
            utils: PluginUtils,
            metadata,
            config: RwLock::new(config),
            global_config: RwLock::new(global_config),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.metadata.id
    }

    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    /// Snapshot of the plugin's current configuration.
    pub fn config(&self) -> PluginConfig {
        self.config.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.config.read().enabled
    }

    pub fn priority(&self) -> i32 {
        self.config.read().priority
    }

    /// Deserializes one entry of `config().options`.
    ///
    /// Returns `None` when the option is absent or has a different shape.
    pub fn option<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.config.read().options.get(key)?.clone();
        serde_json::from_value(value).ok()
    }

    /// Latest global configuration snapshot.
    pub fn global_config(&self) -> Arc<ConciergusConfig> {
        Arc::clone(&self.global_config.read())
    }

    pub fn logger(&self) -> &PluginLogger {
        &self.logger
    }

    pub fn storage(&self) -> &PluginStorage {
        &self.storage
    }

    pub fn events(&self) -> &PluginEventEmitter {
        &self.events
    }

    pub fn utils(&self) -> &PluginUtils {
        &self.utils
    }

    pub(crate) fn set_config(&self, config: PluginConfig) {
        *self.config.write() = config;
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.config.write().enabled = enabled;
    }

    pub(crate) fn set_global_config(&self, global: Arc<ConciergusConfig>) {
        *self.global_config.write() = global;
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.metadata.id)
            .field("config", &*self.config.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginConfigPatch;
    use crate::storage::MemoryKv;
    use conciergus_core::Author;

    fn context() -> PluginContext {
        let config = PluginConfig::default().merged(
            &PluginConfigPatch::new()
                .option("mask", "*")
                .option("words", serde_json::json!(["darn"])),
        );
        PluginContext::new(
            PluginMetadata::new("filter", "Filter", "1.0.0", Author::new("a")),
            config,
            Arc::new(ConciergusConfig::default()),
            Arc::new(MemoryKv::new()),
        )
    }

    #[test]
    fn test_typed_options() {
        let ctx = context();
        assert_eq!(ctx.option::<String>("mask").as_deref(), Some("*"));
        assert_eq!(ctx.option::<Vec<String>>("words"), Some(vec!["darn".to_string()]));
        assert_eq!(ctx.option::<u32>("mask"), None);
        assert_eq!(ctx.option::<String>("missing"), None);
    }

    #[test]
    fn test_services_are_scoped_to_plugin() {
        let ctx = context();
        assert_eq!(ctx.logger().plugin_id(), "filter");
        assert_eq!(ctx.storage().prefix(), "plugin:filter:");
    }

    #[test]
    fn test_mutable_parts_update_in_place() {
        let ctx = context();
        ctx.set_enabled(false);
        assert!(!ctx.is_enabled());

        let global = ConciergusConfig {
            debug: true,
            ..Default::default()
        };
        ctx.set_global_config(Arc::new(global));
        assert!(ctx.global_config().debug);
    }
}
