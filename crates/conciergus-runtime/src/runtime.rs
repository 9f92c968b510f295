//! Host orchestration: configuration in, a ready [`PluginManager`] out.
//!
//! [`ConciergusRuntime`] wires the pieces a chat host needs before it can
//! dispatch anything through plugins:
//!
//! 1. load and validate [`RuntimeConfig`]
//! 2. install the tracing subscriber from `[logging]`
//! 3. pick the plugin storage backend from `[storage]`, probing it once
//! 4. build a [`PluginManager`] with the global config and the
//!    `[plugins.<id>]` overrides
//!
//! On shutdown every plugin is unregistered, most recent first.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use conciergus_runtime::ConciergusRuntime;
//!
//! let runtime = ConciergusRuntime::builder()
//!     .config_file("conciergus.toml")
//!     .build()
//!     .await?;
//!
//! runtime.register_plugin(MarkdownPlugin::default()).await?;
//! let manager = runtime.manager();
//! // ... hand `manager` to the chat layer ...
//! runtime.run().await?;
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::signal;
use tracing::{info, warn};

use conciergus_framework::storage::probe_or_memory;
use conciergus_framework::{FileKv, KvStore, ManagerStats, MemoryKv, Plugin, PluginManager};

use crate::config::{ConfigLoader, RuntimeConfig, StorageBackend, StorageConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Snapshot returned by [`ConciergusRuntime::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    pub plugins: ManagerStats,
    /// Name of the storage backend in use after probing.
    pub storage_backend: &'static str,
    pub uptime: Duration,
}

/// Owns the plugin manager and the configuration it was built from.
pub struct ConciergusRuntime {
    config: RuntimeConfig,
    manager: Arc<PluginManager>,
    storage_backend: &'static str,
    started_at: Instant,
}

impl ConciergusRuntime {
    /// Loads configuration from the current directory and environment,
    /// falling back to defaults if that fails.
    pub async fn new() -> Self {
        let loaded = ConfigLoader::new()
            .with_current_dir()
            .load()
            .and_then(|config| validate_config(&config).map(|()| config));

        match loaded {
            Ok(config) => Self::from_config(&config).await,
            Err(e) => {
                let runtime = Self::from_config(&RuntimeConfig::default()).await;
                warn!(error = %e, "Failed to load configuration, using defaults");
                runtime
            }
        }
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Builds a runtime from an already loaded configuration.
    ///
    /// The configuration is assumed to be valid; see
    /// [`validate_config`](crate::config::validate_config).
    pub async fn from_config(config: &RuntimeConfig) -> Self {
        logging::init_from_config(&config.logging);

        let store = probe_store(&config.storage).await;
        let storage_backend = store.name();

        let manager = PluginManager::new(config.conciergus.clone())
            .with_store(store)
            .with_plugin_overrides(config.plugins.clone());

        info!(
            environment = %config.conciergus.environment,
            log_level   = %config.logging.level,
            storage     = storage_backend,
            overrides   = config.plugins.len(),
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            manager: Arc::new(manager),
            storage_backend,
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The plugin manager, shareable with the chat layer.
    pub fn manager(&self) -> Arc<PluginManager> {
        Arc::clone(&self.manager)
    }

    pub async fn register_plugin<P: Plugin>(&self, plugin: P) -> RuntimeResult<()> {
        self.manager.register(Arc::new(plugin)).await?;
        Ok(())
    }

    /// Registers `plugins` in order, stopping at the first failure.
    pub async fn register_plugins(
        &self,
        plugins: impl IntoIterator<Item = Arc<dyn Plugin>>,
    ) -> RuntimeResult<()> {
        for plugin in plugins {
            self.manager.register(plugin).await?;
        }
        Ok(())
    }

    pub async fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            plugins: self.manager.stats().await,
            storage_backend: self.storage_backend,
            uptime: self.started_at.elapsed(),
        }
    }

    /// Unregisters every plugin, most recently registered first.
    pub async fn shutdown(&self) {
        info!("Shutting down plugins");
        self.manager.unregister_all().await;
        info!("Runtime stopped");
    }

    /// Waits for Ctrl+C (or SIGTERM on unix), then shuts down.
    pub async fn run(&self) -> RuntimeResult<()> {
        info!("Conciergus runtime is now running. Press Ctrl+C to stop.");
        wait_for_shutdown().await?;
        self.shutdown().await;
        Ok(())
    }

    /// Waits for `shutdown` to complete, then shuts down.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        shutdown.await;
        self.shutdown().await;
    }
}

async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = signal::ctrl_c() => {
                        result.map_err(RuntimeError::Signal)?;
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return Ok(());
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler, listening for Ctrl+C only"),
        }
    }

    signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
    info!("Received Ctrl+C, shutting down");
    Ok(())
}

/// Opens the configured storage backend.
///
/// The file backend is probed once; if it cannot be opened or fails the
/// probe, plugins get a [`MemoryKv`] instead and a warning is logged.
pub async fn probe_store(config: &StorageConfig) -> Arc<dyn KvStore> {
    match config.backend {
        StorageBackend::Memory => Arc::new(MemoryKv::new()),
        StorageBackend::File => open_file_store(&config.path).await,
    }
}

async fn open_file_store(path: &Path) -> Arc<dyn KvStore> {
    match FileKv::open(path).await {
        Ok(store) => probe_or_memory(Arc::new(store)).await,
        Err(e) => {
            warn!(
                path  = %path.display(),
                error = %e,
                "Failed to open plugin storage file, falling back to memory"
            );
            Arc::new(MemoryKv::new())
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`ConciergusRuntime`] with custom configuration.
///
/// ```rust,ignore
/// let runtime = ConciergusRuntime::builder()
///     .config_file("config/conciergus.toml")
///     .profile("production")
///     .build()
///     .await?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: RuntimeConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads, validates and builds the runtime.
    pub async fn build(self) -> RuntimeResult<ConciergusRuntime> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        Ok(ConciergusRuntime::from_config(&config).await)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
