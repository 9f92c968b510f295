//! Plugin registration, lifecycle management and pipeline dispatch.
//!
//! [`PluginManager`] is the central owner of all registered plugins. It:
//!
//! - Validates and registers plugins, building one [`PluginContext`] per
//!   plugin and running `on_load`. A failing `on_load` rolls the
//!   registration back completely.
//! - Drives the per-plugin state machine with snapshot/rollback semantics:
//!
//! ```text
//! register() ──► Disabled ──enable()──► Enabled ──disable()──► Disabled
//!                    │                                             │
//!                    └──────────────── unregister() ◄──────────────┘
//! ```
//!
//!   A failing hook always leaves the plugin in its prior state.
//! - Threads messages, stream parts, conversations and agent steps through
//!   every **enabled** plugin **sequentially**, highest priority first (ties
//!   in registration order). A failing plugin is logged through its own
//!   logger and skipped; the value it received is passed on unchanged.
//! - Broadcasts global configuration changes to enabled plugins.
//! - Publishes [`ManagerEvent`]s on a global [`EventBus`].
//!
//! Hooks are awaited without timeout or cancellation; a hook that never
//! completes stalls the dispatch call it belongs to.
//!
//! # Example
//!
//! ```rust,ignore
//! use conciergus_framework::prelude::*;
//!
//! let manager = PluginManager::new(ConciergusConfig::default());
//! manager.register(Arc::new(MarkdownPlugin::default())).await?;
//!
//! let message = manager
//!     .execute_message_plugins(Message::assistant("m1", "**hi**"), MessageDirection::Incoming)
//!     .await;
//!
//! manager.unregister_all().await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use semver::{Version, VersionReq};
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{Instrument, debug, debug_span, error, info, warn};

use conciergus_core::{
    AgentEvent, AgentStep, AnalyticsEvent, ConciergusConfig, Conversation, ConversationEvent,
    Message, MessageDirection, PluginError, PluginMetadata, PluginResult, StreamEvent, StreamPart,
};

use crate::context::PluginContext;
use crate::events::{EventBus, ManagerEvent};
use crate::plugin::{Capability, Plugin, PluginConfig, PluginConfigPatch};
use crate::storage::{KvStore, MemoryKv};
use crate::utils::validate_schema;

/// Version reported to plugins declaring `min_required_host_version`.
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Counts returned by [`PluginManager::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManagerStats {
    pub registered: usize,
    pub enabled: usize,
}

// =============================================================================
// PluginEntry (internal)
// =============================================================================

/// Registry record. The plugin's live config is owned by its context so the
/// registry and the context can never disagree.
struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    context: Arc<PluginContext>,
    /// Registration sequence number; breaks priority ties.
    seq: u64,
}

type Active = (Arc<dyn Plugin>, Arc<PluginContext>);

// =============================================================================
// PluginManager
// =============================================================================

/// Central manager for plugin registration, lifecycle and dispatch.
///
/// The host constructs one manager, wraps it in an `Arc` and hands it to the
/// chat layer; there is no global instance.
///
/// # Configuration layering
///
/// A plugin's initial [`PluginConfig`] is built from, lowest to highest:
///
/// 1. manager defaults (`enabled: true`, `priority: 0`, `environment: all`)
/// 2. the plugin's [`default_config`](Plugin::default_config)
/// 3. the host override registered via
///    [`with_plugin_overrides`](Self::with_plugin_overrides)
pub struct PluginManager {
    plugins: AsyncRwLock<HashMap<String, PluginEntry>>,
    next_seq: AtomicU64,
    global_config: RwLock<Arc<ConciergusConfig>>,
    plugin_overrides: HashMap<String, PluginConfigPatch>,
    store: Arc<dyn KvStore>,
    events: EventBus<ManagerEvent>,
}

impl PluginManager {
    /// Creates a manager with in-memory plugin storage.
    pub fn new(global_config: ConciergusConfig) -> Self {
        Self {
            plugins: AsyncRwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            global_config: RwLock::new(Arc::new(global_config)),
            plugin_overrides: HashMap::new(),
            store: Arc::new(MemoryKv::new()),
            events: EventBus::new(),
        }
    }

    /// Uses `store` as the backend for every plugin's storage.
    ///
    /// Only contexts created after this call see the new store, so call it
    /// before registering plugins.
    pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets per-plugin config overrides, keyed by plugin id.
    pub fn with_plugin_overrides(mut self, overrides: HashMap<String, PluginConfigPatch>) -> Self {
        self.plugin_overrides = overrides;
        self
    }

    /// The manager's global notification channel.
    pub fn events(&self) -> &EventBus<ManagerEvent> {
        &self.events
    }

    /// Current global configuration snapshot.
    pub fn global_config(&self) -> Arc<ConciergusConfig> {
        Arc::clone(&self.global_config.read())
    }

    // ─── Registration ────────────────────────────────────────────────────────

    /// Registers `plugin`, runs `on_load`, and enables it if its resolved
    /// config says so.
    ///
    /// # Errors
    ///
    /// - [`PluginError::Validation`] / [`PluginError::DuplicateId`]: nothing
    ///   was changed.
    /// - [`PluginError::Load`]: `on_load` failed and the registration was
    ///   rolled back.
    /// - [`PluginError::Enable`]: the plugin is registered but stays
    ///   disabled.
    pub async fn register(&self, plugin: Arc<dyn Plugin>) -> PluginResult<()> {
        let metadata = plugin.metadata().clone();
        metadata.validate()?;
        let id = metadata.id.clone();

        let config = self.initial_config(plugin.as_ref());
        let should_enable = config.enabled;
        let context = Arc::new(PluginContext::new(
            metadata,
            PluginConfig {
                enabled: false,
                ..config
            },
            self.global_config(),
            Arc::clone(&self.store),
        ));

        {
            let mut plugins = self.plugins.write().await;
            if plugins.contains_key(&id) {
                return Err(PluginError::DuplicateId(id));
            }
            check_compatibility(context.metadata(), &plugins);
            plugins.insert(
                id.clone(),
                PluginEntry {
                    plugin: Arc::clone(&plugin),
                    context: Arc::clone(&context),
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                },
            );
        }

        let load = plugin
            .on_load(&context)
            .instrument(debug_span!("on_load", plugin = %id))
            .await;
        if let Err(source) = load {
            self.plugins.write().await.remove(&id);
            error!(plugin = %id, error = %source, "Plugin failed to load, registration rolled back");
            return Err(PluginError::Load { id, source });
        }

        info!(
            plugin  = %id,
            version = %context.metadata().version,
            "Plugin registered"
        );
        self.publish(ManagerEvent::Registered { id: id.clone() });

        if should_enable {
            self.enable(&id).await?;
        }
        Ok(())
    }

    /// Disables (if needed), unloads and removes a plugin.
    ///
    /// # Errors
    ///
    /// - [`PluginError::NotRegistered`] for an unknown id.
    /// - [`PluginError::Disable`]: the plugin stays registered and enabled.
    /// - [`PluginError::Unload`]: the plugin stays registered (and disabled
    ///   if it was enabled before the call).
    pub async fn unregister(&self, id: &str) -> PluginResult<()> {
        let (plugin, context) = self.entry(id).await?;

        if context.is_enabled() {
            self.disable(id).await?;
        }

        let unload = plugin
            .on_unload(&context)
            .instrument(debug_span!("on_unload", plugin = %id))
            .await;
        if let Err(source) = unload {
            error!(plugin = %id, error = %source, "Plugin failed to unload, keeping it registered");
            return Err(PluginError::Unload {
                id: id.to_string(),
                source,
            });
        }

        self.plugins.write().await.remove(id);
        context.events().remove_all_listeners(None);
        info!(plugin = %id, "Plugin unregistered");
        self.publish(ManagerEvent::Unregistered { id: id.to_string() });
        Ok(())
    }

    /// Unregisters every plugin, most recently registered first.
    ///
    /// Failures are logged and the plugin is skipped.
    pub async fn unregister_all(&self) {
        let ids: Vec<String> = {
            let plugins = self.plugins.read().await;
            let mut entries: Vec<(&String, u64)> =
                plugins.iter().map(|(id, e)| (id, e.seq)).collect();
            entries.sort_by(|a, b| b.1.cmp(&a.1));
            entries.into_iter().map(|(id, _)| id.clone()).collect()
        };

        for id in ids {
            if let Err(e) = self.unregister(&id).await {
                warn!(plugin = %id, error = %e, "Failed to unregister plugin during shutdown");
            }
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Enables a plugin. A no-op if it is already enabled.
    ///
    /// On failure `enabled` is reverted and [`PluginError::Enable`] returned.
    pub async fn enable(&self, id: &str) -> PluginResult<()> {
        let (plugin, context) = self.entry(id).await?;
        if context.is_enabled() {
            debug!(plugin = %id, "Plugin already enabled");
            return Ok(());
        }

        context.set_enabled(true);
        let result = plugin
            .on_enable(&context)
            .instrument(debug_span!("on_enable", plugin = %id))
            .await;
        if let Err(source) = result {
            context.set_enabled(false);
            error!(plugin = %id, error = %source, "Plugin failed to enable");
            return Err(PluginError::Enable {
                id: id.to_string(),
                source,
            });
        }

        info!(plugin = %id, "Plugin enabled");
        self.publish(ManagerEvent::Enabled { id: id.to_string() });
        Ok(())
    }

    /// Disables a plugin. A no-op if it is already disabled.
    ///
    /// On failure `enabled` is reverted and [`PluginError::Disable`] returned.
    pub async fn disable(&self, id: &str) -> PluginResult<()> {
        let (plugin, context) = self.entry(id).await?;
        if !context.is_enabled() {
            debug!(plugin = %id, "Plugin already disabled");
            return Ok(());
        }

        context.set_enabled(false);
        let result = plugin
            .on_disable(&context)
            .instrument(debug_span!("on_disable", plugin = %id))
            .await;
        if let Err(source) = result {
            context.set_enabled(true);
            error!(plugin = %id, error = %source, "Plugin failed to disable");
            return Err(PluginError::Disable {
                id: id.to_string(),
                source,
            });
        }

        info!(plugin = %id, "Plugin disabled");
        self.publish(ManagerEvent::Disabled { id: id.to_string() });
        Ok(())
    }

    /// Merges `patch` over the plugin's config, validates it, and notifies
    /// the plugin.
    ///
    /// `patch.enabled` is not written directly. After the rest of the patch
    /// is applied, a change of state goes through [`enable`](Self::enable) or
    /// [`disable`](Self::disable), so the lifecycle hooks and events run.
    ///
    /// # Errors
    ///
    /// - [`PluginError::InvalidConfig`]: the merged config violates the
    ///   plugin's schema; nothing changed.
    /// - [`PluginError::ConfigChange`]: `on_config_change` failed; the
    ///   previous config was restored.
    /// - [`PluginError::Enable`] / [`PluginError::Disable`]: the options
    ///   were applied but the state transition was rolled back.
    pub async fn update_config(&self, id: &str, patch: PluginConfigPatch) -> PluginResult<()> {
        let (plugin, context) = self.entry(id).await?;
        let previous = context.config();
        let requested = previous.merged(&patch);
        let merged = PluginConfig {
            enabled: previous.enabled,
            ..requested.clone()
        };

        if let Some(schema) = plugin.config_schema() {
            let result = validate_schema(&requested.to_value(), &schema);
            if !result.valid {
                warn!(plugin = %id, errors = ?result.errors, "Rejected invalid plugin config");
                return Err(PluginError::InvalidConfig {
                    id: id.to_string(),
                    errors: result.errors,
                });
            }
        }

        context.set_config(merged.clone());
        let global = self.global_config();
        let result = plugin
            .on_config_change(&context, &global)
            .instrument(debug_span!("on_config_change", plugin = %id))
            .await;
        if let Err(source) = result {
            context.set_config(previous);
            error!(plugin = %id, error = %source, "Plugin rejected config change, rolled back");
            return Err(PluginError::ConfigChange {
                id: id.to_string(),
                source,
            });
        }

        debug!(plugin = %id, "Plugin config updated");
        self.publish(ManagerEvent::ConfigUpdated {
            id: id.to_string(),
            old: previous,
            new: merged,
        });

        match patch.enabled {
            Some(true) => self.enable(id).await,
            Some(false) => self.disable(id).await,
            None => Ok(()),
        }
    }

    /// Replaces the global configuration and notifies every enabled plugin.
    ///
    /// Every registered plugin's context receives the new snapshot; only
    /// enabled plugins get `on_config_change`. Hook failures are logged per
    /// plugin and never returned.
    pub async fn update_global_config(&self, config: ConciergusConfig) {
        let config = Arc::new(config);
        *self.global_config.write() = Arc::clone(&config);

        let contexts: Vec<Arc<PluginContext>> = self
            .plugins
            .read()
            .await
            .values()
            .map(|e| Arc::clone(&e.context))
            .collect();
        for context in contexts {
            context.set_global_config(Arc::clone(&config));
        }

        for (plugin, context) in self.active().await {
            let result = plugin
                .on_config_change(&context, &config)
                .instrument(debug_span!("broadcast", plugin = %context.plugin_id()))
                .await;
            if let Err(e) = result {
                context
                    .logger()
                    .error(format_args!("on_config_change failed during broadcast: {e}"));
            }
        }
        info!("Global configuration updated");
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    pub async fn get_plugin(&self, id: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins
            .read()
            .await
            .get(id)
            .map(|e| Arc::clone(&e.plugin))
    }

    /// Every registered plugin, in registration order.
    pub async fn get_plugins(&self) -> Vec<Arc<dyn Plugin>> {
        let plugins = self.plugins.read().await;
        let mut entries: Vec<&PluginEntry> = plugins.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| Arc::clone(&e.plugin)).collect()
    }

    /// Enabled plugins in dispatch order.
    pub async fn get_enabled_plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.active().await.into_iter().map(|(p, _)| p).collect()
    }

    /// Enabled plugins implementing `capability`, in dispatch order.
    pub async fn plugins_with_capability(&self, capability: Capability) -> Vec<Arc<dyn Plugin>> {
        self.active()
            .await
            .into_iter()
            .map(|(p, _)| p)
            .filter(|p| p.supports(capability))
            .collect()
    }

    /// `false` for unknown ids.
    pub async fn is_enabled(&self, id: &str) -> bool {
        self.plugins
            .read()
            .await
            .get(id)
            .is_some_and(|e| e.context.is_enabled())
    }

    pub async fn get_config(&self, id: &str) -> Option<PluginConfig> {
        self.plugins.read().await.get(id).map(|e| e.context.config())
    }

    pub async fn get_context(&self, id: &str) -> Option<Arc<PluginContext>> {
        self.plugins
            .read()
            .await
            .get(id)
            .map(|e| Arc::clone(&e.context))
    }

    pub async fn stats(&self) -> ManagerStats {
        let plugins = self.plugins.read().await;
        ManagerStats {
            registered: plugins.len(),
            enabled: plugins.values().filter(|e| e.context.is_enabled()).count(),
        }
    }

    // ─── Dispatch ────────────────────────────────────────────────────────────

    /// Threads `message` through every enabled message plugin.
    ///
    /// `Incoming` uses `process_message`, `Outgoing` uses
    /// `process_outgoing_message`. Never fails.
    pub async fn execute_message_plugins(
        &self,
        message: Message,
        direction: MessageDirection,
    ) -> Message {
        let mut working = message;
        for (plugin, context) in self.active().await {
            let Some(handler) = plugin.as_message_plugin() else {
                continue;
            };
            let span = dispatch_span("message", &context);
            let result = match direction {
                MessageDirection::Incoming => {
                    handler
                        .process_message(working.clone(), &context)
                        .instrument(span)
                        .await
                }
                MessageDirection::Outgoing => {
                    handler
                        .process_outgoing_message(working.clone(), &context)
                        .instrument(span)
                        .await
                }
            };
            match result {
                Ok(next) => working = next,
                Err(e) => report(&context, message_hook(direction), &e),
            }
        }
        working
    }

    /// Runs the stream pipeline for one stream event.
    ///
    /// Returns the transformed part for [`StreamEvent::Part`] and `None` for
    /// the notification-only events.
    pub async fn execute_stream_plugins(&self, event: StreamEvent) -> Option<StreamPart> {
        let active = self.active().await;
        match event {
            StreamEvent::Part(part) => {
                let mut working = part;
                for (plugin, context) in &active {
                    let Some(handler) = plugin.as_stream_plugin() else {
                        continue;
                    };
                    let result = handler
                        .process_stream_part(working.clone(), context)
                        .instrument(dispatch_span("stream", context))
                        .await;
                    match result {
                        Ok(next) => working = next,
                        Err(e) => report(context, "process_stream_part", &e),
                    }
                }
                Some(working)
            }
            StreamEvent::Start => {
                for (plugin, context) in &active {
                    if let Some(handler) = plugin.as_stream_plugin() {
                        let result = handler
                            .on_stream_start(context)
                            .instrument(dispatch_span("stream", context))
                            .await;
                        if let Err(e) = result {
                            report(context, "on_stream_start", &e);
                        }
                    }
                }
                None
            }
            StreamEvent::End => {
                for (plugin, context) in &active {
                    if let Some(handler) = plugin.as_stream_plugin() {
                        let result = handler
                            .on_stream_end(context)
                            .instrument(dispatch_span("stream", context))
                            .await;
                        if let Err(e) = result {
                            report(context, "on_stream_end", &e);
                        }
                    }
                }
                None
            }
            StreamEvent::Error(error) => {
                for (plugin, context) in &active {
                    if let Some(handler) = plugin.as_stream_plugin() {
                        let result = handler
                            .on_stream_error(&error, context)
                            .instrument(dispatch_span("stream", context))
                            .await;
                        if let Err(e) = result {
                            report(context, "on_stream_error", &e);
                        }
                    }
                }
                None
            }
        }
    }

    /// Runs the conversation pipeline.
    ///
    /// Create and update thread the conversation and return it; delete is a
    /// notification and returns `None`.
    pub async fn execute_conversation_plugins(
        &self,
        event: ConversationEvent,
    ) -> Option<Conversation> {
        let active = self.active().await;
        let (mut working, is_create) = match event {
            ConversationEvent::Create(conversation) => (conversation, true),
            ConversationEvent::Update(conversation) => (conversation, false),
            ConversationEvent::Delete(conversation_id) => {
                for (plugin, context) in &active {
                    if let Some(handler) = plugin.as_conversation_plugin() {
                        let result = handler
                            .on_conversation_delete(&conversation_id, context)
                            .instrument(dispatch_span("conversation", context))
                            .await;
                        if let Err(e) = result {
                            report(context, "on_conversation_delete", &e);
                        }
                    }
                }
                return None;
            }
        };

        for (plugin, context) in &active {
            let Some(handler) = plugin.as_conversation_plugin() else {
                continue;
            };
            let (hook, result) = if is_create {
                let result = handler
                    .on_conversation_create(working.clone(), context)
                    .instrument(dispatch_span("conversation", context))
                    .await;
                ("on_conversation_create", result)
            } else {
                let result = handler
                    .on_conversation_update(working.clone(), context)
                    .instrument(dispatch_span("conversation", context))
                    .await;
                ("on_conversation_update", result)
            };
            match result {
                Ok(next) => working = next,
                Err(e) => report(context, hook, &e),
            }
        }
        Some(working)
    }

    /// Runs the agent pipeline.
    ///
    /// Before/after events thread the step and return it; errors are
    /// broadcast and return `None`.
    pub async fn execute_agent_plugins(&self, event: AgentEvent) -> Option<AgentStep> {
        let active = self.active().await;
        let (mut working, is_before) = match event {
            AgentEvent::BeforeStep(step) => (step, true),
            AgentEvent::AfterStep(step) => (step, false),
            AgentEvent::Error(step, error) => {
                for (plugin, context) in &active {
                    if let Some(handler) = plugin.as_agent_plugin() {
                        let result = handler
                            .on_agent_error(&step, &error, context)
                            .instrument(dispatch_span("agent", context))
                            .await;
                        if let Err(e) = result {
                            report(context, "on_agent_error", &e);
                        }
                    }
                }
                return None;
            }
        };

        for (plugin, context) in &active {
            let Some(handler) = plugin.as_agent_plugin() else {
                continue;
            };
            let (hook, result) = if is_before {
                let result = handler
                    .before_agent_step(working.clone(), context)
                    .instrument(dispatch_span("agent", context))
                    .await;
                ("before_agent_step", result)
            } else {
                let result = handler
                    .after_agent_step(working.clone(), context)
                    .instrument(dispatch_span("agent", context))
                    .await;
                ("after_agent_step", result)
            };
            match result {
                Ok(next) => working = next,
                Err(e) => report(context, hook, &e),
            }
        }
        Some(working)
    }

    /// Delivers `event` to every enabled analytics plugin.
    pub async fn execute_analytics_plugins(&self, event: &AnalyticsEvent) {
        for (plugin, context) in self.active().await {
            if let Some(handler) = plugin.as_analytics_plugin() {
                let result = handler
                    .track_event(event, &context)
                    .instrument(dispatch_span("analytics", &context))
                    .await;
                if let Err(e) = result {
                    report(&context, "track_event", &e);
                }
            }
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    async fn entry(&self, id: &str) -> PluginResult<Active> {
        self.plugins
            .read()
            .await
            .get(id)
            .map(|e| (Arc::clone(&e.plugin), Arc::clone(&e.context)))
            .ok_or_else(|| PluginError::NotRegistered(id.to_string()))
    }

    /// Snapshot of enabled plugins, highest priority first, ties in
    /// registration order. The registry lock is released before any hook
    /// runs.
    async fn active(&self) -> Vec<Active> {
        let plugins = self.plugins.read().await;
        let mut enabled: Vec<(i32, u64, Active)> = plugins
            .values()
            .filter_map(|e| {
                let config = e.context.config();
                config.enabled.then(|| {
                    (
                        config.priority,
                        e.seq,
                        (Arc::clone(&e.plugin), Arc::clone(&e.context)),
                    )
                })
            })
            .collect();
        enabled.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        enabled.into_iter().map(|(_, _, active)| active).collect()
    }

    fn initial_config(&self, plugin: &dyn Plugin) -> PluginConfig {
        let mut config = PluginConfig::default();
        if let Some(defaults) = plugin.default_config() {
            config = config.merged(&defaults);
        }
        if let Some(host) = self.plugin_overrides.get(plugin.id()) {
            config = config.merged(host);
        }
        config
    }

    fn publish(&self, event: ManagerEvent) {
        self.events.emit(event.name(), &event);
    }
}

fn dispatch_span(pipeline: &'static str, context: &PluginContext) -> tracing::Span {
    debug_span!("dispatch", pipeline, plugin = %context.plugin_id())
}

fn report(context: &PluginContext, hook: &str, error: &conciergus_core::BoxError) {
    context
        .logger()
        .error(format_args!("{hook} failed, passing value through unchanged: {error}"));
}

fn message_hook(direction: MessageDirection) -> &'static str {
    match direction {
        MessageDirection::Incoming => "process_message",
        MessageDirection::Outgoing => "process_outgoing_message",
    }
}

/// Logs, without rejecting, version and dependency problems.
fn check_compatibility(metadata: &PluginMetadata, registered: &HashMap<String, PluginEntry>) {
    if let Err(e) = Version::parse(&metadata.version) {
        warn!(plugin = %metadata.id, version = %metadata.version, error = %e, "Plugin version is not valid semver");
    }

    if let Some(min) = &metadata.min_required_host_version {
        match (Version::parse(min), Version::parse(HOST_VERSION)) {
            (Ok(min), Ok(host)) if host < min => warn!(
                plugin   = %metadata.id,
                required = %min,
                host     = %host,
                "Plugin requires a newer host version, registering anyway"
            ),
            (Err(e), _) => warn!(
                plugin = %metadata.id,
                error  = %e,
                "Unparseable min_required_host_version"
            ),
            _ => {}
        }
    }

    for (dep_id, requirement) in &metadata.dependencies {
        let Some(dep) = registered.get(dep_id) else {
            warn!(
                plugin     = %metadata.id,
                dependency = %dep_id,
                "Unresolved dependency, no registered plugin has this id"
            );
            continue;
        };
        let dep_version = &dep.context.metadata().version;
        let satisfied = match (VersionReq::parse(requirement), Version::parse(dep_version)) {
            (Ok(req), Ok(version)) => req.matches(&version),
            _ => true,
        };
        if !satisfied {
            warn!(
                plugin      = %metadata.id,
                dependency  = %dep_id,
                requirement = %requirement,
                found       = %dep_version,
                "Dependency version does not satisfy requirement"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use conciergus_core::{Author, Environment, StreamError};

    use super::*;
    use crate::plugin::{
        AgentPlugin, AnalyticsPlugin, ConversationPlugin, HookResult, MessagePlugin, StreamPlugin,
    };

    // ─── Fixtures ────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct Journal {
        load: AtomicUsize,
        enable: AtomicUsize,
        disable: AtomicUsize,
        unload: AtomicUsize,
        config_change: AtomicUsize,
        notifications: AtomicUsize,
        unloaded: Mutex<Vec<String>>,
    }

    impl Journal {
        fn count(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct Faults {
        load: bool,
        enable: bool,
        disable: bool,
        unload: bool,
        process: bool,
        config_change: bool,
    }

    /// Appends `tag` to everything it touches.
    struct Tagger {
        metadata: PluginMetadata,
        tag: &'static str,
        journal: Arc<Journal>,
        faults: Faults,
        defaults: Option<PluginConfigPatch>,
        schema: Option<Value>,
    }

    impl Tagger {
        fn new(id: &str, tag: &'static str, journal: &Arc<Journal>) -> Self {
            Self {
                metadata: PluginMetadata::new(id, id, "1.0.0", Author::new("tests")),
                tag,
                journal: Arc::clone(journal),
                faults: Faults::default(),
                defaults: None,
                schema: None,
            }
        }

        fn priority(mut self, priority: i32) -> Self {
            let defaults = self.defaults.take().unwrap_or_default();
            self.defaults = Some(defaults.priority(priority));
            self
        }

        fn faults(mut self, faults: Faults) -> Self {
            self.faults = faults;
            self
        }

        fn defaults(mut self, defaults: PluginConfigPatch) -> Self {
            self.defaults = Some(defaults);
            self
        }

        fn schema(mut self, schema: Value) -> Self {
            self.schema = Some(schema);
            self
        }

        fn arc(self) -> Arc<dyn Plugin> {
            Arc::new(self)
        }

        fn check(&self) -> HookResult {
            if self.faults.process {
                return Err(format!("{} exploded", self.metadata.id).into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Plugin for Tagger {
        fn metadata(&self) -> &PluginMetadata {
            &self.metadata
        }

        fn default_config(&self) -> Option<PluginConfigPatch> {
            self.defaults.clone()
        }

        fn config_schema(&self) -> Option<Value> {
            self.schema.clone()
        }

        async fn on_load(&self, _ctx: &PluginContext) -> HookResult {
            self.journal.load.fetch_add(1, Ordering::SeqCst);
            if self.faults.load {
                return Err("load refused".into());
            }
            Ok(())
        }

        async fn on_enable(&self, _ctx: &PluginContext) -> HookResult {
            self.journal.enable.fetch_add(1, Ordering::SeqCst);
            if self.faults.enable {
                return Err("enable refused".into());
            }
            Ok(())
        }

        async fn on_disable(&self, _ctx: &PluginContext) -> HookResult {
            self.journal.disable.fetch_add(1, Ordering::SeqCst);
            if self.faults.disable {
                return Err("disable refused".into());
            }
            Ok(())
        }

        async fn on_unload(&self, ctx: &PluginContext) -> HookResult {
            self.journal.unload.fetch_add(1, Ordering::SeqCst);
            if self.faults.unload {
                return Err("unload refused".into());
            }
            self.journal.unloaded.lock().push(ctx.plugin_id().to_string());
            Ok(())
        }

        async fn on_config_change(
            &self,
            _ctx: &PluginContext,
            _global: &ConciergusConfig,
        ) -> HookResult {
            self.journal.config_change.fetch_add(1, Ordering::SeqCst);
            if self.faults.config_change {
                return Err("config refused".into());
            }
            Ok(())
        }

        fn as_message_plugin(&self) -> Option<&dyn MessagePlugin> {
            Some(self)
        }

        fn as_stream_plugin(&self) -> Option<&dyn StreamPlugin> {
            Some(self)
        }

        fn as_conversation_plugin(&self) -> Option<&dyn ConversationPlugin> {
            Some(self)
        }

        fn as_agent_plugin(&self) -> Option<&dyn AgentPlugin> {
            Some(self)
        }

        fn as_analytics_plugin(&self) -> Option<&dyn AnalyticsPlugin> {
            Some(self)
        }
    }

    #[async_trait]
    impl MessagePlugin for Tagger {
        async fn process_message(
            &self,
            mut message: Message,
            _ctx: &PluginContext,
        ) -> HookResult<Message> {
            self.check()?;
            message.content.push_str(self.tag);
            Ok(message)
        }

        async fn process_outgoing_message(
            &self,
            mut message: Message,
            _ctx: &PluginContext,
        ) -> HookResult<Message> {
            self.check()?;
            message.content.insert_str(0, self.tag);
            Ok(message)
        }
    }

    #[async_trait]
    impl StreamPlugin for Tagger {
        async fn process_stream_part(
            &self,
            part: StreamPart,
            _ctx: &PluginContext,
        ) -> HookResult<StreamPart> {
            self.check()?;
            Ok(match part {
                StreamPart::TextDelta { id, delta } => StreamPart::TextDelta {
                    id,
                    delta: format!("{delta}{}", self.tag),
                },
                other => other,
            })
        }

        async fn on_stream_start(&self, _ctx: &PluginContext) -> HookResult {
            self.check()?;
            self.journal.notifications.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_stream_end(&self, _ctx: &PluginContext) -> HookResult {
            self.journal.notifications.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_stream_error(&self, _error: &StreamError, _ctx: &PluginContext) -> HookResult {
            self.journal.notifications.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl ConversationPlugin for Tagger {
        async fn on_conversation_create(
            &self,
            mut conversation: Conversation,
            _ctx: &PluginContext,
        ) -> HookResult<Conversation> {
            self.check()?;
            let title = conversation.title.take().unwrap_or_default();
            conversation.title = Some(title + self.tag);
            Ok(conversation)
        }

        async fn on_conversation_delete(&self, _id: &str, _ctx: &PluginContext) -> HookResult {
            self.journal.notifications.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl AgentPlugin for Tagger {
        async fn before_agent_step(
            &self,
            mut step: AgentStep,
            _ctx: &PluginContext,
        ) -> HookResult<AgentStep> {
            self.check()?;
            step.step_number += 1;
            Ok(step)
        }

        async fn on_agent_error(
            &self,
            _step: &AgentStep,
            _error: &StreamError,
            _ctx: &PluginContext,
        ) -> HookResult {
            self.check()?;
            self.journal.notifications.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl AnalyticsPlugin for Tagger {
        async fn track_event(&self, _event: &AnalyticsEvent, _ctx: &PluginContext) -> HookResult {
            self.check()?;
            self.journal.notifications.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Implements no extension points.
    struct Bare(PluginMetadata);

    impl Bare {
        fn arc(id: &str) -> Arc<dyn Plugin> {
            Arc::new(Self(PluginMetadata::new(id, id, "0.1.0", Author::new("tests"))))
        }
    }

    impl Plugin for Bare {
        fn metadata(&self) -> &PluginMetadata {
            &self.0
        }
    }

    fn manager() -> PluginManager {
        PluginManager::new(ConciergusConfig::default())
    }

    async fn incoming(manager: &PluginManager, content: &str) -> String {
        manager
            .execute_message_plugins(Message::assistant("m1", content), MessageDirection::Incoming)
            .await
            .content
    }

    // ─── Registration ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_register_loads_and_enables_by_default() {
        let journal = Arc::new(Journal::default());
        let manager = manager();

        manager
            .register(Tagger::new("a", "[A]", &journal).arc())
            .await
            .unwrap();

        assert!(manager.is_enabled("a").await);
        assert_eq!(Journal::count(&journal.load), 1);
        assert_eq!(Journal::count(&journal.enable), 1);
        assert_eq!(
            manager.stats().await,
            ManagerStats {
                registered: 1,
                enabled: 1
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected_without_side_effects() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(Tagger::new("a", "[A]", &journal).arc())
            .await
            .unwrap();

        let err = manager
            .register(Tagger::new("a", "[A2]", &journal).arc())
            .await
            .unwrap_err();

        assert!(matches!(err, PluginError::DuplicateId(ref id) if id == "a"));
        assert_eq!(Journal::count(&journal.load), 1);
        assert_eq!(manager.get_plugins().await.len(), 1);
        assert_eq!(incoming(&manager, "hi").await, "hi[A]");
    }

    #[tokio::test]
    async fn test_invalid_metadata_is_rejected() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        let mut plugin = Tagger::new("a", "[A]", &journal);
        plugin.metadata.name = "  ".into();

        let err = manager.register(plugin.arc()).await.unwrap_err();

        assert!(matches!(err, PluginError::Validation { field: "name", .. }));
        assert!(manager.get_plugin("a").await.is_none());
        assert_eq!(Journal::count(&journal.load), 0);
    }

    #[tokio::test]
    async fn test_load_failure_rolls_back_registration() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        let faulty = Tagger::new("a", "[A]", &journal).faults(Faults {
            load: true,
            ..Faults::default()
        });

        let err = manager.register(faulty.arc()).await.unwrap_err();

        assert!(matches!(err, PluginError::Load { .. }));
        assert!(manager.get_plugin("a").await.is_none());
        assert!(manager.get_context("a").await.is_none());
        assert_eq!(Journal::count(&journal.enable), 0);

        manager
            .register(Tagger::new("a", "[A]", &journal).arc())
            .await
            .unwrap();
        assert!(manager.is_enabled("a").await);
    }

    #[tokio::test]
    async fn test_enable_failure_during_register_leaves_plugin_disabled() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        let faulty = Tagger::new("a", "[A]", &journal).faults(Faults {
            enable: true,
            ..Faults::default()
        });

        let err = manager.register(faulty.arc()).await.unwrap_err();

        assert!(matches!(err, PluginError::Enable { .. }));
        assert!(manager.get_plugin("a").await.is_some());
        assert!(!manager.is_enabled("a").await);
    }

    #[tokio::test]
    async fn test_default_config_disabled_skips_on_enable() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        let plugin = Tagger::new("a", "[A]", &journal)
            .defaults(PluginConfigPatch::new().enabled(false).priority(3));

        manager.register(plugin.arc()).await.unwrap();

        assert!(!manager.is_enabled("a").await);
        assert_eq!(Journal::count(&journal.enable), 0);
        assert_eq!(manager.get_config("a").await.unwrap().priority, 3);
    }

    #[tokio::test]
    async fn test_host_override_wins_over_plugin_defaults() {
        let journal = Arc::new(Journal::default());
        let overrides = HashMap::from([(
            "a".to_string(),
            PluginConfigPatch::new()
                .priority(42)
                .environment(Environment::Production),
        )]);
        let manager = manager().with_plugin_overrides(overrides);

        manager
            .register(Tagger::new("a", "[A]", &journal).priority(7).arc())
            .await
            .unwrap();

        let config = manager.get_config("a").await.unwrap();
        assert_eq!(config.priority, 42);
        assert_eq!(config.environment, Environment::Production);
        assert!(config.enabled);
    }

    #[tokio::test]
    async fn test_get_plugins_in_registration_order() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        for (id, priority) in [("c", 1), ("a", 9), ("b", 5)] {
            manager
                .register(Tagger::new(id, "", &journal).priority(priority).arc())
                .await
                .unwrap();
        }

        let ids: Vec<String> = manager
            .get_plugins()
            .await
            .iter()
            .map(|p| p.id().to_string())
            .collect();
        assert_eq!(ids, ["c", "a", "b"]);

        let enabled: Vec<String> = manager
            .get_enabled_plugins()
            .await
            .iter()
            .map(|p| p.id().to_string())
            .collect();
        assert_eq!(enabled, ["a", "b", "c"]);
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_enable_and_disable_are_idempotent() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(Tagger::new("a", "[A]", &journal).arc())
            .await
            .unwrap();

        manager.enable("a").await.unwrap();
        assert_eq!(Journal::count(&journal.enable), 1);

        manager.disable("a").await.unwrap();
        manager.disable("a").await.unwrap();
        assert_eq!(Journal::count(&journal.disable), 1);
        assert!(!manager.is_enabled("a").await);

        manager.enable("a").await.unwrap();
        assert_eq!(Journal::count(&journal.enable), 2);
    }

    #[tokio::test]
    async fn test_lifecycle_on_unknown_id_is_not_registered() {
        let manager = manager();

        assert!(matches!(
            manager.unregister("ghost").await,
            Err(PluginError::NotRegistered(_))
        ));
        assert!(matches!(
            manager.enable("ghost").await,
            Err(PluginError::NotRegistered(_))
        ));
        assert!(matches!(
            manager.update_config("ghost", PluginConfigPatch::new()).await,
            Err(PluginError::NotRegistered(_))
        ));
        assert!(!manager.is_enabled("ghost").await);
        assert!(manager.get_config("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_unregister_disables_then_unloads() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(Tagger::new("a", "[A]", &journal).arc())
            .await
            .unwrap();
        let ctx = manager.get_context("a").await.unwrap();
        ctx.events().on("ping", |_| {});

        manager.unregister("a").await.unwrap();

        assert_eq!(Journal::count(&journal.disable), 1);
        assert_eq!(Journal::count(&journal.unload), 1);
        assert!(manager.get_plugin("a").await.is_none());
        assert_eq!(ctx.events().listener_count("ping"), 0);
        assert_eq!(incoming(&manager, "hi").await, "hi");
    }

    #[tokio::test]
    async fn test_unload_failure_keeps_plugin_registered_and_disabled() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        let plugin = Tagger::new("a", "[A]", &journal).faults(Faults {
            unload: true,
            ..Faults::default()
        });
        manager.register(plugin.arc()).await.unwrap();
        assert!(manager.is_enabled("a").await);

        let err = manager.unregister("a").await.unwrap_err();

        assert!(matches!(err, PluginError::Unload { ref id, .. } if id == "a"));
        assert!(manager.get_plugin("a").await.is_some());
        assert!(!manager.is_enabled("a").await);
        assert_eq!(Journal::count(&journal.disable), 1);
        assert_eq!(manager.stats().await.registered, 1);
    }

    #[tokio::test]
    async fn test_disable_failure_keeps_plugin_enabled() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        let plugin = Tagger::new("a", "[A]", &journal).faults(Faults {
            disable: true,
            ..Faults::default()
        });
        manager.register(plugin.arc()).await.unwrap();

        let err = manager.disable("a").await.unwrap_err();
        assert!(matches!(err, PluginError::Disable { ref id, .. } if id == "a"));
        assert!(manager.is_enabled("a").await);
        assert_eq!(incoming(&manager, "hi").await, "hi[A]");

        // Unregister stops at the failed disable and leaves the entry alone.
        let err = manager.unregister("a").await.unwrap_err();
        assert!(matches!(err, PluginError::Disable { .. }));
        assert!(manager.get_plugin("a").await.is_some());
        assert!(manager.is_enabled("a").await);
        assert_eq!(Journal::count(&journal.unload), 0);
    }

    #[tokio::test]
    async fn test_unregister_all_runs_in_reverse_registration_order() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        for id in ["first", "second", "third"] {
            manager
                .register(Tagger::new(id, "", &journal).arc())
                .await
                .unwrap();
        }

        manager.unregister_all().await;

        assert_eq!(*journal.unloaded.lock(), ["third", "second", "first"]);
        assert_eq!(manager.stats().await, ManagerStats::default());
    }

    // ─── Configuration ───────────────────────────────────────────────────────

    fn threshold_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "options": {
                    "type": "object",
                    "properties": { "threshold": { "type": "number" } }
                }
            }
        })
    }

    #[tokio::test]
    async fn test_update_config_merges_and_notifies() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(
                Tagger::new("a", "[A]", &journal)
                    .schema(threshold_schema())
                    .arc(),
            )
            .await
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager
            .events()
            .on(ManagerEvent::CONFIG_UPDATED, move |e: &ManagerEvent| {
                sink.lock().push(e.clone());
            });

        manager
            .update_config("a", PluginConfigPatch::new().option("threshold", 0.5))
            .await
            .unwrap();

        let config = manager.get_config("a").await.unwrap();
        assert_eq!(config.options.get("threshold"), Some(&json!(0.5)));
        assert!(config.enabled);
        assert_eq!(Journal::count(&journal.config_change), 1);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let ManagerEvent::ConfigUpdated { old, new, .. } = &seen[0] else {
            panic!("unexpected event {:?}", seen[0]);
        };
        assert!(old.options.is_empty());
        assert_eq!(new, &config);
    }

    #[tokio::test]
    async fn test_update_config_enabled_runs_lifecycle_hooks() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(
                Tagger::new("a", "[A]", &journal)
                    .defaults(PluginConfigPatch::new().enabled(false))
                    .arc(),
            )
            .await
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for name in [ManagerEvent::ENABLED, ManagerEvent::DISABLED] {
            let sink = Arc::clone(&seen);
            manager.events().on(name, move |e: &ManagerEvent| {
                sink.lock().push(e.name());
            });
        }

        manager
            .update_config("a", PluginConfigPatch::new().enabled(true).priority(2))
            .await
            .unwrap();
        assert!(manager.is_enabled("a").await);
        assert_eq!(Journal::count(&journal.enable), 1);
        assert_eq!(manager.get_config("a").await.unwrap().priority, 2);

        manager
            .update_config("a", PluginConfigPatch::new().enabled(false))
            .await
            .unwrap();
        assert!(!manager.is_enabled("a").await);
        assert_eq!(Journal::count(&journal.disable), 1);
        assert_eq!(*seen.lock(), ["plugin:enabled", "plugin:disabled"]);
    }

    #[tokio::test]
    async fn test_update_config_enable_failure_keeps_new_options() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        let plugin = Tagger::new("a", "[A]", &journal)
            .defaults(PluginConfigPatch::new().enabled(false))
            .faults(Faults {
                enable: true,
                ..Faults::default()
            });
        manager.register(plugin.arc()).await.unwrap();

        let err = manager
            .update_config("a", PluginConfigPatch::new().enabled(true).priority(9))
            .await
            .unwrap_err();

        assert!(matches!(err, PluginError::Enable { .. }));
        let config = manager.get_config("a").await.unwrap();
        assert!(!config.enabled);
        assert_eq!(config.priority, 9);
    }

    #[tokio::test]
    async fn test_update_config_rejects_schema_violation() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(
                Tagger::new("a", "[A]", &journal)
                    .schema(threshold_schema())
                    .arc(),
            )
            .await
            .unwrap();
        let before = manager.get_config("a").await.unwrap();

        let err = manager
            .update_config("a", PluginConfigPatch::new().option("threshold", "high"))
            .await
            .unwrap_err();

        let PluginError::InvalidConfig { errors, .. } = err else {
            panic!("expected InvalidConfig, got {err:?}");
        };
        assert_eq!(errors, ["$.options.threshold: expected number, got string"]);
        assert_eq!(manager.get_config("a").await.unwrap(), before);
        assert_eq!(Journal::count(&journal.config_change), 0);
    }

    #[tokio::test]
    async fn test_config_change_failure_restores_previous_config() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        let plugin = Tagger::new("a", "[A]", &journal).faults(Faults {
            config_change: true,
            ..Faults::default()
        });
        manager.register(plugin.arc()).await.unwrap();
        let before = manager.get_config("a").await.unwrap();

        let err = manager
            .update_config("a", PluginConfigPatch::new().priority(99))
            .await
            .unwrap_err();

        assert!(matches!(err, PluginError::ConfigChange { .. }));
        assert_eq!(manager.get_config("a").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_global_config_broadcast_isolates_failures() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        let faulty = Tagger::new("faulty", "", &journal)
            .priority(10)
            .faults(Faults {
                config_change: true,
                ..Faults::default()
            });
        manager.register(faulty.arc()).await.unwrap();
        manager
            .register(Tagger::new("healthy", "", &journal).arc())
            .await
            .unwrap();
        manager
            .register(
                Tagger::new("idle", "", &journal)
                    .defaults(PluginConfigPatch::new().enabled(false))
                    .arc(),
            )
            .await
            .unwrap();

        manager
            .update_global_config(ConciergusConfig {
                debug: true,
                ..ConciergusConfig::default()
            })
            .await;

        // faulty and healthy, not idle
        assert_eq!(Journal::count(&journal.config_change), 2);
        assert!(manager.global_config().debug);
        let idle = manager.get_context("idle").await.unwrap();
        assert!(idle.global_config().debug);
    }

    // ─── Dispatch ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_message_pipeline_runs_by_priority() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(Tagger::new("b", "[B]", &journal).priority(5).arc())
            .await
            .unwrap();
        manager
            .register(Tagger::new("a", "[A]", &journal).priority(10).arc())
            .await
            .unwrap();

        assert_eq!(incoming(&manager, "hi").await, "hi[A][B]");

        let outgoing = manager
            .execute_message_plugins(Message::user("m2", "hi"), MessageDirection::Outgoing)
            .await;
        assert_eq!(outgoing.content, "[B][A]hi");
    }

    #[tokio::test]
    async fn test_equal_priority_runs_in_registration_order() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        for (id, tag) in [("z", "[Z]"), ("m", "[M]"), ("a", "[A]")] {
            manager
                .register(Tagger::new(id, tag, &journal).arc())
                .await
                .unwrap();
        }

        assert_eq!(incoming(&manager, "").await, "[Z][M][A]");
    }

    #[tokio::test]
    async fn test_failing_plugin_is_skipped() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        let faulty = Tagger::new("a", "[A]", &journal)
            .priority(10)
            .faults(Faults {
                process: true,
                ..Faults::default()
            });
        manager.register(faulty.arc()).await.unwrap();
        manager
            .register(Tagger::new("b", "[B]", &journal).arc())
            .await
            .unwrap();

        assert_eq!(incoming(&manager, "hi").await, "hi[B]");
    }

    #[test]
    fn test_message_failures_name_the_directional_hook() {
        assert_eq!(message_hook(MessageDirection::Incoming), "process_message");
        assert_eq!(
            message_hook(MessageDirection::Outgoing),
            "process_outgoing_message"
        );
    }

    #[tokio::test]
    async fn test_disabled_plugins_do_not_participate() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(Tagger::new("a", "[A]", &journal).arc())
            .await
            .unwrap();
        manager
            .register(Tagger::new("b", "[B]", &journal).arc())
            .await
            .unwrap();

        manager.disable("a").await.unwrap();

        assert_eq!(incoming(&manager, "hi").await, "hi[B]");
    }

    #[tokio::test]
    async fn test_no_plugins_passes_values_through() {
        let manager = manager();
        manager.register(Bare::arc("bare")).await.unwrap();

        assert_eq!(incoming(&manager, "hi").await, "hi");
        let part = manager
            .execute_stream_plugins(StreamEvent::Part(StreamPart::text("p", "x")))
            .await;
        assert_eq!(part, Some(StreamPart::text("p", "x")));
    }

    #[tokio::test]
    async fn test_stream_pipeline() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(Tagger::new("a", "[A]", &journal).priority(1).arc())
            .await
            .unwrap();
        manager
            .register(Tagger::new("b", "[B]", &journal).arc())
            .await
            .unwrap();

        let part = manager
            .execute_stream_plugins(StreamEvent::Part(StreamPart::text("p1", "tok")))
            .await;
        assert_eq!(part, Some(StreamPart::text("p1", "tok[A][B]")));

        assert_eq!(manager.execute_stream_plugins(StreamEvent::Start).await, None);
        assert_eq!(manager.execute_stream_plugins(StreamEvent::End).await, None);
        let error = StreamError::new("socket closed");
        assert_eq!(
            manager
                .execute_stream_plugins(StreamEvent::Error(error))
                .await,
            None
        );
        assert_eq!(Journal::count(&journal.notifications), 6);
    }

    #[tokio::test]
    async fn test_conversation_pipeline() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(Tagger::new("a", "[A]", &journal).arc())
            .await
            .unwrap();

        let created = manager
            .execute_conversation_plugins(ConversationEvent::Create(Conversation::new("c1")))
            .await
            .unwrap();
        assert_eq!(created.title.as_deref(), Some("[A]"));

        let updated = manager
            .execute_conversation_plugins(ConversationEvent::Update(created.clone()))
            .await;
        assert_eq!(updated, Some(created));

        let deleted = manager
            .execute_conversation_plugins(ConversationEvent::Delete("c1".into()))
            .await;
        assert_eq!(deleted, None);
        assert_eq!(Journal::count(&journal.notifications), 1);
    }

    #[tokio::test]
    async fn test_agent_pipeline() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(Tagger::new("a", "", &journal).arc())
            .await
            .unwrap();
        manager
            .register(Tagger::new("b", "", &journal).arc())
            .await
            .unwrap();
        let step = AgentStep {
            agent_id: "planner".into(),
            step_number: 0,
            input: Value::Null,
            output: None,
        };

        let before = manager
            .execute_agent_plugins(AgentEvent::BeforeStep(step.clone()))
            .await
            .unwrap();
        assert_eq!(before.step_number, 2);

        let after = manager
            .execute_agent_plugins(AgentEvent::AfterStep(step.clone()))
            .await;
        assert_eq!(after, Some(step.clone()));

        let failed = manager
            .execute_agent_plugins(AgentEvent::Error(step, StreamError::new("tool crashed")))
            .await;
        assert_eq!(failed, None);
        assert_eq!(Journal::count(&journal.notifications), 2);
    }

    #[tokio::test]
    async fn test_analytics_and_capability_queries() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(Tagger::new("tagger", "", &journal).arc())
            .await
            .unwrap();
        manager.register(Bare::arc("bare")).await.unwrap();

        let event = AnalyticsEvent {
            name: "message_sent".into(),
            properties: Default::default(),
            timestamp: 0,
        };
        manager.execute_analytics_plugins(&event).await;
        assert_eq!(Journal::count(&journal.notifications), 1);

        for capability in Capability::ALL {
            let ids: Vec<String> = manager
                .plugins_with_capability(capability)
                .await
                .iter()
                .map(|p| p.id().to_string())
                .collect();
            assert_eq!(ids, ["tagger"], "{capability:?}");
        }
    }

    // ─── Services ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_plugin_storage_is_namespaced() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        manager
            .register(Tagger::new("a", "", &journal).arc())
            .await
            .unwrap();
        manager
            .register(Tagger::new("b", "", &journal).arc())
            .await
            .unwrap();
        let a = manager.get_context("a").await.unwrap();
        let b = manager.get_context("b").await.unwrap();

        a.storage().set("k", &1).await;
        b.storage().set("k", &2).await;

        assert_eq!(a.storage().get::<i32>("k").await, Some(1));
        assert_eq!(b.storage().get::<i32>("k").await, Some(2));
        assert_eq!(a.storage().keys().await, ["k"]);
    }

    #[tokio::test]
    async fn test_manager_events_follow_lifecycle() {
        let journal = Arc::new(Journal::default());
        let manager = manager();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for name in [
            ManagerEvent::REGISTERED,
            ManagerEvent::ENABLED,
            ManagerEvent::DISABLED,
            ManagerEvent::UNREGISTERED,
        ] {
            let sink = Arc::clone(&seen);
            manager.events().on(name, move |e: &ManagerEvent| {
                sink.lock().push(format!("{} {}", e.name(), e.plugin_id()));
            });
        }

        manager
            .register(Tagger::new("a", "", &journal).arc())
            .await
            .unwrap();
        manager.unregister("a").await.unwrap();

        assert_eq!(
            *seen.lock(),
            [
                "plugin:registered a",
                "plugin:enabled a",
                "plugin:disabled a",
                "plugin:unregistered a",
            ]
        );
    }

    #[tokio::test]
    async fn test_unmet_dependency_only_warns() {
        let manager = manager();
        let journal = Arc::new(Journal::default());
        let mut plugin = Tagger::new("a", "", &journal);
        plugin.metadata = plugin
            .metadata
            .clone()
            .with_dependency("missing", "^1")
            .with_min_host_version("99.0.0");

        manager.register(plugin.arc()).await.unwrap();

        assert!(manager.is_enabled("a").await);
    }
}
