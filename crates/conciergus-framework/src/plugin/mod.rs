//! The plugin contract.
//!
//! # Architecture
//!
//! A plugin is any `Send + Sync` type implementing [`Plugin`]. Only
//! [`metadata`](Plugin::metadata) is required; every lifecycle hook defaults
//! to a successful no-op.
//!
//! Extension points are opt-in through **capability queries**: a plugin that
//! wants to see chat messages overrides
//! [`as_message_plugin`](Plugin::as_message_plugin) to return `Some(self)`
//! and implements [`MessagePlugin`]. Inside an extension trait each hook has
//! a pass-through default, so a plugin only writes the hooks it cares about.
//!
//! | Capability | Trait | Manager entry point |
//! |------------|-------|---------------------|
//! | [`Capability::Message`] | [`MessagePlugin`] | `execute_message_plugins` |
//! | [`Capability::Stream`] | [`StreamPlugin`] | `execute_stream_plugins` |
//! | [`Capability::Conversation`] | [`ConversationPlugin`] | `execute_conversation_plugins` |
//! | [`Capability::Agent`] | [`AgentPlugin`] | `execute_agent_plugins` |
//! | [`Capability::Analytics`] | [`AnalyticsPlugin`] | `execute_analytics_plugins` |
//!
//! # Example
//!
//! ```rust,ignore
//! use conciergus_framework::prelude::*;
//!
//! struct Shout { meta: PluginMetadata }
//!
//! #[async_trait]
//! impl Plugin for Shout {
//!     fn metadata(&self) -> &PluginMetadata { &self.meta }
//!     fn as_message_plugin(&self) -> Option<&dyn MessagePlugin> { Some(self) }
//! }
//!
//! #[async_trait]
//! impl MessagePlugin for Shout {
//!     async fn process_message(&self, mut m: Message, _: &PluginContext) -> HookResult<Message> {
//!         m.content = m.content.to_uppercase();
//!         Ok(m)
//!     }
//! }
//! ```

mod config;

pub use config::{PluginConfig, PluginConfigPatch};

use async_trait::async_trait;
use serde_json::Value;

use conciergus_core::{
    AgentStep, AnalyticsEvent, BoxError, ConciergusConfig, Conversation, Message, PluginMetadata,
    StreamError, StreamPart,
};

use crate::context::PluginContext;

/// Result returned by every plugin hook.
pub type HookResult<T = ()> = Result<T, BoxError>;

/// Extension points a plugin can participate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Message,
    Stream,
    Conversation,
    Agent,
    Analytics,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Self::Message,
        Self::Stream,
        Self::Conversation,
        Self::Agent,
        Self::Analytics,
    ];
}

// ─── Plugin ──────────────────────────────────────────────────────────────────

/// A unit of optional behavior managed by the
/// [`PluginManager`](crate::PluginManager).
///
/// Hooks receive the plugin's own [`PluginContext`]; a plugin never sees
/// another plugin's context, storage, or event channel.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Identity of this plugin. Must be stable for the plugin's lifetime.
    fn metadata(&self) -> &PluginMetadata;

    /// Shorthand for `metadata().id`.
    fn id(&self) -> &str {
        &self.metadata().id
    }

    /// Defaults merged over the manager defaults at registration.
    fn default_config(&self) -> Option<PluginConfigPatch> {
        None
    }

    /// Structural schema checked against the JSON form of the merged config
    /// on every [`update_config`](crate::PluginManager::update_config).
    ///
    /// See [`utils::validate_schema`](crate::utils::validate_schema) for the
    /// supported keywords.
    fn config_schema(&self) -> Option<Value> {
        None
    }

    /// Called once after the plugin is inserted into the registry.
    ///
    /// Returning `Err` rolls the registration back.
    async fn on_load(&self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    async fn on_enable(&self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    async fn on_disable(&self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called before the plugin is removed from the registry.
    ///
    /// Returning `Err` keeps the plugin registered.
    async fn on_unload(&self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// Called after the plugin's own config changed, and on every global
    /// config broadcast while the plugin is enabled.
    async fn on_config_change(
        &self,
        _ctx: &PluginContext,
        _global: &ConciergusConfig,
    ) -> HookResult {
        Ok(())
    }

    fn as_message_plugin(&self) -> Option<&dyn MessagePlugin> {
        None
    }

    fn as_stream_plugin(&self) -> Option<&dyn StreamPlugin> {
        None
    }

    fn as_conversation_plugin(&self) -> Option<&dyn ConversationPlugin> {
        None
    }

    fn as_agent_plugin(&self) -> Option<&dyn AgentPlugin> {
        None
    }

    fn as_analytics_plugin(&self) -> Option<&dyn AnalyticsPlugin> {
        None
    }

    /// Returns `true` if the plugin participates in `capability`.
    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Message => self.as_message_plugin().is_some(),
            Capability::Stream => self.as_stream_plugin().is_some(),
            Capability::Conversation => self.as_conversation_plugin().is_some(),
            Capability::Agent => self.as_agent_plugin().is_some(),
            Capability::Analytics => self.as_analytics_plugin().is_some(),
        }
    }
}

// ─── Extension points ────────────────────────────────────────────────────────

/// Transforms chat messages before display or before sending.
#[async_trait]
pub trait MessagePlugin: Send + Sync {
    /// Transforms a message received from the model.
    async fn process_message(&self, message: Message, _ctx: &PluginContext) -> HookResult<Message> {
        Ok(message)
    }

    /// Transforms a message the user is about to send.
    async fn process_outgoing_message(
        &self,
        message: Message,
        _ctx: &PluginContext,
    ) -> HookResult<Message> {
        Ok(message)
    }
}

/// Observes and transforms a streamed response.
#[async_trait]
pub trait StreamPlugin: Send + Sync {
    async fn process_stream_part(
        &self,
        part: StreamPart,
        _ctx: &PluginContext,
    ) -> HookResult<StreamPart> {
        Ok(part)
    }

    async fn on_stream_start(&self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    async fn on_stream_end(&self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    async fn on_stream_error(&self, _error: &StreamError, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }
}

/// Participates in conversation create/update/delete.
#[async_trait]
pub trait ConversationPlugin: Send + Sync {
    async fn on_conversation_create(
        &self,
        conversation: Conversation,
        _ctx: &PluginContext,
    ) -> HookResult<Conversation> {
        Ok(conversation)
    }

    async fn on_conversation_update(
        &self,
        conversation: Conversation,
        _ctx: &PluginContext,
    ) -> HookResult<Conversation> {
        Ok(conversation)
    }

    async fn on_conversation_delete(
        &self,
        _conversation_id: &str,
        _ctx: &PluginContext,
    ) -> HookResult {
        Ok(())
    }
}

/// Intercepts the steps of a multi-step agent run.
#[async_trait]
pub trait AgentPlugin: Send + Sync {
    async fn before_agent_step(
        &self,
        step: AgentStep,
        _ctx: &PluginContext,
    ) -> HookResult<AgentStep> {
        Ok(step)
    }

    async fn after_agent_step(
        &self,
        step: AgentStep,
        _ctx: &PluginContext,
    ) -> HookResult<AgentStep> {
        Ok(step)
    }

    async fn on_agent_error(
        &self,
        _step: &AgentStep,
        _error: &StreamError,
        _ctx: &PluginContext,
    ) -> HookResult {
        Ok(())
    }
}

/// Receives analytics events.
#[async_trait]
pub trait AnalyticsPlugin: Send + Sync {
    async fn track_event(&self, _event: &AnalyticsEvent, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }
}
