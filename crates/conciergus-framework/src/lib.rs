//! # Conciergus Framework
//!
//! The plugin system for Conciergus chat experiences.
//!
//! This layer provides:
//! - The [`Plugin`] trait with optional lifecycle hooks and capability
//!   queries for the message, stream, conversation, agent and analytics
//!   extension points
//! - [`PluginManager`], which owns the registry, drives lifecycle
//!   transitions with rollback, and threads values through enabled plugins
//!   in priority order
//! - Per-plugin services bundled in a [`PluginContext`]: a namespaced
//!   [`PluginStorage`], a prefixed [`PluginLogger`], an isolated
//!   [`PluginEventEmitter`] and the stateless [`PluginUtils`]
//!
//! # Example
//!
//! ```rust,ignore
//! use conciergus_framework::prelude::*;
//!
//! let manager = PluginManager::new(ConciergusConfig::default());
//! manager.register(Arc::new(MyPlugin::default())).await?;
//!
//! let shown = manager
//!     .execute_message_plugins(Message::assistant("m1", "hello"), MessageDirection::Incoming)
//!     .await;
//! ```

pub mod context;
pub mod error;
pub mod events;
pub mod logger;
pub mod manager;
pub mod plugin;
pub mod storage;
pub mod utils;

pub use context::PluginContext;
pub use error::{StorageError, StorageResult};
pub use events::{EventBus, ListenerId, ManagerEvent, PluginEvent, PluginEventEmitter};
pub use logger::{LogLevel, PluginLogger};
pub use manager::{HOST_VERSION, ManagerStats, PluginManager};
pub use plugin::{
    AgentPlugin, AnalyticsPlugin, Capability, ConversationPlugin, HookResult, MessagePlugin,
    Plugin, PluginConfig, PluginConfigPatch, StreamPlugin,
};
pub use storage::{FileKv, KvStore, MemoryKv, PluginStorage};
pub use utils::{Debounced, PluginUtils, Throttled, ValidationResult};

// Re-exported so plugin crates can implement hooks without a direct dependency.
pub use async_trait::async_trait;
pub use conciergus_core;

/// Commonly used types for writing and hosting plugins.
pub mod prelude {
    pub use std::sync::Arc;

    pub use async_trait::async_trait;
    pub use conciergus_core::{
        AgentEvent, AgentStep, AnalyticsEvent, Author, BoxError, ConciergusConfig, Conversation,
        ConversationEvent, Environment, Message, MessageDirection, PluginError, PluginMetadata,
        PluginResult, Role, StreamError, StreamEvent, StreamPart,
    };

    pub use crate::{
        AgentPlugin, AnalyticsPlugin, Capability, ConversationPlugin, HookResult, MessagePlugin,
        Plugin, PluginConfig, PluginConfigPatch, PluginContext, PluginManager, StreamPlugin,
    };
}
