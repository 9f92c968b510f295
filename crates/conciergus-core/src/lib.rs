//! # Conciergus Core
//!
//! Foundation types shared by every layer of the Conciergus plugin system.
//!
//! This crate provides:
//! - Plugin identity ([`PluginMetadata`], [`Author`]) and its validation rules
//! - The host-owned global configuration ([`ConciergusConfig`])
//! - The chat values that flow through plugin pipelines ([`Message`],
//!   [`StreamPart`], [`Conversation`], [`AgentStep`], [`AnalyticsEvent`])
//! - The plugin error taxonomy ([`PluginError`])
//!
//! Nothing here depends on an async runtime; the plugin manager itself lives
//! in `conciergus-framework`.

pub mod config;
pub mod error;
pub mod message;
pub mod metadata;

pub use config::{ConciergusConfig, Environment};
pub use error::{BoxError, PluginError, PluginResult};
pub use message::{
    AgentEvent, AgentStep, AnalyticsEvent, Conversation, ConversationEvent, Message,
    MessageDirection, Role, StreamError, StreamEvent, StreamPart,
};
pub use metadata::{Author, PluginMetadata};
