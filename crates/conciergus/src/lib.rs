//! # Conciergus
//!
//! The plugin system behind Conciergus chat experiences.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌─────────────────────────────────────┐
//! │  Chat layer  │────▶│ PluginManager │────▶│ Plugin "markdown" (own context)     │──▶ storage
//! │ (host code)  │◀────│  (priority    │────▶│ Plugin "profanity" (own context)    │──▶ logger
//! └──────────────┘     │   order)      │────▶│ Plugin ...                          │──▶ events
//!                      └───────────────┘     └─────────────────────────────────────┘
//! ```
//!
//! - **Runtime**: loads configuration, sets up logging and storage, owns the manager
//! - **PluginManager**: registry, lifecycle with rollback, sequential dispatch
//! - **Plugins**: optional hooks for messages, streams, conversations, agents and analytics
//! - **PluginContext**: per-plugin logger, namespaced storage, event channel and utilities
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conciergus::prelude::*;
//!
//! struct Shout(PluginMetadata);
//!
//! #[async_trait]
//! impl Plugin for Shout {
//!     fn metadata(&self) -> &PluginMetadata { &self.0 }
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
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ConciergusRuntime::new().await;
//!     runtime
//!         .register_plugin(Shout(PluginMetadata::new("shout", "Shout", "1.0.0", Author::new("me"))))
//!         .await?;
//!
//!     let message = runtime
//!         .manager()
//!         .execute_message_plugins(Message::assistant("m1", "hi"), MessageDirection::Incoming)
//!         .await;
//!     assert_eq!(message.content, "HI");
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): read `conciergus.toml`
//! - `yaml-config`: read `conciergus.yaml`
//! - `json-log`: JSON log output

pub use conciergus_core as core;
pub use conciergus_framework as framework;
pub use conciergus_runtime as runtime;

/// Everything needed to write plugins and host them.
///
/// ```rust,ignore
/// use conciergus::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use conciergus_runtime::{ConciergusRuntime, RuntimeConfig};

    // Plugin system
    pub use conciergus_framework::prelude::*;
    pub use conciergus_framework::{PluginLogger, PluginStorage, PluginUtils};
}
