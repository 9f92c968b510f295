//! Conciergus Runtime: the host-side setup around the plugin manager.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `RuntimeConfig`)
//! - Logging initialization (`LoggingBuilder`, `init_from_config`)
//! - Plugin storage backend selection with memory fallback (`probe_store`)
//! - Runtime orchestration (`ConciergusRuntime`)
//!
//! ```rust,ignore
//! use conciergus_runtime::ConciergusRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ConciergusRuntime::new().await;
//!     runtime.register_plugin(MarkdownPlugin::default()).await?;
//!
//!     // Run until Ctrl+C, then unregister every plugin
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, RuntimeConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{ConciergusRuntime, RuntimeBuilder, RuntimeStats, probe_store};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for host code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
