//! Leveled logging scoped to a plugin identity.

use std::fmt::Display;
use std::sync::Arc;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Severity of a plugin log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Upper-case tag embedded in every line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Logger handed to a plugin through its
/// [`PluginContext`](crate::PluginContext).
///
/// Every line is formatted as
/// `[<RFC 3339 timestamp>] [Plugin:<id>] [<LEVEL>] <message>` and forwarded
/// to the matching `tracing` level with a `plugin` field. Nothing is buffered;
/// the installed subscriber decides where lines go.
#[derive(Debug, Clone)]
pub struct PluginLogger {
    plugin_id: Arc<str>,
}

impl PluginLogger {
    pub fn new(plugin_id: impl Into<Arc<str>>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn trace(&self, message: impl Display) {
        self.log(LogLevel::Trace, message);
    }

    pub fn debug(&self, message: impl Display) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Display) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Display) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Display) {
        self.log(LogLevel::Error, message);
    }

    /// Emits one line at `level`.
    pub fn log(&self, level: LogLevel, message: impl Display) {
        let line = self.format_line(level, &message);
        let plugin = &*self.plugin_id;
        match level {
            LogLevel::Trace => tracing::trace!(plugin, "{line}"),
            LogLevel::Debug => tracing::debug!(plugin, "{line}"),
            LogLevel::Info => tracing::info!(plugin, "{line}"),
            LogLevel::Warn => tracing::warn!(plugin, "{line}"),
            LogLevel::Error => tracing::error!(plugin, "{line}"),
        }
    }

    fn format_line(&self, level: LogLevel, message: &dyn Display) -> String {
        format!(
            "[{}] [Plugin:{}] [{}] {}",
            timestamp(),
            self.plugin_id,
            level.as_str(),
            message
        )
    }
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
