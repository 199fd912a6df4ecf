//! Structured error reporting shared by the plugin and command error families.

use serde_json::Value;

/// Metadata every user-facing pjman error carries, plus a logging side channel.
///
/// `log` never changes control flow: callers log, then propagate.
pub trait ErrorReport: std::error::Error {
    /// Error family, e.g. `PluginError`.
    fn name(&self) -> &'static str;

    /// Stable machine-readable code, e.g. `COMMAND_NOT_FOUND`.
    fn code(&self) -> &'static str;

    /// The object the error is about, if any.
    fn target(&self) -> Option<Value> {
        None
    }

    /// Free-form diagnostic context.
    fn context(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }

    /// When the error was raised, in milliseconds since the Unix epoch.
    fn timestamp_ms(&self) -> u64;

    fn log(&self) {
        let target = self.target().unwrap_or(Value::Null);
        tracing::error!(
            name = self.name(),
            code = self.code(),
            target = %target,
            timestamp_ms = self.timestamp_ms(),
            context = %self.context(),
            "{self}"
        );
    }
}
