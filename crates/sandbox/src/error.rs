use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("script evaluation exceeded {}ms", limit.as_millis())]
    Timeout { limit: Duration },

    #[error("script failed to load: {message}")]
    LoadFailed { message: String },

    #[error("call to '{export}' failed: {message}")]
    CallFailed { export: String, message: String },

    #[error("script worker is no longer running")]
    WorkerGone,

    #[error("unknown sandbox capability '{name}'")]
    UnknownCapability { name: String },
}

impl SandboxError {
    #[must_use]
    pub fn load_failed(message: impl Into<String>) -> Self {
        Self::LoadFailed {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn call_failed(export: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CallFailed {
            export: export.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unknown_capability(name: impl Into<String>) -> Self {
        Self::UnknownCapability { name: name.into() }
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;
