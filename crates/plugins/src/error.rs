use std::path::{Path, PathBuf};

use {
    pjman_common::{ErrorReport, now_ms},
    serde_json::{Value, json},
};

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin '{name}' not found")]
    NotFound { name: String, at_ms: u64 },

    #[error("invalid content structure in {}", path.display())]
    InvalidStructure { path: PathBuf, at_ms: u64 },

    #[error("{context}: {source}")]
    LoadFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        at_ms: u64,
    },
}

impl PluginError {
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            at_ms: now_ms(),
        }
    }

    #[must_use]
    pub fn invalid_structure(path: &Path) -> Self {
        Self::InvalidStructure {
            path: path.to_path_buf(),
            at_ms: now_ms(),
        }
    }

    #[must_use]
    pub fn load_failed(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::LoadFailed {
            context: context.into(),
            source: source.into(),
            at_ms: now_ms(),
        }
    }
}

impl ErrorReport for PluginError {
    fn name(&self) -> &'static str {
        "PluginError"
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "PLUGIN_NOT_FOUND",
            Self::InvalidStructure { .. } => "INVALID_PLUGIN_STRUCTURE",
            Self::LoadFailed { .. } => "PLUGIN_LOAD_FAILED",
        }
    }

    fn target(&self) -> Option<Value> {
        match self {
            Self::NotFound { name, .. } => Some(json!(name)),
            Self::InvalidStructure { path, .. } => Some(json!(path.display().to_string())),
            Self::LoadFailed { .. } => None,
        }
    }

    fn context(&self) -> Value {
        match self {
            Self::LoadFailed { context, source, .. } => {
                json!({ "stage": context, "cause": source.to_string() })
            },
            Self::NotFound { .. } | Self::InvalidStructure { .. } => json!({}),
        }
    }

    fn timestamp_ms(&self) -> u64 {
        match self {
            Self::NotFound { at_ms, .. }
            | Self::InvalidStructure { at_ms, .. }
            | Self::LoadFailed { at_ms, .. } => *at_ms,
        }
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;
