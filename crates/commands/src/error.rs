use {
    pjman_common::{CommandRecord, ErrorReport, now_ms},
    serde_json::{Value, json},
};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command {command_id} not found")]
    NotFound { command_id: String, at_ms: u64 },

    #[error("no commands to undo")]
    NoCommandsToUndo { at_ms: u64 },

    #[error("failed to execute command: {source:#}")]
    ExecutionFailed {
        command: Box<CommandRecord>,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        at_ms: u64,
    },

    #[error("failed to persist command log: {source:#}")]
    Storage {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        at_ms: u64,
    },
}

impl CommandError {
    #[must_use]
    pub fn not_found(command_id: impl Into<String>) -> Self {
        Self::NotFound {
            command_id: command_id.into(),
            at_ms: now_ms(),
        }
    }

    #[must_use]
    pub fn no_commands_to_undo() -> Self {
        Self::NoCommandsToUndo { at_ms: now_ms() }
    }

    #[must_use]
    pub fn execution_failed(command: &CommandRecord, source: anyhow::Error) -> Self {
        Self::ExecutionFailed {
            command: Box::new(command.clone()),
            source: source.into(),
            at_ms: now_ms(),
        }
    }

    #[must_use]
    pub fn storage(source: anyhow::Error) -> Self {
        Self::Storage {
            source: source.into(),
            at_ms: now_ms(),
        }
    }

    /// The record a failed execution belongs to.
    pub fn command(&self) -> Option<&CommandRecord> {
        match self {
            Self::ExecutionFailed { command, .. } => Some(command),
            _ => None,
        }
    }
}

impl ErrorReport for CommandError {
    fn name(&self) -> &'static str {
        "CommandError"
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "COMMAND_NOT_FOUND",
            Self::NoCommandsToUndo { .. } => "NO_COMMANDS_TO_UNDO",
            Self::ExecutionFailed { .. } => "EXECUTION_FAILED",
            Self::Storage { .. } => "STORAGE_FAILED",
        }
    }

    fn target(&self) -> Option<Value> {
        match self {
            Self::NotFound { command_id, .. } => Some(json!(command_id)),
            Self::ExecutionFailed { command, .. } => serde_json::to_value(command).ok(),
            Self::NoCommandsToUndo { .. } | Self::Storage { .. } => None,
        }
    }

    fn context(&self) -> Value {
        match self {
            Self::ExecutionFailed { command, source, .. } => {
                json!({ "operation": command.operation, "cause": format!("{source:#}") })
            },
            Self::Storage { source, .. } => json!({ "cause": format!("{source:#}") }),
            Self::NotFound { .. } | Self::NoCommandsToUndo { .. } => json!({}),
        }
    }

    fn timestamp_ms(&self) -> u64 {
        match self {
            Self::NotFound { at_ms, .. }
            | Self::NoCommandsToUndo { at_ms }
            | Self::ExecutionFailed { at_ms, .. }
            | Self::Storage { at_ms, .. } => *at_ms,
        }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
