//! The persisted, serializable face of a command.

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
    uuid::Uuid,
};

/// One entry of the command log: who ran, against what, and when.
///
/// This is the value plugins receive as "the command", the value errors
/// carry, and the exact shape written to `history/commands.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: Uuid,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(default)]
    pub target: Value,
    pub operation: String,
}

impl CommandRecord {
    /// Create a record with a fresh id and the current time.
    pub fn new(target: Value, operation: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: crate::now_ms(),
            target,
            operation: operation.into(),
        }
    }

    /// The target as a string, when it is one.
    pub fn target_str(&self) -> Option<&str> {
        self.target.as_str()
    }
}
