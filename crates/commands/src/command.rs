use std::sync::Arc;

use {
    anyhow::bail,
    async_trait::async_trait,
    pjman_common::{CommandRecord, ErrorReport},
    pjman_plugins::Plugin,
    pjman_progress::ProgressBus,
    serde_json::Value,
    uuid::Uuid,
};

use crate::error::{CommandError, Result};

/// One invocation of an operation against a target.
///
/// The record (id, timestamp, target, operation) is fixed at construction.
#[derive(Clone)]
pub struct Command {
    record: CommandRecord,
    plugin: Arc<dyn Plugin>,
    progress: ProgressBus,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("record", &self.record)
            .field("plugin", &self.plugin.kind())
            .finish_non_exhaustive()
    }
}

impl Command {
    /// A fresh command with a new id and the current timestamp.
    pub fn new(
        target: Value,
        operation: impl Into<String>,
        plugin: Arc<dyn Plugin>,
        progress: ProgressBus,
    ) -> Self {
        Self::restore(CommandRecord::new(target, operation), plugin, progress)
    }

    /// Rebind a persisted record, keeping its id and timestamp.
    pub(crate) fn restore(record: CommandRecord, plugin: Arc<dyn Plugin>, progress: ProgressBus) -> Self {
        Self {
            record,
            plugin,
            progress,
        }
    }

    pub fn record(&self) -> &CommandRecord {
        &self.record
    }

    pub fn id(&self) -> Uuid {
        self.record.id
    }

    pub fn operation(&self) -> &str {
        &self.record.operation
    }

    pub async fn execute(&self) -> Result<Value> {
        self.plugin
            .execute(&self.record, &self.progress)
            .await
            .map_err(|e| self.failed(e))
    }

    pub async fn undo(&self) -> Result<Value> {
        self.plugin
            .undo(&self.record, &self.progress)
            .await
            .map_err(|e| self.failed(e))
    }

    fn failed(&self, source: anyhow::Error) -> CommandError {
        let err = CommandError::execution_failed(&self.record, source);
        err.log();
        err
    }
}

/// Stands in for an operation that was logged but is no longer registered.
pub(crate) struct UnboundPlugin {
    operation: String,
}

impl UnboundPlugin {
    pub(crate) fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
        }
    }
}

#[async_trait]
impl Plugin for UnboundPlugin {
    async fn execute(&self, _command: &CommandRecord, _progress: &ProgressBus) -> anyhow::Result<Value> {
        bail!("operation '{}' is not registered", self.operation)
    }

    async fn undo(&self, _command: &CommandRecord, _progress: &ProgressBus) -> anyhow::Result<Value> {
        bail!("operation '{}' is not registered", self.operation)
    }

    fn kind(&self) -> &'static str {
        "unbound"
    }
}
