use std::{collections::HashMap, sync::Arc};

use {
    anyhow::Result, async_trait::async_trait, pjman_common::CommandRecord,
    pjman_progress::ProgressBus, serde_json::Value,
};

/// A reversible operation.
///
/// Both halves receive the full command record and the shared progress bus.
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait Plugin: Send + Sync {
    async fn execute(&self, command: &CommandRecord, progress: &ProgressBus) -> Result<Value>;

    async fn undo(&self, command: &CommandRecord, progress: &ProgressBus) -> Result<Value>;

    /// Short label for listings.
    fn kind(&self) -> &'static str {
        "native"
    }
}

/// Operation name -> plugin, as consumed by the commander.
pub type Operations = HashMap<String, Arc<dyn Plugin>>;
