//! Persistence seam for the command log.

use {anyhow::Result, async_trait::async_trait, pjman_common::CommandRecord};

/// Durable home of the command log.
///
/// The log is always written whole: `save` replaces everything previously
/// stored, and must either fully succeed or leave the old log readable.
#[async_trait]
pub trait CommandStore: Send + Sync {
    async fn load(&self) -> Result<Vec<CommandRecord>>;
    async fn save(&self, records: &[CommandRecord]) -> Result<()>;
}
