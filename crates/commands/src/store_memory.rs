//! In-memory store for testing.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};

use {
    anyhow::{Result, bail},
    async_trait::async_trait,
    pjman_common::CommandRecord,
};

use crate::store::CommandStore;

/// Keeps the log in a `Vec`. No persistence; for tests only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<CommandRecord>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<CommandRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make every following `save` fail, simulating a full disk.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// What the store currently holds.
    pub fn records(&self) -> Vec<CommandRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl CommandStore for MemoryStore {
    async fn load(&self) -> Result<Vec<CommandRecord>> {
        Ok(self.records())
    }

    async fn save(&self, records: &[CommandRecord]) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("simulated storage failure");
        }
        *self.records.lock().unwrap_or_else(|e| e.into_inner()) = records.to_vec();
        Ok(())
    }
}
