//! JSON file-backed command log with atomic replacement.

use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    pjman_common::CommandRecord,
    tokio::{fs, io::AsyncWriteExt},
    tracing::debug,
};

use crate::store::CommandStore;

/// The log as a pretty-printed JSON array in a single file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl CommandStore for FileStore {
    /// A missing file is an empty log.
    async fn load(&self) -> Result<Vec<CommandRecord>> {
        let exists = fs::try_exists(&self.path)
            .await
            .with_context(|| format!("failed to check {}", self.path.display()))?;
        if !exists {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let records: Vec<CommandRecord> = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(records)
    }

    /// Write to a sibling temp file, fsync, then rename over the log.
    async fn save(&self, records: &[CommandRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.tmp_path();

        let mut file = fs::File::create(&tmp)
            .await
            .with_context(|| format!("failed to create {}", tmp.display()))?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        debug!(path = %self.path.display(), records = records.len(), "command log saved");
        Ok(())
    }
}
