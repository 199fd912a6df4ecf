use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    pjman_common::CommandRecord,
    pjman_progress::ProgressBus,
    pjman_sandbox::Script,
    serde_json::Value,
};

use crate::plugin::Plugin;

/// A plugin backed by a sandboxed script exposing `execute` and `undo`.
#[derive(Debug, Clone)]
pub struct ScriptPlugin {
    path: PathBuf,
    script: Script,
}

impl ScriptPlugin {
    /// Wrap `script` if it has the required shape.
    pub fn new(path: &Path, script: Script) -> Option<Self> {
        (script.is_callable("execute") && script.is_callable("undo")).then(|| Self {
            path: path.to_path_buf(),
            script,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn call(&self, export: &str, command: &CommandRecord, progress: &ProgressBus) -> Result<Value> {
        let command = serde_json::to_value(command)?;
        self.script
            .call(export, command, progress.clone())
            .await
            .with_context(|| format!("{} in {}", export, self.path.display()))
    }
}

#[async_trait]
impl Plugin for ScriptPlugin {
    async fn execute(&self, command: &CommandRecord, progress: &ProgressBus) -> Result<Value> {
        self.call("execute", command, progress).await
    }

    async fn undo(&self, command: &CommandRecord, progress: &ProgressBus) -> Result<Value> {
        self.call("undo", command, progress).await
    }

    fn kind(&self) -> &'static str {
        "script"
    }
}
