//! The built-in `backup` operation.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    pjman_common::CommandRecord,
    pjman_config::Layout,
    pjman_progress::ProgressBus,
    serde_json::{Value, json},
    tokio::fs,
    tracing::info,
};

use crate::plugin::{Operations, Plugin};

pub const BACKUP_OPERATION: &str = "backup";

/// Copies the target file aside on execute and puts it back on undo.
///
/// Backups are keyed by command id, so repeated backups of one file never
/// collide.
#[derive(Debug, Clone)]
pub struct BackupPlugin {
    base_dir: PathBuf,
    backup_dir: PathBuf,
}

impl BackupPlugin {
    pub fn new(base_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            backup_dir: backup_dir.into(),
        }
    }

    fn target(&self, command: &CommandRecord) -> Result<PathBuf> {
        let Some(target) = command.target_str() else {
            bail!("backup target must be a file path, got {}", command.target);
        };
        Ok(self.base_dir.join(target))
    }

    fn backup_path(&self, command: &CommandRecord) -> PathBuf {
        self.backup_dir.join(command.id.to_string())
    }
}

async fn require_file(path: &Path, what: &str) -> Result<()> {
    let exists = fs::try_exists(path)
        .await
        .with_context(|| format!("cannot check {what} {}", path.display()))?;
    if !exists {
        bail!("{what} {} does not exist", path.display());
    }
    Ok(())
}

#[async_trait]
impl Plugin for BackupPlugin {
    async fn execute(&self, command: &CommandRecord, progress: &ProgressBus) -> Result<Value> {
        let target = self.target(command)?;
        let backup = self.backup_path(command);
        progress.start(BACKUP_OPERATION);

        require_file(&target, "target").await?;
        fs::create_dir_all(&self.backup_dir)
            .await
            .with_context(|| format!("creating {}", self.backup_dir.display()))?;
        let bytes = fs::copy(&target, &backup)
            .await
            .with_context(|| format!("copying {} to {}", target.display(), backup.display()))?;

        info!(target = %target.display(), backup = %backup.display(), bytes, "backup written");
        let result = json!({
            "target": target.display().to_string(),
            "backup": backup.display().to_string(),
            "bytes": bytes,
        });
        progress.complete(result.clone());
        Ok(result)
    }

    async fn undo(&self, command: &CommandRecord, progress: &ProgressBus) -> Result<Value> {
        let target = self.target(command)?;
        let backup = self.backup_path(command);
        progress.start(BACKUP_OPERATION);

        require_file(&backup, "backup").await?;
        require_file(&target, "target").await?;
        fs::copy(&backup, &target)
            .await
            .with_context(|| format!("restoring {} from {}", target.display(), backup.display()))?;
        fs::remove_file(&backup)
            .await
            .with_context(|| format!("removing {}", backup.display()))?;

        info!(target = %target.display(), "backup restored");
        let result = json!({ "target": target.display().to_string(), "restored": true });
        progress.complete(result.clone());
        Ok(result)
    }

    fn kind(&self) -> &'static str {
        "builtin"
    }
}

/// Native operations shipped with pjman. They take precedence over script
/// plugins of the same name.
pub fn builtin_operations(layout: &Layout) -> Operations {
    let backup: Arc<dyn Plugin> = Arc::new(BackupPlugin::new(
        layout.project_dir(),
        layout.backup_dir(),
    ));
    Operations::from([(BACKUP_OPERATION.to_string(), backup)])
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {super::*, pjman_progress::ProgressEvent};

    fn setup() -> (tempfile::TempDir, Layout, Arc<dyn Plugin>) {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        let plugin = builtin_operations(&layout).remove(BACKUP_OPERATION).unwrap();
        (tmp, layout, plugin)
    }

    #[tokio::test]
    async fn backup_then_restore() {
        let (tmp, layout, plugin) = setup();
        let file = tmp.path().join("package.json");
        std::fs::write(&file, "before").unwrap();
        let command = CommandRecord::new(json!("package.json"), BACKUP_OPERATION);

        let bus = ProgressBus::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        bus.subscribe(Arc::new(move |e: &ProgressEvent| sink.lock().unwrap().push(e.name())));

        let out = plugin.execute(&command, &bus).await.unwrap();
        assert_eq!(out["bytes"], 8);
        let backup = layout.backup_dir().join(command.id.to_string());
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "before");
        assert_eq!(*events.lock().unwrap(), ["plugin:start", "completed"]);

        std::fs::write(&file, "edited").unwrap();
        plugin.undo(&command, &bus).await.unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "before");
        assert!(!backup.exists());
    }

    #[tokio::test]
    async fn undo_without_backup_fails() {
        let (tmp, _layout, plugin) = setup();
        std::fs::write(tmp.path().join("a.txt"), "x").unwrap();
        let command = CommandRecord::new(json!("a.txt"), BACKUP_OPERATION);
        let err = plugin.undo(&command, &ProgressBus::new()).await.unwrap_err();
        assert!(err.to_string().contains("backup"), "{err}");
    }

    #[tokio::test]
    async fn missing_target_fails_execute() {
        let (_tmp, _layout, plugin) = setup();
        let command = CommandRecord::new(json!("ghost.txt"), BACKUP_OPERATION);
        assert!(plugin.execute(&command, &ProgressBus::new()).await.is_err());
    }

    #[tokio::test]
    async fn non_path_target_is_rejected() {
        let (_tmp, _layout, plugin) = setup();
        let command = CommandRecord::new(json!({"path": 1}), BACKUP_OPERATION);
        let err = plugin.execute(&command, &ProgressBus::new()).await.unwrap_err();
        assert!(err.to_string().contains("file path"));
    }
}
