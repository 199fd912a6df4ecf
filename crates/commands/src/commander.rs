//! The command log and its public contract.

use std::sync::Arc;

use {
    pjman_common::{CommandRecord, ErrorReport},
    pjman_plugins::{Operations, Plugin},
    pjman_progress::ProgressBus,
    serde_json::Value,
    tokio::sync::Mutex,
    tracing::{info, warn},
    uuid::Uuid,
};

use crate::{
    command::{Command, UnboundPlugin},
    error::{CommandError, Result},
    store::CommandStore,
};

/// Executes operations and keeps an undoable, persisted history of them.
///
/// Every mutation writes the new log to the store first and only then
/// changes memory, so a storage failure leaves both sides as they were.
pub struct Commander {
    operations: Operations,
    store: Arc<dyn CommandStore>,
    progress: ProgressBus,
    log: Mutex<Vec<Command>>,
}

impl Commander {
    /// Load the persisted log and rebind each entry to the plugin currently
    /// registered under its operation name.
    pub async fn open(
        operations: Operations,
        store: Arc<dyn CommandStore>,
        progress: ProgressBus,
    ) -> Result<Self> {
        let records = store.load().await.map_err(|e| logged(CommandError::storage(e)))?;
        let log = records
            .into_iter()
            .map(|record| {
                let plugin: Arc<dyn Plugin> = match operations.get(&record.operation) {
                    Some(plugin) => Arc::clone(plugin),
                    None => {
                        warn!(
                            command_id = %record.id,
                            operation = %record.operation,
                            "logged operation is not registered; undo will fail"
                        );
                        Arc::new(UnboundPlugin::new(&record.operation))
                    },
                };
                Command::restore(record, plugin, progress.clone())
            })
            .collect::<Vec<_>>();
        info!(commands = log.len(), "command log opened");

        Ok(Self {
            operations,
            store,
            progress,
            log: Mutex::new(log),
        })
    }

    pub fn progress(&self) -> &ProgressBus {
        &self.progress
    }

    pub fn operations(&self) -> &Operations {
        &self.operations
    }

    /// Run `operation` against `target` and record it.
    ///
    /// The command is logged before its plugin runs and stays in the log
    /// even if the plugin fails.
    pub async fn execute(&self, operation: &str, target: Value) -> Result<Value> {
        let Some(plugin) = self.operations.get(operation).cloned() else {
            let err = CommandError::execution_failed(
                &CommandRecord::new(target, operation),
                anyhow::anyhow!("operation '{operation}' is not registered"),
            );
            return Err(logged(err));
        };

        let command = Command::new(target, operation, plugin, self.progress.clone());
        {
            let mut log = self.log.lock().await;
            let mut next = records(&log);
            next.push(command.record().clone());
            self.persist(&next).await?;
            log.push(command.clone());
        }
        info!(command_id = %command.id(), operation, "executing command");

        command.execute().await
    }

    /// Undo commands and drop them from the log.
    ///
    /// - `command_id` set: that command, wherever it sits.
    /// - otherwise `count == 0`: the most recent command.
    /// - otherwise: up to `count` most recent commands, newest first, one at a
    ///   time; stops at the first failure, keeping what was already undone.
    ///   An empty log yields no results rather than an error.
    ///
    /// Returns each undo's result in the order they ran.
    pub async fn undo(&self, count: usize, command_id: Option<&str>) -> Result<Vec<Value>> {
        let mut log = self.log.lock().await;

        if let Some(id) = command_id {
            let position = position(&log, id).ok_or_else(|| logged(CommandError::not_found(id)))?;
            let result = log[position].undo().await?;
            self.remove_at(&mut log, position).await?;
            return Ok(vec![result]);
        }

        if count == 0 {
            let last = log
                .len()
                .checked_sub(1)
                .ok_or_else(|| logged(CommandError::no_commands_to_undo()))?;
            let result = log[last].undo().await?;
            self.remove_at(&mut log, last).await?;
            return Ok(vec![result]);
        }

        let mut results = Vec::new();
        for _ in 0..count {
            let Some(last) = log.len().checked_sub(1) else {
                break;
            };
            results.push(log[last].undo().await?);
            self.remove_at(&mut log, last).await?;
        }
        Ok(results)
    }

    /// Forget a command without undoing it.
    pub async fn delete_command(&self, command_id: &str) -> Result<CommandRecord> {
        let mut log = self.log.lock().await;
        let position =
            position(&log, command_id).ok_or_else(|| logged(CommandError::not_found(command_id)))?;
        let record = log[position].record().clone();
        self.remove_at(&mut log, position).await?;
        info!(command_id, "command deleted");
        Ok(record)
    }

    /// Forget every command. Returns how many were dropped.
    pub async fn clear(&self) -> Result<usize> {
        let mut log = self.log.lock().await;
        self.persist(&[]).await?;
        let dropped = log.len();
        log.clear();
        info!(dropped, "command log cleared");
        Ok(dropped)
    }

    /// The log, oldest first.
    pub async fn show_commands(&self) -> Vec<CommandRecord> {
        records(&self.log.lock().await)
    }

    async fn remove_at(&self, log: &mut Vec<Command>, position: usize) -> Result<()> {
        let next: Vec<CommandRecord> = log
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != position)
            .map(|(_, command)| command.record().clone())
            .collect();
        self.persist(&next).await?;
        log.remove(position);
        Ok(())
    }

    async fn persist(&self, records: &[CommandRecord]) -> Result<()> {
        self.store
            .save(records)
            .await
            .map_err(|e| logged(CommandError::storage(e)))
    }
}

fn records(log: &[Command]) -> Vec<CommandRecord> {
    log.iter().map(|command| command.record().clone()).collect()
}

/// Index of the command with `id`. Ids that don't parse match nothing.
fn position(log: &[Command], id: &str) -> Option<usize> {
    let id = Uuid::parse_str(id).ok()?;
    log.iter().position(|command| command.id() == id)
}

fn logged(err: CommandError) -> CommandError {
    err.log();
    err
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use {anyhow::bail, async_trait::async_trait, serde_json::json};

    use {super::*, crate::store_memory::MemoryStore};

    /// Appends `execute:<target>` / `undo:<target>` to a shared journal.
    struct Journal {
        entries: Arc<StdMutex<Vec<String>>>,
        fail_undo_of: Option<&'static str>,
    }

    #[async_trait]
    impl Plugin for Journal {
        async fn execute(&self, command: &CommandRecord, _: &ProgressBus) -> anyhow::Result<Value> {
            let target = command.target_str().unwrap_or_default();
            if target == "explode" {
                bail!("execute exploded");
            }
            self.entries.lock().unwrap().push(format!("execute:{target}"));
            Ok(json!(target))
        }

        async fn undo(&self, command: &CommandRecord, _: &ProgressBus) -> anyhow::Result<Value> {
            let target = command.target_str().unwrap_or_default();
            if self.fail_undo_of == Some(target) {
                bail!("undo of {target} failed");
            }
            self.entries.lock().unwrap().push(format!("undo:{target}"));
            Ok(json!(format!("undid {target}")))
        }
    }

    struct Fixture {
        commander: Commander,
        store: Arc<MemoryStore>,
        journal: Arc<StdMutex<Vec<String>>>,
    }

    impl Fixture {
        async fn new() -> Self {
            Self::with(Arc::new(MemoryStore::new()), None).await
        }

        async fn with(store: Arc<MemoryStore>, fail_undo_of: Option<&'static str>) -> Self {
            let journal = Arc::new(StdMutex::new(Vec::new()));
            let plugin: Arc<dyn Plugin> = Arc::new(Journal {
                entries: Arc::clone(&journal),
                fail_undo_of,
            });
            let operations = Operations::from([("journal".to_string(), plugin)]);
            let commander = Commander::open(operations, store.clone(), ProgressBus::new())
                .await
                .unwrap();
            Self {
                commander,
                store,
                journal,
            }
        }

        async fn run(&self, targets: &[&str]) -> Vec<CommandRecord> {
            for target in targets {
                self.commander.execute("journal", json!(target)).await.unwrap();
            }
            self.commander.show_commands().await
        }

        fn journal(&self) -> Vec<String> {
            self.journal.lock().unwrap().clone()
        }

        async fn targets(&self) -> Vec<String> {
            self.commander
                .show_commands()
                .await
                .iter()
                .map(|r| r.target_str().unwrap_or_default().to_string())
                .collect()
        }
    }

    #[tokio::test]
    async fn execute_logs_and_persists() {
        let fx = Fixture::new().await;
        let out = fx.commander.execute("journal", json!("a")).await.unwrap();
        assert_eq!(out, json!("a"));
        let shown = fx.commander.show_commands().await;
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].operation, "journal");
        assert_eq!(fx.store.records(), shown);
    }

    #[tokio::test]
    async fn unknown_operation_fails_without_logging() {
        let fx = Fixture::new().await;
        let err = fx.commander.execute("noop", json!("x")).await.unwrap_err();
        match &err {
            CommandError::ExecutionFailed { command, .. } => {
                assert_eq!(command.operation, "noop");
                assert_eq!(command.target, json!("x"));
            },
            other => panic!("unexpected error: {other}"),
        }
        assert!(fx.commander.show_commands().await.is_empty());
        assert!(fx.store.records().is_empty());
    }

    #[tokio::test]
    async fn failed_execute_stays_in_history() {
        let fx = Fixture::new().await;
        let err = fx.commander.execute("journal", json!("explode")).await.unwrap_err();
        assert_eq!(err.code(), "EXECUTION_FAILED");
        assert_eq!(fx.targets().await, ["explode"]);
        assert_eq!(fx.store.records().len(), 1);
    }

    #[tokio::test]
    async fn undo_most_recent() {
        let fx = Fixture::new().await;
        fx.run(&["a", "b"]).await;
        let results = fx.commander.undo(0, None).await.unwrap();
        assert_eq!(results, [json!("undid b")]);
        assert_eq!(fx.targets().await, ["a"]);
        assert_eq!(fx.store.records(), fx.commander.show_commands().await);
    }

    #[tokio::test]
    async fn undo_by_id_anywhere() {
        let fx = Fixture::new().await;
        let records = fx.run(&["a", "b", "c"]).await;
        fx.commander
            .undo(0, Some(&records[0].id.to_string()))
            .await
            .unwrap();
        assert_eq!(fx.targets().await, ["b", "c"]);
        assert_eq!(fx.journal().last().unwrap(), "undo:a");
    }

    #[tokio::test]
    async fn bulk_undo_is_lifo() {
        let fx = Fixture::new().await;
        fx.run(&["1", "2", "3"]).await;
        let results = fx.commander.undo(2, None).await.unwrap();
        assert_eq!(results, [json!("undid 3"), json!("undid 2")]);
        assert_eq!(fx.journal()[3..], ["undo:3", "undo:2"]);
        assert_eq!(fx.targets().await, ["1"]);
    }

    #[tokio::test]
    async fn bulk_undo_past_the_end_stops_at_empty() {
        let fx = Fixture::new().await;
        fx.run(&["1", "2"]).await;
        let results = fx.commander.undo(5, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(fx.commander.show_commands().await.is_empty());
        assert!(fx.store.records().is_empty());
    }

    #[tokio::test]
    async fn bulk_undo_stops_at_first_failure() {
        let fx = Fixture::with(Arc::new(MemoryStore::new()), Some("2")).await;
        fx.run(&["1", "2", "3"]).await;
        let err = fx.commander.undo(3, None).await.unwrap_err();
        assert_eq!(err.code(), "EXECUTION_FAILED");
        assert_eq!(fx.targets().await, ["1", "2"]);
        assert_eq!(fx.store.records().len(), 2);
    }

    #[tokio::test]
    async fn failed_undo_keeps_the_command() {
        let fx = Fixture::with(Arc::new(MemoryStore::new()), Some("a")).await;
        fx.run(&["a"]).await;
        assert!(fx.commander.undo(0, None).await.is_err());
        assert_eq!(fx.targets().await, ["a"]);
    }

    #[tokio::test]
    async fn empty_log_has_nothing_to_undo() {
        let fx = Fixture::new().await;
        let err = fx.commander.undo(0, None).await.unwrap_err();
        assert!(matches!(err, CommandError::NoCommandsToUndo { .. }));
    }

    #[tokio::test]
    async fn bulk_undo_of_empty_log_is_empty() {
        let fx = Fixture::new().await;
        assert!(fx.commander.undo(3, None).await.unwrap().is_empty());
        assert!(fx.journal().is_empty());
        assert!(fx.store.records().is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let fx = Fixture::new().await;
        fx.run(&["a"]).await;
        let missing = Uuid::new_v4().to_string();
        let err = fx.commander.undo(0, Some(&missing)).await.unwrap_err();
        assert!(matches!(err, CommandError::NotFound { ref command_id, .. } if *command_id == missing));
        let err = fx.commander.delete_command("not-a-uuid").await.unwrap_err();
        assert_eq!(err.code(), "COMMAND_NOT_FOUND");
        assert_eq!(fx.targets().await, ["a"]);
    }

    #[tokio::test]
    async fn delete_forgets_without_undo() {
        let fx = Fixture::new().await;
        let records = fx.run(&["a", "b", "c"]).await;
        let deleted = fx
            .commander
            .delete_command(&records[1].id.to_string())
            .await
            .unwrap();
        assert_eq!(deleted, records[1]);
        assert_eq!(fx.targets().await, ["a", "c"]);
        assert!(fx.journal().iter().all(|e| !e.starts_with("undo")));
        assert_eq!(fx.store.records().len(), 2);
    }

    #[tokio::test]
    async fn clear_empties_both_sides() {
        let fx = Fixture::new().await;
        fx.run(&["a", "b"]).await;
        assert_eq!(fx.commander.clear().await.unwrap(), 2);
        assert!(fx.commander.show_commands().await.is_empty());
        assert!(fx.store.records().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_leaves_memory_untouched() {
        let fx = Fixture::new().await;
        fx.run(&["a"]).await;
        fx.store.set_fail_saves(true);

        let err = fx.commander.execute("journal", json!("b")).await.unwrap_err();
        assert_eq!(err.code(), "STORAGE_FAILED");
        assert_eq!(fx.journal(), ["execute:a"]);

        let err = fx.commander.undo(0, None).await.unwrap_err();
        assert_eq!(err.code(), "STORAGE_FAILED");
        assert!(fx.commander.clear().await.is_err());
        assert_eq!(fx.targets().await, ["a"]);
        assert_eq!(fx.store.records(), fx.commander.show_commands().await);
    }

    #[tokio::test]
    async fn reopen_rebinds_to_current_plugins() {
        let store = Arc::new(MemoryStore::new());
        let first = Fixture::with(store.clone(), None).await;
        let records = first.run(&["a", "b"]).await;

        let second = Fixture::with(store, None).await;
        assert_eq!(second.commander.show_commands().await, records);
        second.commander.undo(0, None).await.unwrap();
        assert_eq!(second.journal(), ["undo:b"]);
        assert!(first.journal().iter().all(|e| e.starts_with("execute")));
    }

    #[tokio::test]
    async fn unregistered_entries_survive_reload() {
        let orphan = CommandRecord::new(json!("old"), "retired");
        let store = Arc::new(MemoryStore::with_records(vec![orphan.clone()]));
        let fx = Fixture::with(store, None).await;
        fx.run(&["new"]).await;

        let shown = fx.commander.show_commands().await;
        assert_eq!(shown[0], orphan);
        assert_eq!(shown.len(), 2);

        let err = fx
            .commander
            .undo(0, Some(&orphan.id.to_string()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'retired' is not registered"));
        assert_eq!(fx.commander.show_commands().await.len(), 2);
    }
}
