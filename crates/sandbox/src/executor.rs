use std::{sync::Arc, time::Duration};

use {
    pjman_progress::ProgressBus,
    tokio::sync::{mpsc, oneshot},
    tracing::debug,
};

use crate::{
    capabilities::CapabilitySet,
    error::{Result, SandboxError},
    worker::{self, Call, Exports},
};

/// Evaluation limits shared by every script an executor loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxOptions {
    /// Wall-clock limit on evaluating the source. `None` disables it.
    pub timeout: Option<Duration>,
    /// Append the script stack to load and call errors.
    pub display_errors: bool,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_millis(5000)),
            display_errors: true,
        }
    }
}

/// Turns source text into [`Script`]s. Frozen at construction.
#[derive(Debug, Clone, Default)]
pub struct SandboxExecutor {
    capabilities: Arc<CapabilitySet>,
    options: SandboxOptions,
}

impl SandboxExecutor {
    pub fn new(capabilities: CapabilitySet, options: SandboxOptions) -> Self {
        Self {
            capabilities: Arc::new(capabilities),
            options,
        }
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn options(&self) -> &SandboxOptions {
        &self.options
    }

    /// Evaluate `source` in a fresh runtime.
    pub async fn load(&self, source: &str) -> Result<Script> {
        let (ready, calls) = worker::spawn(
            source.to_string(),
            CapabilitySet::clone(&self.capabilities),
            self.options.clone(),
        )?;
        let exports = ready.await.map_err(|_| SandboxError::WorkerGone)??;
        debug!(callable = ?exports.callable, "script loaded");
        Ok(Script {
            exports: Arc::new(exports),
            calls,
        })
    }
}

/// An evaluated script, alive for as long as any clone of it is.
#[derive(Debug, Clone)]
pub struct Script {
    exports: Arc<Exports>,
    calls: mpsc::UnboundedSender<Call>,
}

impl Script {
    /// Whether the evaluated value has a function-valued property `name`.
    pub fn is_callable(&self, name: &str) -> bool {
        self.exports.callable.contains(name)
    }

    pub fn callable(&self) -> impl Iterator<Item = &str> {
        self.exports.callable.iter().map(String::as_str)
    }

    /// Invoke `export(command, progress)`. A returned promise is awaited.
    pub async fn call(
        &self,
        export: &str,
        command: serde_json::Value,
        progress: ProgressBus,
    ) -> Result<serde_json::Value> {
        let (reply, outcome) = oneshot::channel();
        self.calls
            .send(Call {
                export: export.to_string(),
                command,
                progress,
                reply,
            })
            .map_err(|_| SandboxError::WorkerGone)?;
        outcome.await.map_err(|_| SandboxError::WorkerGone)?
    }
}
