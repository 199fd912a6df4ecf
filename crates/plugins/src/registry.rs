//! Directory scan that turns plugin sources into the operation table.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use {
    pjman_common::ErrorReport,
    pjman_config::{Layout, PjmanConfig},
    pjman_sandbox::{CapabilitySet, SandboxExecutor, SandboxOptions},
    tracing::{debug, info},
};

use crate::{
    error::{PluginError, Result},
    plugin::{Operations, Plugin},
    script::ScriptPlugin,
};

type Filter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

fn default_filter(file_name: &str) -> bool {
    file_name.ends_with(".js")
}

/// Registry key for a source file: the name minus its trailing extension.
fn plugin_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map_or_else(|| file_name.to_string(), |stem| stem.to_string_lossy().into_owned())
}

/// Loads plugin sources from one directory and keeps the resulting table.
pub struct PluginRegistry {
    directory: PathBuf,
    executor: SandboxExecutor,
    filter: Filter,
    plugins: RwLock<HashMap<String, Arc<dyn Plugin>>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("directory", &self.directory)
            .field("plugins", &self.names())
            .finish_non_exhaustive()
    }
}

impl PluginRegistry {
    pub fn new(directory: impl Into<PathBuf>, executor: SandboxExecutor) -> Self {
        Self {
            directory: directory.into(),
            executor,
            filter: Arc::new(default_filter),
            plugins: RwLock::new(HashMap::new()),
        }
    }

    /// Registry over `layout`'s plugin directory with the sandbox configured
    /// from `config`.
    pub fn from_config(config: &PjmanConfig, layout: &Layout) -> Result<Self> {
        let capabilities = CapabilitySet::from_flags(&config.sandbox)
            .map_err(|e| PluginError::load_failed("configuring sandbox", e))?;
        let options = SandboxOptions {
            timeout: config.options.timeout(),
            display_errors: config.options.display_errors,
        };
        Ok(Self::new(
            layout.plugins_dir(),
            SandboxExecutor::new(capabilities, options),
        ))
    }

    /// Replace the file-name predicate deciding which entries are sources.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Scan the directory and merge every valid source into the table.
    ///
    /// The scan is all-or-nothing: the first failing file aborts it and the
    /// table keeps exactly what it held before. Entries of the same name are
    /// replaced; others are kept unless [`clear`](Self::clear) ran first.
    pub async fn load_plugins(&self) -> Result<Operations> {
        let staged = self.scan().await?;
        let count = staged.len();
        let mut plugins = self.plugins.write().unwrap_or_else(|e| e.into_inner());
        plugins.extend(staged);
        info!(
            directory = %self.directory.display(),
            loaded = count,
            total = plugins.len(),
            "plugins loaded"
        );
        Ok(plugins.clone())
    }

    async fn scan(&self) -> Result<Vec<(String, Arc<dyn Plugin>)>> {
        let mut entries = tokio::fs::read_dir(&self.directory).await.map_err(|e| {
            PluginError::load_failed(format!("reading {}", self.directory.display()), e)
        })?;

        let mut files = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|e| {
                PluginError::load_failed(format!("reading {}", self.directory.display()), e)
            })?;
            let Some(entry) = entry else { break };
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if (self.filter)(&file_name) {
                files.push((file_name, entry.path()));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut staged: Vec<(String, Arc<dyn Plugin>)> = Vec::with_capacity(files.len());
        for (file_name, path) in files {
            let plugin = self.load_file(&path).await?;
            let name = plugin_name(&file_name);
            debug!(plugin = %name, path = %path.display(), "plugin source accepted");
            staged.push((name, Arc::new(plugin)));
        }
        Ok(staged)
    }

    async fn load_file(&self, path: &Path) -> Result<ScriptPlugin> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PluginError::load_failed(format!("reading {}", path.display()), e))?;
        let script = self
            .executor
            .load(&source)
            .await
            .map_err(|e| PluginError::load_failed(format!("evaluating {}", path.display()), e))?;
        ScriptPlugin::new(path, script).ok_or_else(|| PluginError::invalid_structure(path))
    }

    /// Look up a plugin. A miss is logged, never raised.
    pub fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        let found = self
            .plugins
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned();
        if found.is_none() {
            PluginError::not_found(name).log();
        }
        found
    }

    /// Install a plugin under `name`, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, plugin: Arc<dyn Plugin>) {
        self.plugins
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), plugin);
    }

    pub fn clear(&self) {
        self.plugins
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Snapshot of the current table.
    pub fn operations(&self) -> Operations {
        self.plugins
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .plugins
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
