//! Wiring: config, plugins, bus and commander for one CLI invocation.

use std::sync::Arc;

use {
    anyhow::{Context, Result, bail},
    pjman_commands::{Commander, FileStore},
    pjman_config::{Layout, PjmanConfig, Severity},
    pjman_plugins::{PluginRegistry, builtin_operations},
    pjman_progress::ProgressBus,
    pjman_sandbox::HostModule,
    tracing::{error, info, warn},
};

use crate::render::ConsoleRenderer;

/// Load and validate the config under `layout`. Errors abort; warnings log.
pub fn load_config(layout: &Layout) -> Result<PjmanConfig> {
    let path = layout.find_config_file();
    let config = pjman_config::load_config(&path)
        .with_context(|| format!("run `pjman init` to create {}", layout.root().display()))?;

    let mut result = pjman_config::validate(&config, &HostModule::names());
    if let Ok(raw) = pjman_config::load_raw(&path) {
        result
            .diagnostics
            .extend(pjman_config::check_unknown_fields(&raw).diagnostics);
    }
    for diagnostic in &result.diagnostics {
        match diagnostic.severity {
            Severity::Error => error!(%diagnostic, "config"),
            _ => warn!(%diagnostic, "config"),
        }
    }
    if result.has_errors() {
        bail!(
            "{} has {} error(s)",
            path.display(),
            result.count(Severity::Error)
        );
    }
    Ok(config)
}

/// Everything a log-touching subcommand needs.
pub struct App {
    pub registry: PluginRegistry,
    pub commander: Commander,
}

impl App {
    pub async fn open(layout: &Layout) -> Result<Self> {
        let config = load_config(layout)?;

        let registry = PluginRegistry::from_config(&config, layout)?;
        registry.load_plugins().await?;
        for (name, plugin) in builtin_operations(layout) {
            registry.register(name, plugin);
        }

        let progress = ProgressBus::new();
        progress.subscribe(Arc::new(ConsoleRenderer));

        let store = Arc::new(FileStore::new(layout.commands_file()));
        let commander = Commander::open(registry.operations(), store, progress).await?;
        info!(root = %layout.root().display(), plugins = registry.names().len(), "pjman ready");

        Ok(Self {
            registry,
            commander,
        })
    }
}
