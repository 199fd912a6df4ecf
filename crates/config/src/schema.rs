//! Config schema types (sandbox capabilities, sandbox options, ports).
use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

/// Default evaluation time limit for plugin sources, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Root configuration, stored at `.pjman/config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PjmanConfig {
    /// Host capabilities injected into the plugin scope, by name.
    pub sandbox: BTreeMap<String, bool>,
    pub options: SandboxOptionsConfig,
    pub ports: PortsConfig,
    /// Packages tracked by the dependency analysis plugin.
    pub dependencies: Vec<String>,
}

impl Default for PjmanConfig {
    fn default() -> Self {
        Self {
            sandbox: BTreeMap::from([("console".to_string(), true)]),
            options: SandboxOptionsConfig::default(),
            ports: PortsConfig::default(),
            dependencies: Vec::new(),
        }
    }
}

impl PjmanConfig {
    /// Names of the capabilities switched on, in name order.
    pub fn enabled_capabilities(&self) -> impl Iterator<Item = &str> {
        self.sandbox
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.as_str())
    }
}

/// Options handed to the sandbox executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SandboxOptionsConfig {
    /// Evaluation time limit in milliseconds. `null` disables the limit.
    pub timeout: Option<u64>,
    /// Whether sandbox errors include the script stack.
    pub display_errors: bool,
}

impl Default for SandboxOptionsConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT_MS),
            display_errors: true,
        }
    }
}

impl SandboxOptionsConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_millis)
    }
}

/// Ports used by the static server and WebSocket transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    #[serde(rename = "static")]
    pub static_files: u16,
    pub ws: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            static_files: 4000,
            ws: 4001,
        }
    }
}
