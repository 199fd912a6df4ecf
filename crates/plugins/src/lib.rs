//! Plugins: the operations a command can run and reverse.
//!
//! Script plugins are `.js` files under `.pjman/plugins`, evaluated in the
//! sandbox and validated to expose `execute` and `undo`. Native plugins
//! (the built-in `backup`) implement [`Plugin`] directly.

pub mod backup;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod script;

pub use {
    backup::{BACKUP_OPERATION, BackupPlugin, builtin_operations},
    error::{PluginError, Result},
    plugin::{Operations, Plugin},
    registry::PluginRegistry,
    script::ScriptPlugin,
};
