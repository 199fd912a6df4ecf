//! Configuration loading, validation, and the on-disk `.pjman` layout.
//!
//! Config file: `.pjman/config.json` (or `.toml` / `.yaml` by extension).
//! Layout root: `<base>/.pjman`, where base is the current directory or
//! `$PJMAN_DIR`.

pub mod error;
pub mod layout;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    layout::Layout,
    loader::{load_config, load_raw, parse_config, save_config},
    schema::{PjmanConfig, PortsConfig, SandboxOptionsConfig},
    validate::{Diagnostic, Severity, ValidationResult, check_unknown_fields, validate},
};
