//! What a script can see besides the language built-ins.

use std::collections::BTreeMap;

use rquickjs::Ctx;

use crate::{
    convert::json_to_js,
    error::{Result, SandboxError},
    host,
};

/// Host modules a configuration can switch on by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostModule {
    /// `log`/`info`/`warn`/`error`/`debug`, routed to `tracing`.
    Console,
    /// Synchronous file access.
    Fs,
    /// Path string helpers.
    Path,
    /// `cwd()` and an `env` snapshot.
    Process,
}

impl HostModule {
    pub const ALL: [Self; 4] = [Self::Console, Self::Fs, Self::Path, Self::Process];

    pub fn name(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Fs => "fs",
            Self::Path => "path",
            Self::Process => "process",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Names of every catalog module, for validation hints.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|m| m.name()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Capability {
    /// A constant injected as a global.
    Value(serde_json::Value),
    Host(HostModule),
}

/// Named globals injected into every script an executor loads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilitySet {
    entries: BTreeMap<String, Capability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a `name -> enabled` table onto the host catalog.
    ///
    /// Disabled names are skipped whether or not they are known; an enabled
    /// name outside the catalog is an error.
    pub fn from_flags(flags: &BTreeMap<String, bool>) -> Result<Self> {
        let mut set = Self::new();
        for (name, _) in flags.iter().filter(|(_, enabled)| **enabled) {
            let module =
                HostModule::from_name(name).ok_or_else(|| SandboxError::unknown_capability(name))?;
            set.insert_host(module);
        }
        Ok(set)
    }

    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.entries.insert(name.into(), Capability::Value(value));
        self
    }

    #[must_use]
    pub fn with_host(mut self, module: HostModule) -> Self {
        self.insert_host(module);
        self
    }

    pub fn insert_host(&mut self, module: HostModule) {
        self.entries
            .insert(module.name().to_string(), Capability::Host(module));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn install(&self, ctx: &Ctx<'_>) -> rquickjs::Result<()> {
        let globals = ctx.globals();
        for (name, capability) in &self.entries {
            match capability {
                Capability::Value(value) => globals.set(name.as_str(), json_to_js(ctx, value)?)?,
                Capability::Host(module) => {
                    globals.set(name.as_str(), host::module_object(ctx, *module)?)?
                },
            }
        }
        Ok(())
    }
}
