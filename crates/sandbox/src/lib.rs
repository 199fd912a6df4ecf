//! Sandboxed evaluation of plugin scripts.
//!
//! Every [`SandboxExecutor::load`] evaluates the source in a fresh QuickJS
//! runtime whose globals are the language built-ins plus the configured
//! [`CapabilitySet`]. The evaluated value stays alive on a dedicated worker
//! thread; the host reaches it through [`Script::call`].

pub mod capabilities;
mod convert;
pub mod error;
pub mod executor;
mod host;
mod worker;

pub use {
    capabilities::{Capability, CapabilitySet, HostModule},
    error::{Result, SandboxError},
    executor::{SandboxExecutor, SandboxOptions, Script},
};
