//! Reversible commands and the persisted command log.
//!
//! A [`Command`] binds one invocation (target + operation name) to the plugin
//! that implements it. The [`Commander`] owns the ordered log of commands,
//! keeps it in step with a [`CommandStore`], and undoes by recency, by id, or
//! in bulk.

pub mod command;
pub mod commander;
pub mod error;
pub mod store;
pub mod store_file;
pub mod store_memory;

pub use {
    command::Command,
    commander::Commander,
    error::{CommandError, Result},
    store::CommandStore,
    store_file::FileStore,
    store_memory::MemoryStore,
};
