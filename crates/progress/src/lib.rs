//! Progress bus: per-plugin progress tracking fanned out to subscribers.
//!
//! The bus is a cheap cloneable handle. Construct one at startup and pass it
//! to everything that publishes or subscribes.

pub mod broadcast;
pub mod bus;
pub mod event;

pub use {
    broadcast::BroadcastListener,
    bus::{DEFAULT_MESSAGE, DEFAULT_PLUGIN, DEFAULT_TOTAL, ProgressBus, ProgressState, SubscriptionId},
    event::{PluginProgress, ProgressEvent, ProgressListener},
};
