//! Fan bus events out to async consumers.
//!
//! [`BroadcastListener`] bridges the synchronous bus onto a
//! `tokio::sync::broadcast` channel so a task (a websocket relay, a test) can
//! `recv().await` events instead of registering a callback.

use tokio::sync::broadcast;

use crate::event::{ProgressEvent, ProgressListener};

const DEFAULT_CAPACITY: usize = 256;

pub struct BroadcastListener {
    tx: broadcast::Sender<ProgressEvent>,
}

impl Default for BroadcastListener {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastListener {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// A receiver for events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }
}

impl ProgressListener for BroadcastListener {
    fn on_event(&self, event: &ProgressEvent) {
        // No receivers is fine; lagging receivers see `Lagged` on their end.
        let _ = self.tx.send(event.clone());
    }
}
