use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use {serde_json::Value, tracing::trace};

use crate::event::{PluginProgress, ProgressEvent, ProgressListener};

/// Plugin name used when a publisher does not give one.
pub const DEFAULT_PLUGIN: &str = "default";
/// Message of a freshly started plugin.
pub const DEFAULT_MESSAGE: &str = "Getting started with the plugin";
pub const DEFAULT_TOTAL: i64 = 100;

/// Progress of one plugin name.
///
/// States are keyed by plugin name, not by invocation: two concurrent runs of
/// the same plugin share one counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    pub current: i64,
    pub total: i64,
    pub message: String,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            current: 0,
            total: DEFAULT_TOTAL,
            message: DEFAULT_MESSAGE.to_string(),
        }
    }
}

impl ProgressState {
    /// `round(current / total * 100)`.
    pub fn percentage(&self) -> i64 {
        if self.total == 0 {
            return 0;
        }
        ((self.current as f64 / self.total as f64) * 100.0).round() as i64
    }
}

/// Handle returned by [`ProgressBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = (SubscriptionId, Arc<dyn ProgressListener>);

#[derive(Default)]
struct Inner {
    states: Mutex<HashMap<String, ProgressState>>,
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

/// Publish/subscribe channel for plugin progress.
///
/// Delivery is synchronous and in subscription order. Nothing is buffered: a
/// subscriber attached after an event fired never sees it.
#[derive(Clone, Default)]
pub struct ProgressBus {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ProgressBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressBus")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn ProgressListener>) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        id
    }

    /// Detach a subscriber. Returns `false` if it was not attached.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Snapshot of a plugin's progress, if it was ever started.
    pub fn state(&self, plugin: &str) -> Option<ProgressState> {
        self.inner
            .states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(plugin)
            .cloned()
    }

    /// Create the plugin's state if absent, then emit `plugin:start`.
    pub fn start(&self, plugin: &str) {
        let payload = {
            let mut states = self.inner.states.lock().unwrap_or_else(|e| e.into_inner());
            let state = states.entry(plugin.to_string()).or_default();
            PluginProgress {
                plugin: plugin.to_string(),
                message: state.message.clone(),
                percentage: state.percentage(),
            }
        };
        self.emit(ProgressEvent::PluginStart(payload));
    }

    /// Advance a started plugin by `delta`.
    ///
    /// No-op for a plugin that was never started. Emits `plugin:progress`, and
    /// additionally `plugin:complete` when `current` lands exactly on `total`.
    pub fn increment(&self, message: &str, delta: i64, plugin: &str) {
        let (progress, complete) = {
            let mut states = self.inner.states.lock().unwrap_or_else(|e| e.into_inner());
            let Some(state) = states.get_mut(plugin) else {
                trace!(plugin, "increment for unstarted plugin ignored");
                return;
            };
            state.message = message.to_string();
            state.current = state.current.saturating_add(delta);
            let percentage = state.percentage();
            let progress = PluginProgress {
                plugin: plugin.to_string(),
                message: state.message.clone(),
                percentage,
            };
            let complete = (state.current == state.total).then(|| PluginProgress {
                plugin: plugin.to_string(),
                message: format!("Completed {plugin}"),
                percentage,
            });
            (progress, complete)
        };

        self.emit(ProgressEvent::PluginProgress(progress));
        if let Some(complete) = complete {
            self.emit(ProgressEvent::PluginComplete(complete));
        }
    }

    /// Emit the whole-operation result.
    pub fn complete(&self, result: Value) {
        self.emit(ProgressEvent::Completed(result));
    }

    /// Emit a whole-operation failure.
    pub fn error(&self, error: Value) {
        self.emit(ProgressEvent::Error(error));
    }

    fn emit(&self, event: ProgressEvent) {
        // Listeners run outside the lock so they may subscribe or publish.
        let subscribers: Vec<Arc<dyn ProgressListener>> = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        trace!(event = event.name(), subscribers = subscribers.len(), "progress event");
        for listener in subscribers {
            listener.on_event(&event);
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    /// Records every event it sees.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressListener for Recorder {
        fn on_event(&self, event: &ProgressEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<ProgressEvent> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    fn recorded_bus() -> (ProgressBus, Arc<Recorder>) {
        let bus = ProgressBus::new();
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(recorder.clone());
        (bus, recorder)
    }

    #[test]
    fn start_creates_state_and_emits() {
        let (bus, recorder) = recorded_bus();
        bus.start("analyze");
        assert_eq!(bus.state("analyze"), Some(ProgressState::default()));
        assert_eq!(
            recorder.take(),
            [ProgressEvent::PluginStart(PluginProgress {
                plugin: "analyze".into(),
                message: DEFAULT_MESSAGE.into(),
                percentage: 0,
            })]
        );
    }

    #[test]
    fn two_halves_complete_the_plugin() {
        let (bus, recorder) = recorded_bus();
        bus.start("analyze");
        bus.increment("step1", 50, "analyze");
        bus.increment("step2", 50, "analyze");

        let events = recorder.take();
        let names: Vec<_> = events.iter().map(ProgressEvent::name).collect();
        assert_eq!(
            names,
            ["plugin:start", "plugin:progress", "plugin:progress", "plugin:complete"]
        );
        assert_eq!(events[1].plugin_progress().unwrap().percentage, 50);
        assert_eq!(events[2].plugin_progress().unwrap().percentage, 100);
        assert_eq!(events[3].plugin_progress().unwrap().message, "Completed analyze");
    }

    #[test]
    fn overshooting_total_never_completes() {
        let (bus, recorder) = recorded_bus();
        bus.start("p");
        bus.increment("a", 60, "p");
        bus.increment("b", 60, "p");
        let events = recorder.take();
        assert!(events.iter().all(|e| e.name() != "plugin:complete"));
        assert_eq!(events.last().unwrap().plugin_progress().unwrap().percentage, 120);
    }

    #[test]
    fn huge_deltas_saturate() {
        let (bus, recorder) = recorded_bus();
        bus.start("p");
        bus.increment("a", i64::MAX, "p");
        bus.increment("b", 1, "p");
        bus.increment("c", i64::MIN, "p");
        assert_eq!(bus.state("p").unwrap().current, -1);
        assert_eq!(recorder.take().len(), 4);
    }

    #[test]
    fn increment_without_start_is_silent() {
        let (bus, recorder) = recorded_bus();
        bus.increment("nothing", 10, "ghost");
        assert!(recorder.take().is_empty());
        assert!(bus.state("ghost").is_none());
    }

    #[test]
    fn plugin_states_are_independent() {
        let bus = ProgressBus::new();
        bus.start("a");
        bus.start("b");
        bus.increment("a-step", 30, "a");
        assert_eq!(bus.state("a").unwrap().current, 30);
        assert_eq!(bus.state("b").unwrap().current, 0);
        assert_eq!(bus.state("b").unwrap().message, DEFAULT_MESSAGE);
    }

    #[test]
    fn restart_keeps_accumulated_state() {
        let bus = ProgressBus::new();
        bus.start("p");
        bus.increment("half", 50, "p");
        bus.start("p");
        assert_eq!(bus.state("p").unwrap().current, 50);
    }

    #[test]
    fn percentage_rounds_half_up() {
        let state = ProgressState {
            current: 1,
            total: 8,
            message: String::new(),
        };
        assert_eq!(state.percentage(), 13);
    }

    #[test]
    fn delivery_follows_subscription_order() {
        let bus = ProgressBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["console", "remote"] {
            let order = Arc::clone(&order);
            bus.subscribe(Arc::new(move |_: &ProgressEvent| {
                order.lock().unwrap().push(tag);
            }));
        }
        bus.complete(Value::Null);
        assert_eq!(*order.lock().unwrap(), ["console", "remote"]);
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let bus = ProgressBus::new();
        bus.error(serde_json::json!({"message": "boom"}));
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(recorder.clone());
        assert!(recorder.take().is_empty());
        bus.complete(serde_json::json!(1));
        assert_eq!(recorder.take(), [ProgressEvent::Completed(serde_json::json!(1))]);
    }

    #[test]
    fn unsubscribe_detaches() {
        let (bus, recorder) = recorded_bus();
        let extra = bus.subscribe(Arc::new(|_: &ProgressEvent| {}));
        assert_eq!(bus.subscriber_count(), 2);
        assert!(bus.unsubscribe(extra));
        assert!(!bus.unsubscribe(extra));
        bus.start("x");
        assert_eq!(recorder.take().len(), 1);
    }
}
