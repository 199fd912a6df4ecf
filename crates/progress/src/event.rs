use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of the three per-plugin events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginProgress {
    pub plugin: String,
    pub message: String,
    pub percentage: i64,
}

/// Everything the bus can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ProgressEvent {
    #[serde(rename = "plugin:start")]
    PluginStart(PluginProgress),
    #[serde(rename = "plugin:progress")]
    PluginProgress(PluginProgress),
    #[serde(rename = "plugin:complete")]
    PluginComplete(PluginProgress),
    /// Whole-operation result, independent of the percentage stream.
    #[serde(rename = "completed")]
    Completed(Value),
    #[serde(rename = "error")]
    Error(Value),
}

impl ProgressEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PluginStart(_) => "plugin:start",
            Self::PluginProgress(_) => "plugin:progress",
            Self::PluginComplete(_) => "plugin:complete",
            Self::Completed(_) => "completed",
            Self::Error(_) => "error",
        }
    }

    /// The per-plugin payload, for the three percentage events.
    pub fn plugin_progress(&self) -> Option<&PluginProgress> {
        match self {
            Self::PluginStart(p) | Self::PluginProgress(p) | Self::PluginComplete(p) => Some(p),
            Self::Completed(_) | Self::Error(_) => None,
        }
    }
}

/// Receives bus events synchronously, on the publishing task.
pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

impl<F> ProgressListener for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}
