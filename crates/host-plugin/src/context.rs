//! Per-instance context handed to plugins at init.

use crate::events::PluginEvent;
use host_core::PluginName;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capabilities the runtime lends to one plugin instance.
///
/// The context is the plugin's only channel back into the host: state
/// change notifications re-emit upstream (triggering transport
/// notifications), and logging goes to the diagnostic side channel so the
/// MCP stdio stream is never contaminated.
#[derive(Debug, Clone)]
pub struct PluginContext {
    name: PluginName,
    config: Arc<Value>,
    events: broadcast::Sender<PluginEvent>,
}

impl PluginContext {
    pub(crate) fn new(
        name: PluginName,
        config: Value,
        events: broadcast::Sender<PluginEvent>,
    ) -> Self {
        Self {
            name,
            config: Arc::new(config),
            events,
        }
    }

    /// The name this instance was registered under.
    #[must_use]
    pub const fn plugin_name(&self) -> &PluginName {
        &self.name
    }

    /// Immutable view of the per-plugin options from the config file.
    #[must_use]
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Signals that the plugin's observable surface changed (tools
    /// appeared or disappeared, connection state flipped).
    ///
    /// Live MCP sessions react with a `tools/list_changed` notification.
    pub fn notify_state_change(&self) {
        let _ = self.events.send(PluginEvent::StateChange(self.name.clone()));
    }

    /// Writes a prefixed diagnostic line.
    ///
    /// Goes through `tracing` (stderr), never the protocol stream.
    pub fn log(&self, message: &str) {
        tracing::info!("[{}] {}", self.name, message);
    }
}
