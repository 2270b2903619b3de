//! Plugin lifecycle events.
//!
//! The manager publishes these over a `tokio::sync::broadcast` channel so
//! transports can push `tools/list_changed` notifications without the
//! manager knowing anything about them.

use host_core::PluginName;

/// A lifecycle transition observed by the plugin manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    /// A plugin finished loading.
    Loaded(PluginName),
    /// A plugin was destroyed and removed.
    Unloaded(PluginName),
    /// A disabled plugin became enabled.
    Enabled(PluginName),
    /// An enabled plugin became disabled.
    Disabled(PluginName),
    /// Something else about the plugin's observable surface changed
    /// (tool mask, proxy connection state, …).
    StateChange(PluginName),
}

impl PluginEvent {
    /// The plugin this event concerns.
    #[must_use]
    pub const fn plugin(&self) -> &PluginName {
        match self {
            Self::Loaded(name)
            | Self::Unloaded(name)
            | Self::Enabled(name)
            | Self::Disabled(name)
            | Self::StateChange(name) => name,
        }
    }

    /// Whether the visible tool set may have changed.
    ///
    /// Every current variant qualifies; the method exists so transports
    /// branch on intent rather than listing variants.
    #[must_use]
    pub const fn affects_tool_list(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_plugin_accessor() {
        let event = PluginEvent::Enabled(PluginName::new("demo"));
        assert_eq!(event.plugin().as_str(), "demo");
    }
}
