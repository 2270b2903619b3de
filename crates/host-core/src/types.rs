//! Strong domain types for the MCP host.
//!
//! Newtypes over `String` keep plugin names, tool names, and client
//! identifiers from being mixed up at call sites, and give the
//! fully-qualified tool name a single construction point.
//!
//! # Examples
//!
//! ```
//! use host_core::{ClientId, PluginName, ToolName};
//!
//! let plugin = PluginName::new("fs");
//! let tool = ToolName::new("read_file");
//! assert_eq!(plugin.qualify(&tool), "fs_read_file");
//!
//! let client = ClientId::cli();
//! assert_eq!(client.as_str(), "cli");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Registered plugin name (newtype over String).
///
/// This is the config key a plugin was loaded under, not the manifest
/// name; it prefixes every fully-qualified tool name the plugin exposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginName(String);

impl PluginName {
    /// Creates a new plugin name.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the name and returns the inner `String`.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Builds the fully-qualified tool name `<plugin>_<tool>`.
    ///
    /// This is the only name MCP clients ever see.
    ///
    /// # Examples
    ///
    /// ```
    /// use host_core::{PluginName, ToolName};
    ///
    /// let name = PluginName::new("demo").qualify(&ToolName::new("echo"));
    /// assert_eq!(name, "demo_echo");
    /// ```
    #[must_use]
    pub fn qualify(&self, tool: &ToolName) -> String {
        format!("{}_{}", self.0, tool.as_str())
    }

    /// Splits a fully-qualified tool name back into `(plugin, local)`.
    ///
    /// Plugin names may themselves contain underscores, so the name is
    /// resolved against the given registered names rather than split at
    /// the first underscore; when several registered names prefix the
    /// qualified name, the longest match wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use host_core::{PluginName, ToolName};
    ///
    /// let plugins = [PluginName::new("fs"), PluginName::new("nasa_api")];
    /// let (plugin, tool) =
    ///     PluginName::split_qualified("nasa_api_apod", &plugins).unwrap();
    /// assert_eq!(plugin.as_str(), "nasa_api");
    /// assert_eq!(tool.as_str(), "apod");
    /// ```
    #[must_use]
    pub fn split_qualified(
        qualified: &str,
        plugins: &[PluginName],
    ) -> Option<(PluginName, ToolName)> {
        plugins
            .iter()
            .filter_map(|plugin| {
                let rest = qualified.strip_prefix(plugin.as_str())?;
                let local = rest.strip_prefix('_')?;
                if local.is_empty() {
                    return None;
                }
                Some((plugin.clone(), ToolName::new(local)))
            })
            .max_by_key(|(plugin, _)| plugin.as_str().len())
    }
}

impl fmt::Display for PluginName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PluginName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PluginName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Local (unqualified) tool name (newtype over String).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolName(String);

impl ToolName {
    /// Creates a new tool name.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the name and returns the inner `String`.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ToolName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ToolName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the caller on whose behalf a tool call runs.
///
/// `cli` for the local shell, `stdio` for the process-stdio transport, and
/// a synthesized per-session id for SSE clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Creates a client id from an arbitrary string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The local interactive shell.
    #[must_use]
    pub fn cli() -> Self {
        Self("cli".to_string())
    }

    /// The process-stdio MCP transport (exactly one session).
    #[must_use]
    pub fn stdio() -> Self {
        Self("stdio".to_string())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
