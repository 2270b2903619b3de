//! Normalized host configuration.
//!
//! The runtime consumes one configuration shape, read from
//! `<home>/.mcp-cli/config.json`:
//!
//! ```json
//! {
//!   "mcp": { "port": 3000 },
//!   "plugins": {
//!     "fs": {
//!       "package": "proxy",
//!       "config": { "command": "mcp-server-fs" },
//!       "disabledTools": ["danger"]
//!     }
//!   }
//! }
//! ```
//!
//! Plugin registration names come from the `plugins` map keys, which allows
//! the same package (notably the proxy) to be loaded several times under
//! different names. The historical list-of-strings plugin form is rejected
//! with a clear error rather than silently coerced.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory under the user's home that holds config and persisted state.
pub const STATE_DIR_NAME: &str = ".mcp-cli";

/// Default port for the HTTP/SSE transport.
pub const DEFAULT_PORT: u16 = 3000;

/// Top-level host configuration.
///
/// # Examples
///
/// ```
/// use host_core::HostConfig;
///
/// let config = HostConfig::from_json(r#"{"mcp":{"port":8080},"plugins":{}}"#).unwrap();
/// assert_eq!(config.mcp.port, 8080);
///
/// let default = HostConfig::default();
/// assert_eq!(default.mcp.port, 3000);
/// assert!(default.plugins.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// MCP transport settings.
    #[serde(default)]
    pub mcp: McpSettings,

    /// Plugins to load, keyed by registration name.
    ///
    /// A `BTreeMap` keeps load order deterministic across runs.
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginEntry>,
}

/// MCP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpSettings {
    /// Port for the HTTP/SSE transport.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Configuration for one plugin instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginEntry {
    /// Module specifier resolved against the plugin module registry.
    pub package: String,

    /// Plugin-specific options, passed through opaquely.
    #[serde(default)]
    pub config: Value,

    /// Local tool names masked at load time.
    #[serde(default)]
    pub disabled_tools: Vec<String>,
}

impl PluginEntry {
    /// Creates an entry with no options and no masked tools.
    #[must_use]
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            config: Value::Null,
            disabled_tools: Vec::new(),
        }
    }
}

impl HostConfig {
    /// Parses configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed JSON or when the legacy
    /// list-of-strings plugin form is detected.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| Error::Config {
            message: format!("invalid config JSON: {e}"),
        })?;

        if let Some(plugins) = value.get("plugins")
            && plugins.is_array()
        {
            return Err(Error::Config {
                message: "legacy plugin list is not supported; use the \
                          {\"<name>\": {\"package\": ...}} dictionary form"
                    .to_string(),
            });
        }

        serde_json::from_value(value).map_err(|e| Error::Config {
            message: format!("invalid config shape: {e}"),
        })
    }

    /// Loads configuration from a file, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file exists but cannot be read, or
    /// [`Error::Config`] when its contents are invalid.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path).map_err(|e| Error::Io {
            context: format!("reading {}", path.display()),
            source: e,
        })?;

        Self::from_json(&json)
    }

    /// Serializes the configuration to pretty-printed JSON.
    #[must_use]
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Default config file path: `<home>/.mcp-cli/config.json`.
    ///
    /// Falls back to the current directory when no home directory can be
    /// determined.
    #[must_use]
    pub fn default_path() -> PathBuf {
        state_dir().join("config.json")
    }

    /// A small example configuration used by tests and documentation.
    #[must_use]
    pub fn example() -> Self {
        let mut plugins = BTreeMap::new();
        plugins.insert(
            "fs".to_string(),
            PluginEntry {
                package: "proxy".to_string(),
                config: serde_json::json!({"command": "mcp-server-fs", "autoConnect": true}),
                disabled_tools: vec!["danger".to_string()],
            },
        );

        Self {
            mcp: McpSettings { port: DEFAULT_PORT },
            plugins,
        }
    }
}

/// Per-user state directory: `<home>/.mcp-cli`.
#[must_use]
pub fn state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STATE_DIR_NAME)
}

/// Directory that holds the call journal and `stats.json`.
#[must_use]
pub fn logs_dir() -> PathBuf {
    state_dir().join("logs")
}
