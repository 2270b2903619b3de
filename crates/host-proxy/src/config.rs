//! Proxy plugin configuration.

use host_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Options for one proxy instance: either a subprocess to spawn (stdio
/// child) or an SSE URL to dial. Exactly one of `command` / `url` must be
/// present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Command for a stdio child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments for the stdio child.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Extra environment merged over the parent environment.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    /// SSE endpoint of an already-running server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Connect during plugin init (failures are captured, not fatal).
    #[serde(default)]
    pub auto_connect: bool,
}

impl ProxyConfig {
    /// Parses and validates the proxy options from the plugin config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a malformed shape or when not exactly
    /// one of `command` / `url` is given.
    pub fn from_value(value: &Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value.clone()).map_err(|e| Error::Config {
            message: format!("invalid proxy config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the command/url exclusivity rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the rule is violated.
    pub fn validate(&self) -> Result<()> {
        match (&self.command, &self.url) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err(Error::Config {
                message: "proxy config must set either 'command' or 'url', not both".to_string(),
            }),
            (None, None) => Err(Error::Config {
                message: "proxy config must set 'command' or 'url'".to_string(),
            }),
        }
    }

    /// Short description of the configured transport for status output.
    #[must_use]
    pub fn transport_label(&self) -> String {
        match (&self.command, &self.url) {
            (Some(command), _) => format!("stdio: {command}"),
            (_, Some(url)) => format!("sse: {url}"),
            _ => "unconfigured".to_string(),
        }
    }
}
