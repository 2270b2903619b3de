//! Plugin manifest, status signal, and structured help.

use serde::{Deserialize, Serialize};

/// Identity metadata a plugin module declares about itself.
///
/// Note the manifest name is informational; the name a plugin is addressed
/// by is the config key it was registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Package-level name.
    pub name: String,
    /// Semver version string.
    pub version: String,
    /// Human-readable description.
    pub description: String,
}

impl PluginManifest {
    /// Creates a manifest.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

/// Traffic-light indicator rendered next to a plugin's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusIndicator {
    /// Healthy / connected.
    Green,
    /// Degraded or pending.
    Yellow,
    /// Failed.
    Red,
    /// Inactive / nothing to report.
    Gray,
}

/// A plugin's current status signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginStatus {
    /// Color indicator.
    pub indicator: StatusIndicator,
    /// Short status text (e.g. `"3 tools"`).
    pub text: String,
}

impl PluginStatus {
    /// Healthy status with the given text.
    #[must_use]
    pub fn green(text: impl Into<String>) -> Self {
        Self {
            indicator: StatusIndicator::Green,
            text: text.into(),
        }
    }

    /// Degraded status with the given text.
    #[must_use]
    pub fn yellow(text: impl Into<String>) -> Self {
        Self {
            indicator: StatusIndicator::Yellow,
            text: text.into(),
        }
    }

    /// Failed status with the given text.
    #[must_use]
    pub fn red(text: impl Into<String>) -> Self {
        Self {
            indicator: StatusIndicator::Red,
            text: text.into(),
        }
    }

    /// Inactive status with the given text.
    #[must_use]
    pub fn gray(text: impl Into<String>) -> Self {
        Self {
            indicator: StatusIndicator::Gray,
            text: text.into(),
        }
    }
}

/// Structured documentation returned by a plugin's `help()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginHelp {
    /// One-paragraph summary.
    pub summary: String,
    /// Per-verb or per-tool entries.
    pub topics: Vec<HelpTopic>,
}

/// One documented verb or tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpTopic {
    /// Verb or tool name.
    pub name: String,
    /// What it does.
    pub description: String,
}

impl PluginHelp {
    /// Creates help with a summary and no topics.
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            topics: Vec::new(),
        }
    }

    /// Adds one topic (builder style).
    #[must_use]
    pub fn topic(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.topics.push(HelpTopic {
            name: name.into(),
            description: description.into(),
        });
        self
    }
}
