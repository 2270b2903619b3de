//! Error types for the MCP host runtime.
//!
//! All fallible runtime operations return [`Error`], a single `thiserror`
//! hierarchy with contextual fields. Plugin-authored code (lifecycle hooks,
//! tool handlers) reports failures as `anyhow::Error` at the contract
//! boundary; the runtime wraps those into the matching variant here.
//!
//! # Examples
//!
//! ```
//! use host_core::{Error, Result};
//!
//! fn lookup_tool(name: &str) -> Result<()> {
//!     Err(Error::UnknownTool {
//!         name: name.to_string(),
//!     })
//! }
//!
//! let err = lookup_tool("demo_echo").unwrap_err();
//! assert!(err.is_not_found());
//! assert_eq!(err.to_string(), "Unknown tool: demo_echo");
//! ```

use thiserror::Error;

/// Main error type for the MCP host.
///
/// Every crate in the workspace surfaces failures through this type so
/// callers can branch on kind without string matching.
#[derive(Error, Debug)]
pub enum Error {
    /// A plugin with the same registered name is already loaded.
    #[error("Plugin already loaded: {name}")]
    DuplicateName {
        /// Registered name that collided.
        name: String,
    },

    /// A plugin module failed shape validation.
    ///
    /// Raised when a loaded module is missing required lifecycle
    /// operations, has a malformed manifest, or exports two tools with the
    /// same local name.
    #[error("Invalid plugin '{name}': {reason}")]
    InvalidPlugin {
        /// Registered name of the offending plugin.
        name: String,
        /// What made the plugin invalid.
        reason: String,
    },

    /// A plugin's `init` rejected.
    ///
    /// The original failure message is preserved verbatim.
    #[error("Failed to load plugin '{name}': {message}")]
    LoadFailure {
        /// Registered name of the plugin that failed to initialize.
        name: String,
        /// Message from the underlying init failure.
        message: String,
    },

    /// No plugin is registered under the given name.
    #[error("Unknown plugin: {name}")]
    UnknownPlugin {
        /// The name that failed to resolve.
        name: String,
    },

    /// No visible tool matches the given fully-qualified name.
    #[error("Unknown tool: {name}")]
    UnknownTool {
        /// The fully-qualified tool name that failed to resolve.
        name: String,
    },

    /// No built-in or plugin verb matches the given name.
    #[error("Unknown command: {name}")]
    UnknownCommand {
        /// The verb that failed to resolve.
        name: String,
    },

    /// The peer's transport went away mid-request.
    #[error("Transport closed")]
    TransportClosed,

    /// An I/O-bound operation exceeded its deadline.
    #[error("Operation timed out after {duration_secs}s: {operation}")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
        /// Configured deadline in seconds.
        duration_secs: u64,
    },

    /// Malformed input from a peer (bad JSON, malformed SSE message).
    #[error("Bad input: {message}")]
    BadInput {
        /// What was wrong with the input.
        message: String,
    },

    /// A proxied child MCP server process exited.
    #[error("Child process exited{}", .code.map_or_else(String::new, |code| format!(" with code {code}")))]
    ChildExited {
        /// Exit code, if the child terminated normally.
        code: Option<i32>,
    },

    /// Configuration is missing, malformed, or contradictory.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// Underlying I/O failure.
    #[error("I/O error during {context}")]
    Io {
        /// Operation that was being performed.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failure.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
        /// Underlying serde error, when one exists.
        #[source]
        source: Option<serde_json::Error>,
    },
}

impl Error {
    /// Returns `true` for the lookup-failure variants
    /// (`UnknownPlugin`, `UnknownTool`, `UnknownCommand`).
    ///
    /// # Examples
    ///
    /// ```
    /// use host_core::Error;
    ///
    /// let err = Error::UnknownPlugin {
    ///     name: "demo".to_string(),
    /// };
    /// assert!(err.is_not_found());
    /// ```
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownPlugin { .. } | Self::UnknownTool { .. } | Self::UnknownCommand { .. }
        )
    }

    /// Returns `true` if this is a duplicate-registration error.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateName { .. })
    }

    /// Returns `true` if this is a plugin shape-validation error.
    #[must_use]
    pub const fn is_invalid_plugin(&self) -> bool {
        matches!(self, Self::InvalidPlugin { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
