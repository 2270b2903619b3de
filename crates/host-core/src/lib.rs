//! Core types, errors, and configuration for the MCP host.
//!
//! This crate provides the foundational pieces shared by every other crate
//! in the workspace:
//!
//! - Strong domain types (`PluginName`, `ToolName`, `ClientId`)
//! - The error hierarchy with contextual information
//! - The normalized configuration shape and state-directory layout
//!
//! # Examples
//!
//! ```
//! use host_core::{HostConfig, PluginName, ToolName};
//!
//! let config = HostConfig::example();
//! assert!(config.plugins.contains_key("fs"));
//!
//! let qualified = PluginName::new("fs").qualify(&ToolName::new("read_file"));
//! assert_eq!(qualified, "fs_read_file");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod config;
mod error;
mod types;

pub use config::{
    DEFAULT_PORT, HostConfig, McpSettings, PluginEntry, STATE_DIR_NAME, logs_dir, state_dir,
};
pub use error::{Error, Result};
pub use types::{ClientId, PluginName, ToolName};
