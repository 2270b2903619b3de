//! Plugin contract and runtime for the MCP host.
//!
//! A plugin is an independently-authored module that contributes CLI verbs
//! and MCP tools. This crate defines:
//!
//! - The [`Plugin`] trait and its [`PluginExport`] tagged sum
//! - [`PluginContext`], the capabilities lent to each instance
//! - [`PluginModules`], the package → factory registry
//! - [`PluginManager`], which owns instances, mediates enable/disable and
//!   tool masking, and publishes [`PluginEvent`]s
//!
//! # Examples
//!
//! ```no_run
//! use host_plugin::{PluginManager, PluginModules};
//!
//! # async fn example(modules: PluginModules) -> host_core::Result<()> {
//! let manager = PluginManager::new(modules);
//! manager
//!     .load_plugin("demo", "demo", serde_json::json!({}), Vec::new())
//!     .await?;
//!
//! for tool in manager.tools() {
//!     println!("{}", tool.name);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod context;
mod events;
mod exports;
mod manager;
mod manifest;
mod plugin;

pub use context::PluginContext;
pub use events::PluginEvent;
pub use exports::{
    ArgSpec, CliCommandSpec, CliHandler, CommandResult, FnCliHandler, FnToolHandler, PluginExport,
    ToolDef, ToolHandler,
};
pub use manager::{PluginCommand, PluginManager, PluginOverview, VisibleTool};
pub use manifest::{HelpTopic, PluginHelp, PluginManifest, PluginStatus, StatusIndicator};
pub use plugin::{Plugin, PluginFactory, PluginModules};
