//! Proxy plugin for the MCP host.
//!
//! A proxy instance owns one child MCP *client* (either a spawned
//! subprocess speaking MCP over its stdio, or a dialed SSE endpoint) and
//! re-exports the child's discovered tools through the host's normal
//! plugin surface, as if they were native.
//!
//! The proxy is a factory package: loading it under several registered
//! names yields independent instances, each with its own connection,
//! error state, and stderr diagnostics.
//!
//! # Configuration
//!
//! ```json
//! { "command": "mcp-server-fs", "args": ["--root", "/data"], "autoConnect": true }
//! ```
//!
//! or, for an already-running server:
//!
//! ```json
//! { "url": "http://localhost:9000/sse" }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod child;
mod config;
mod plugin;

pub use child::DiscoveredTool;
pub use config::ProxyConfig;
pub use plugin::{PROXY_PACKAGE, ProxyPlugin, register};
