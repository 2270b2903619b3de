//! Command routing and tool dispatch for the MCP host.
//!
//! Two routers live here:
//!
//! - [`CommandRegistry`] resolves textual CLI verbs: built-ins first,
//!   then plugin claims, with router-verb disambiguation when several
//!   plugins claim the same verb.
//! - [`ToolDispatcher`] routes `tools/call` invocations (from the local
//!   `call` verb and from every MCP transport) to plugin handlers and
//!   writes one telemetry record per call.

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod commands;
mod dispatcher;
mod tokenize;

pub use commands::{BuiltinCommand, CommandRegistry};
pub use dispatcher::{ContentBlock, ToolCallOutcome, ToolDispatcher};
pub use tokenize::tokenize;
