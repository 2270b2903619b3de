//! MCP server surface for the host: protocol, sessions, transports.
//!
//! The host speaks MCP (JSON-RPC 2.0) over two transports that share one
//! session skeleton:
//!
//! - **stdio**: a single session on the process's standard streams,
//!   line-delimited JSON, stderr reserved for diagnostics
//!   ([`run_stdio`]).
//! - **HTTP/SSE**: one session per `GET /sse` stream with POST-back via
//!   `POST /message?clientId=...` ([`spawn_sse`]).
//!
//! Sessions delegate `tools/list` and `tools/call` to the dispatcher and
//! recompute visibility per request; plugin lifecycle events fan out as
//! `notifications/tools/list_changed` to every live session.

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod protocol;
mod session;
mod sse;
mod stdio;

pub use protocol::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION,
};
pub use session::McpSession;
pub use sse::{SseServerHandle, spawn_sse};
pub use stdio::run_stdio;
