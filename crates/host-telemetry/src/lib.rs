//! Telemetry for the MCP host: call history, statistics, persistence.
//!
//! Every dispatched tool call produces one [`ToolCallRecord`]. The
//! [`TelemetryStore`] retains a bounded in-memory history, aggregates
//! per-tool and global [`StatsSnapshot`] counters, notifies synchronous
//! subscribers, and persists both a daily JSONL call journal and a
//! debounced `stats.json` through a single ordered writer task.
//!
//! # Examples
//!
//! ```
//! use host_telemetry::{TelemetryStore, ToolCallRecord};
//! use host_core::ClientId;
//!
//! let store = TelemetryStore::new(1000);
//! store.record(ToolCallRecord {
//!     timestamp: chrono::Utc::now(),
//!     client: ClientId::cli(),
//!     tool: "demo_echo".to_string(),
//!     params: serde_json::json!({"message": "hi"}),
//!     success: true,
//!     error: None,
//!     duration_ms: 3,
//!     request_bytes: 16,
//!     response_bytes: 2,
//! });
//!
//! assert_eq!(store.stats().totals.calls, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod record;
mod stats;
mod store;

pub use record::ToolCallRecord;
pub use stats::{StatsSnapshot, StatsTotals, ToolStats};
pub use store::{DEFAULT_HISTORY_CAPACITY, SubscriptionId, TelemetryStore};
