//! Aggregated per-tool and global call statistics.
//!
//! Counters accumulate monotonically from a stable `since` origin and are
//! only rewound by an explicit reset. The whole snapshot serializes to the
//! `stats.json` shape.

use crate::record::ToolCallRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters for one fully-qualified tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStats {
    /// Total invocations.
    pub calls: u64,
    /// Invocations whose handler returned.
    pub success: u64,
    /// Invocations whose handler failed (or whose tool was unknown).
    pub errors: u64,
    /// Cumulative handler wall time in milliseconds.
    pub total_duration_ms: u64,
    /// Cumulative serialized-request bytes.
    pub total_request_bytes: u64,
    /// Cumulative response-text bytes.
    pub total_response_bytes: u64,
    /// Timestamp of the most recent invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl ToolStats {
    fn record(&mut self, record: &ToolCallRecord) {
        self.calls += 1;
        if record.success {
            self.success += 1;
        } else {
            self.errors += 1;
        }
        self.total_duration_ms += record.duration_ms;
        self.total_request_bytes += record.request_bytes;
        self.total_response_bytes += record.response_bytes;
        self.last_used = Some(record.timestamp);
    }
}

/// Global totals across every tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsTotals {
    /// Total invocations.
    pub calls: u64,
    /// Invocations whose handler returned.
    pub success: u64,
    /// Invocations whose handler failed.
    pub errors: u64,
    /// Cumulative handler wall time in milliseconds.
    pub total_duration_ms: u64,
    /// Cumulative serialized-request bytes.
    pub total_request_bytes: u64,
    /// Cumulative response-text bytes.
    pub total_response_bytes: u64,
}

/// Full statistics state: origin, totals, and the per-tool table.
///
/// # Examples
///
/// ```
/// use host_telemetry::StatsSnapshot;
///
/// let stats = StatsSnapshot::new();
/// assert_eq!(stats.totals.calls, 0);
/// assert!(stats.tools.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// When accumulation started (set at creation and on reset).
    pub since: DateTime<Utc>,

    /// Global totals.
    pub totals: StatsTotals,

    /// Per-tool counters, keyed by fully-qualified name.
    pub tools: BTreeMap<String, ToolStats>,
}

impl StatsSnapshot {
    /// Creates an empty snapshot with `since` set to now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            since: Utc::now(),
            totals: StatsTotals::default(),
            tools: BTreeMap::new(),
        }
    }

    /// Folds one call record into the counters.
    pub fn record(&mut self, record: &ToolCallRecord) {
        self.tools.entry(record.tool.clone()).or_default().record(record);

        self.totals.calls += 1;
        if record.success {
            self.totals.success += 1;
        } else {
            self.totals.errors += 1;
        }
        self.totals.total_duration_ms += record.duration_ms;
        self.totals.total_request_bytes += record.request_bytes;
        self.totals.total_response_bytes += record.response_bytes;
    }

    /// Discards all counters and restarts accumulation from now.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
