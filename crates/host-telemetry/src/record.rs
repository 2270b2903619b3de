//! Tool-call records and their journal representation.

use chrono::{DateTime, Utc};
use host_core::ClientId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One completed (or rejected) tool invocation.
///
/// Exactly one record is produced per dispatched call, after the handler
/// completes, so `duration_ms` covers only handler time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// When the call started.
    pub timestamp: DateTime<Utc>,

    /// Caller identity (`cli`, `stdio`, or a per-session id).
    pub client: ClientId,

    /// Fully-qualified tool name (`<plugin>_<tool>`).
    pub tool: String,

    /// Parameters as received.
    pub params: Value,

    /// Whether the handler returned (vs. threw or was unknown).
    pub success: bool,

    /// Error text for failed calls.
    pub error: Option<String>,

    /// Handler wall time in milliseconds.
    pub duration_ms: u64,

    /// UTF-8 length of the serialized params.
    pub request_bytes: u64,

    /// UTF-8 length of the response text returned to the peer.
    pub response_bytes: u64,
}

impl ToolCallRecord {
    /// Serializes the record as one journal line (short keys, no trailing
    /// newline).
    #[must_use]
    pub fn to_journal_line(&self) -> String {
        let entry = JournalEntry {
            ts: self.timestamp,
            client: self.client.as_str(),
            tool: &self.tool,
            params: &self.params,
            ok: self.success,
            err: self.error.as_deref(),
            ms: self.duration_ms,
            req_bytes: self.request_bytes,
            res_bytes: self.response_bytes,
        };
        serde_json::to_string(&entry).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Journal-file shape with short keys.
///
/// `{"ts":…,"client":…,"tool":…,"params":…,"ok":…,"err":…,"ms":…,
/// "reqBytes":…,"resBytes":…}`
#[derive(Debug, Serialize)]
struct JournalEntry<'a> {
    ts: DateTime<Utc>,
    client: &'a str,
    tool: &'a str,
    params: &'a Value,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    err: Option<&'a str>,
    ms: u64,
    #[serde(rename = "reqBytes")]
    req_bytes: u64,
    #[serde(rename = "resBytes")]
    res_bytes: u64,
}
