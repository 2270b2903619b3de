//! The tool-call dispatcher.
//!
//! Single entry point for every tool invocation, local or remote. Looks
//! the fully-qualified name up in the manager's current visible set, runs
//! the handler, and writes exactly one telemetry record per call, after
//! the handler completes, so the recorded duration covers only handler
//! time.

use chrono::Utc;
use host_core::{ClientId, Error};
use host_plugin::PluginManager;
use host_telemetry::{TelemetryStore, ToolCallRecord};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// One entry of an MCP tool-call response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentBlock {
    /// Content kind; always `"text"` here.
    #[serde(rename = "type")]
    pub kind: String,
    /// The text payload.
    pub text: String,
}

impl ContentBlock {
    /// A text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

/// MCP-shaped result of a dispatched call.
///
/// Serializes to `{"content":[…]}` with `"isError":true` added on
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallOutcome {
    /// Response content blocks.
    pub content: Vec<ContentBlock>,
    /// Present (true) only on failure.
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallOutcome {
    /// Successful outcome wrapping one text block.
    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    /// Failed outcome wrapping one text block.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: true,
        }
    }

    /// The first text block, when present.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.first().map(|block| block.text.as_str())
    }
}

/// Routes `tools/call` requests to plugin handlers.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    manager: Arc<PluginManager>,
    telemetry: Arc<TelemetryStore>,
}

impl ToolDispatcher {
    /// Creates a dispatcher over the given manager and telemetry store.
    #[must_use]
    pub fn new(manager: Arc<PluginManager>, telemetry: Arc<TelemetryStore>) -> Self {
        Self { manager, telemetry }
    }

    /// Dispatches one call. Never fails: unknown tools and handler
    /// failures come back as `isError` outcomes, each with its telemetry
    /// record.
    pub async fn dispatch(
        &self,
        tool: &str,
        params: Value,
        client: &ClientId,
    ) -> ToolCallOutcome {
        let timestamp = Utc::now();
        let request_bytes = json_byte_len(&params);

        let visible = self.manager.tools();
        let Some(target) = visible.into_iter().find(|t| t.name == tool) else {
            let message = Error::UnknownTool {
                name: tool.to_string(),
            }
            .to_string();
            self.telemetry.record(ToolCallRecord {
                timestamp,
                client: client.clone(),
                tool: tool.to_string(),
                params,
                success: false,
                error: Some(message.clone()),
                duration_ms: 0,
                request_bytes,
                response_bytes: message.len() as u64,
            });
            return ToolCallOutcome::error(message);
        };

        let start = Instant::now();
        match target.handler.invoke(params.clone()).await {
            Ok(value) => {
                let text = stringify(value);
                self.telemetry.record(ToolCallRecord {
                    timestamp,
                    client: client.clone(),
                    tool: tool.to_string(),
                    params,
                    success: true,
                    error: None,
                    duration_ms: elapsed_ms(start),
                    request_bytes,
                    response_bytes: text.len() as u64,
                });
                ToolCallOutcome::success(text)
            }
            Err(e) => {
                let message = e.to_string();
                let text = format!("Error: {message}");
                self.telemetry.record(ToolCallRecord {
                    timestamp,
                    client: client.clone(),
                    tool: tool.to_string(),
                    params,
                    success: false,
                    error: Some(message),
                    duration_ms: elapsed_ms(start),
                    request_bytes,
                    response_bytes: text.len() as u64,
                });
                ToolCallOutcome::error(text)
            }
        }
    }
}

/// Strings pass through untouched; everything else pretty-prints.
fn stringify(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}

fn json_byte_len(value: &Value) -> u64 {
    serde_json::to_string(value).map_or(0, |s| s.len() as u64)
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
