//! JSON-RPC 2.0 framing for the MCP surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version echoed in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// An incoming JSON-RPC 2.0 request or notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Version marker; must be `"2.0"`.
    pub jsonrpc: String,

    /// Method name (`initialize`, `tools/list`, `tools/call`, …).
    pub method: String,

    /// Parameters; defaults to null when absent.
    #[serde(default)]
    pub params: Value,

    /// Request id; absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    /// Whether this message is a notification (no id, no reply expected).
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// An outgoing JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Version marker; always `"2.0"`.
    pub jsonrpc: String,

    /// Result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error object on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,

    /// Echoed request id.
    pub id: Option<Value>,
}

impl JsonRpcResponse {
    /// Success response carrying `result`.
    #[must_use]
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Error response carrying `error`.
    #[must_use]
    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Serializes to a single JSON line.
    #[must_use]
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            // Serialization of our own types cannot realistically fail;
            // fall back to a bare internal error frame.
            r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"serialization failed"},"id":null}"#
                .to_string()
        })
    }
}

/// A server-initiated JSON-RPC notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Version marker; always `"2.0"`.
    pub jsonrpc: String,

    /// Notification method.
    pub method: String,

    /// Parameters, omitted when null.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl JsonRpcNotification {
    /// Builds a notification with no parameters.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params: Value::Null,
        }
    }

    /// The `notifications/tools/list_changed` notification pushed when
    /// the visible tool set may have changed.
    #[must_use]
    pub fn tools_list_changed() -> Self {
        Self::new("notifications/tools/list_changed")
    }

    /// Serializes to a single JSON line.
    #[must_use]
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// JSON-RPC 2.0 error object with the standard codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,

    /// Human-readable message.
    pub message: String,

    /// Extra payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Invalid request (-32600).
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    /// Method not found (-32601).
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    /// Invalid params (-32602).
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    /// Internal error (-32603).
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_parses_with_and_without_id() {
        let call: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"tools/list","id":7}"#).unwrap();
        assert!(!call.is_notification());
        assert_eq!(call.id, Some(json!(7)));

        let note: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(note.is_notification());
        assert_eq!(note.params, Value::Null);
    }

    #[test]
    fn test_success_response_omits_error() {
        let line = JsonRpcResponse::success(Some(json!(1)), json!({"ok": true})).to_line();
        assert!(line.contains("\"result\""));
        assert!(!line.contains("\"error\""));
    }

    #[test]
    fn test_error_response_omits_result() {
        let line =
            JsonRpcResponse::error(Some(json!(1)), JsonRpcError::method_not_found("nope"))
                .to_line();
        assert!(line.contains("-32601"));
        assert!(line.contains("Method not found: nope"));
        assert!(!line.contains("\"result\""));
    }

    #[test]
    fn test_list_changed_notification_shape() {
        let line = JsonRpcNotification::tools_list_changed().to_line();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "notifications/tools/list_changed");
        assert!(value.get("params").is_none());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_response_line_is_single_line() {
        let line = JsonRpcResponse::success(None, json!({"a": "b\nc"})).to_line();
        assert!(!line.contains('\n'));
    }
}
