//! Per-client MCP session.
//!
//! One session exists per connected client (exactly one for the stdio
//! transport, one per SSE stream). Sessions are independent for state and
//! recompute the visible tool set on every `tools/list`; nothing is
//! cached across requests.

use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use host_core::ClientId;
use host_dispatch::ToolDispatcher;
use host_plugin::PluginManager;
use serde_json::{Value, json};
use std::sync::Arc;

/// MCP request processor bound to one client.
#[derive(Debug, Clone)]
pub struct McpSession {
    client_id: ClientId,
    manager: Arc<PluginManager>,
    dispatcher: Arc<ToolDispatcher>,
}

impl McpSession {
    /// Creates a session for `client_id`.
    #[must_use]
    pub fn new(
        client_id: ClientId,
        manager: Arc<PluginManager>,
        dispatcher: Arc<ToolDispatcher>,
    ) -> Self {
        Self {
            client_id,
            manager,
            dispatcher,
        }
    }

    /// The client this session serves.
    #[must_use]
    pub const fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Processes one request. Returns `None` for notifications (nothing
    /// to send back).
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        tracing::debug!("[{}] {}", self.client_id, request.method);

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request)),
            "ping" => request
                .id
                .map(|id| JsonRpcResponse::success(Some(id), json!({}))),
            "tools/list" => Some(self.handle_tools_list(request)),
            "tools/call" => self.handle_tools_call(request).await,
            method if method.starts_with("notifications/") => None,
            method => {
                let error = JsonRpcError::method_not_found(method);
                Some(JsonRpcResponse::error(request.id, error))
            }
        }
    }

    fn handle_initialize(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(
            request.id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": "mcp-host",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": {
                    "tools": { "listChanged": true },
                },
            }),
        )
    }

    fn handle_tools_list(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let tools: Vec<Value> = self
            .manager
            .tools()
            .into_iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.input_schema,
                })
            })
            .collect();

        JsonRpcResponse::success(request.id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id;

        let Some(params) = request.params.as_object() else {
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params("params must be an object"),
            ));
        };

        let Some(tool) = params.get("name").and_then(Value::as_str) else {
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params("missing 'name' field"),
            ));
        };

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

        let outcome = self
            .dispatcher
            .dispatch(tool, arguments, &self.client_id)
            .await;

        let result = serde_json::to_value(&outcome)
            .unwrap_or_else(|_| json!({"content": [], "isError": true}));
        Some(JsonRpcResponse::success(id, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use host_core::ToolName;
    use host_plugin::{
        FnToolHandler, Plugin, PluginContext, PluginExport, PluginHelp, PluginManifest,
        PluginModules, PluginStatus, ToolDef,
    };
    use host_telemetry::TelemetryStore;

    struct DemoPlugin;

    #[async_trait]
    impl Plugin for DemoPlugin {
        fn manifest(&self) -> PluginManifest {
            PluginManifest::new("demo", "1.0.0", "Demo tools")
        }

        async fn init(&self, _ctx: PluginContext) -> anyhow::Result<()> {
            Ok(())
        }

        fn exports(&self) -> Vec<PluginExport> {
            vec![PluginExport::Tool(ToolDef {
                name: ToolName::new("echo"),
                description: "Echo the message back".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}}
                }),
                handler: Arc::new(FnToolHandler(|params: Value| {
                    Ok(params["message"].clone())
                })),
            })]
        }

        fn status(&self) -> PluginStatus {
            PluginStatus::green("1 tool")
        }

        fn help(&self) -> PluginHelp {
            PluginHelp::new("Demo")
        }
    }

    async fn session() -> (Arc<PluginManager>, McpSession) {
        let mut modules = PluginModules::new();
        modules.register("demo", || Box::new(DemoPlugin));

        let manager = Arc::new(PluginManager::new(modules));
        manager
            .load_plugin("demo", "demo", json!({}), Vec::new())
            .await
            .unwrap();

        let telemetry = Arc::new(TelemetryStore::new(100));
        let dispatcher = Arc::new(ToolDispatcher::new(Arc::clone(&manager), telemetry));
        let session = McpSession::new(
            ClientId::new("test-client"),
            Arc::clone(&manager),
            dispatcher,
        );
        (manager, session)
    }

    fn request(method: &str, params: Value, id: i64) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: Some(json!(id)),
        }
    }

    #[tokio::test]
    async fn test_initialize_advertises_tools_capability() {
        let (_, session) = session().await;
        let response = session
            .handle_request(request("initialize", json!({}), 1))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["capabilities"]["tools"]["listChanged"], true);
        assert_eq!(result["serverInfo"]["name"], "mcp-host");
    }

    #[tokio::test]
    async fn test_tools_list_uses_qualified_names() {
        let (_, session) = session().await;
        let response = session
            .handle_request(request("tools/list", json!({}), 2))
            .await
            .unwrap();

        let tools = response.result.unwrap()["tools"].clone();
        assert_eq!(tools.as_array().unwrap().len(), 1);
        assert_eq!(tools[0]["name"], "demo_echo");
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
    }

    #[tokio::test]
    async fn test_tools_list_reflects_current_state() {
        let (manager, session) = session().await;

        manager.disable_plugin("demo").await.unwrap();
        let response = session
            .handle_request(request("tools/list", json!({}), 3))
            .await
            .unwrap();
        assert!(response.result.unwrap()["tools"].as_array().unwrap().is_empty());

        manager.enable_plugin("demo").await.unwrap();
        let response = session
            .handle_request(request("tools/list", json!({}), 4))
            .await
            .unwrap();
        assert_eq!(response.result.unwrap()["tools"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tools_call_round_trip() {
        let (_, session) = session().await;
        let response = session
            .handle_request(request(
                "tools/call",
                json!({"name": "demo_echo", "arguments": {"message": "hi"}}),
                5,
            ))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["type"], "text");
        assert_eq!(result["content"][0]["text"], "hi");
        assert!(result.get("isError").is_none());
    }

    #[tokio::test]
    async fn test_tools_call_unknown_tool_is_error_result() {
        let (_, session) = session().await;
        let response = session
            .handle_request(request(
                "tools/call",
                json!({"name": "demo_missing", "arguments": {}}),
                6,
            ))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "Unknown tool: demo_missing");
    }

    #[tokio::test]
    async fn test_tools_call_requires_name() {
        let (_, session) = session().await;
        let response = session
            .handle_request(request("tools/call", json!({"arguments": {}}), 7))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (_, session) = session().await;
        let response = session
            .handle_request(request("resources/list", json!({}), 8))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let (_, session) = session().await;
        let note = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: "notifications/initialized".to_string(),
            params: Value::Null,
            id: None,
        };
        assert!(session.handle_request(note).await.is_none());
    }

    #[tokio::test]
    async fn test_ping_returns_empty_result() {
        let (_, session) = session().await;
        let response = session
            .handle_request(request("ping", Value::Null, 9))
            .await
            .unwrap();
        assert_eq!(response.result.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_wrong_version_rejected() {
        let (_, session) = session().await;
        let bad = JsonRpcRequest {
            jsonrpc: "1.0".to_string(),
            method: "tools/list".to_string(),
            params: Value::Null,
            id: Some(json!(10)),
        };
        let response = session.handle_request(bad).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32600);
    }
}
