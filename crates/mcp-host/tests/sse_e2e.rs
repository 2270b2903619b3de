//! SSE transport end-to-end: raw HTTP client against a live listener.

mod common;

use common::test_modules;
use host_dispatch::ToolDispatcher;
use host_plugin::PluginManager;
use host_server::spawn_sse;
use host_telemetry::TelemetryStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;

struct Harness {
    manager: Arc<PluginManager>,
    telemetry: Arc<TelemetryStore>,
    handle: host_server::SseServerHandle,
}

async fn start() -> Harness {
    let manager = Arc::new(PluginManager::new(test_modules()));
    manager
        .load_plugin("demo", "demo", json!({}), Vec::new())
        .await
        .unwrap();

    let telemetry = Arc::new(TelemetryStore::new(1000));
    let dispatcher = Arc::new(ToolDispatcher::new(
        Arc::clone(&manager),
        Arc::clone(&telemetry),
    ));

    // Port 0 picks a free ephemeral port.
    let handle = spawn_sse(Arc::clone(&manager), dispatcher, 0).await.unwrap();
    Harness {
        manager,
        telemetry,
        handle,
    }
}

/// Opens `GET /sse` and returns the line stream positioned at the start.
async fn open_sse(port: u16) -> Lines<BufReader<TcpStream>> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let request = format!(
        "GET /sse HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\nAccept: text/event-stream\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    BufReader::new(stream).lines()
}

/// Reads lines until one contains `needle` (chunked-framing lines pass
/// through harmlessly).
async fn read_until(lines: &mut Lines<BufReader<TcpStream>>, needle: &str) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match lines.next_line().await.unwrap() {
                Some(line) if line.contains(needle) => return line,
                Some(_) => {}
                None => panic!("stream ended before '{needle}'"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for '{needle}'"))
}

/// One-shot HTTP request; returns the full response text.
async fn http(port: u16, request: String) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

async fn post_message(port: u16, client_id: &str, body: &str) -> String {
    http(
        port,
        format!(
            "POST /message?clientId={client_id} HTTP/1.1\r\n\
             Host: 127.0.0.1:{port}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{body}",
            body.len()
        ),
    )
    .await
}

fn extract_client_id(endpoint_line: &str) -> String {
    let start = endpoint_line
        .find("clientId=")
        .expect("endpoint line has clientId")
        + "clientId=".len();
    endpoint_line[start..start + 36].to_string()
}

#[tokio::test]
async fn test_tool_call_over_sse() {
    let harness = start().await;
    let port = harness.handle.port();

    // Endpoint event arrives first and carries the absolute POST URL.
    let mut sse = open_sse(port).await;
    let endpoint = read_until(&mut sse, "clientId=").await;
    assert!(endpoint.contains(&format!("http://127.0.0.1:{port}/message?clientId=")));
    let client_id = extract_client_id(&endpoint);

    // The session is counted.
    let health = http(
        port,
        format!("GET /health HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\nConnection: close\r\n\r\n"),
    )
    .await;
    assert!(health.contains("\"status\":\"ok\""));
    assert!(health.contains("\"clients\":1"));

    // tools/list shows exactly the qualified demo tools.
    let accepted = post_message(
        port,
        &client_id,
        r#"{"jsonrpc":"2.0","method":"tools/list","id":1}"#,
    )
    .await;
    assert!(accepted.contains("202"), "{accepted}");
    read_until(&mut sse, "demo_echo").await;

    // tools/call round-trips through the plugin handler.
    let accepted = post_message(
        port,
        &client_id,
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"demo_echo","arguments":{"message":"hi"}},"id":2}"#,
    )
    .await;
    assert!(accepted.contains("202"));
    let reply = read_until(&mut sse, "\"id\":2").await;
    assert!(reply.contains("\\\"text\\\":\\\"hi\\\"") || reply.contains("\"text\":\"hi\""));

    // Exactly one telemetry record for the call.
    let history = harness.telemetry.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tool, "demo_echo");
    assert!(history[0].success);
    assert_eq!(history[0].client.as_str(), client_id);

    drop(sse);
    harness.handle.stop().await;
}

#[tokio::test]
async fn test_live_reconfiguration_notifies_session() {
    let harness = start().await;
    let port = harness.handle.port();

    let mut sse = open_sse(port).await;
    let endpoint = read_until(&mut sse, "clientId=").await;
    let client_id = extract_client_id(&endpoint);

    // Disabling the plugin pushes list_changed to the live session.
    harness.manager.disable_plugin("demo").await.unwrap();
    read_until(&mut sse, "notifications/tools/list_changed").await;

    // A subsequent tools/list omits the demo tools.
    post_message(
        port,
        &client_id,
        r#"{"jsonrpc":"2.0","method":"tools/list","id":3}"#,
    )
    .await;
    let reply = read_until(&mut sse, "\"id\":3").await;
    assert!(reply.contains("\\\"tools\\\":[]") || reply.contains("\"tools\":[]"));

    drop(sse);
    harness.handle.stop().await;
}

#[tokio::test]
async fn test_post_error_statuses() {
    let harness = start().await;
    let port = harness.handle.port();

    let mut sse = open_sse(port).await;
    let endpoint = read_until(&mut sse, "clientId=").await;
    let client_id = extract_client_id(&endpoint);

    // Invalid JSON → 400.
    let bad = post_message(port, &client_id, "this is not json").await;
    assert!(bad.contains("400"), "{bad}");

    // Unknown client id → 404.
    let unknown = post_message(
        port,
        "00000000-0000-0000-0000-000000000000",
        r#"{"jsonrpc":"2.0","method":"tools/list","id":1}"#,
    )
    .await;
    assert!(unknown.contains("404"), "{unknown}");

    drop(sse);
    harness.handle.stop().await;
}

#[tokio::test]
async fn test_initialize_over_sse() {
    let harness = start().await;
    let port = harness.handle.port();

    let mut sse = open_sse(port).await;
    let endpoint = read_until(&mut sse, "clientId=").await;
    let client_id = extract_client_id(&endpoint);

    post_message(
        port,
        &client_id,
        r#"{"jsonrpc":"2.0","method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test","version":"0"}},"id":1}"#,
    )
    .await;
    let reply = read_until(&mut sse, "\"id\":1").await;
    assert!(reply.contains("mcp-host"));

    drop(sse);
    harness.handle.stop().await;
}
