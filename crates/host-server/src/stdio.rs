//! Process-stdio MCP transport.
//!
//! One session bound to the process's stdin/stdout, one JSON-RPC message
//! per line. Frames that do not parse as JSON-RPC are ignored with a
//! stderr diagnostic; nothing but protocol messages is ever written to
//! stdout.

use crate::protocol::{JsonRpcNotification, JsonRpcRequest};
use crate::session::McpSession;
use host_core::{ClientId, Error, Result};
use host_dispatch::ToolDispatcher;
use host_plugin::PluginManager;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Serves MCP over the process's standard streams until stdin closes.
///
/// # Errors
///
/// Returns [`Error::Io`] when stdin cannot be read.
pub async fn run_stdio(
    manager: Arc<PluginManager>,
    dispatcher: Arc<ToolDispatcher>,
) -> Result<()> {
    let session = McpSession::new(ClientId::stdio(), Arc::clone(&manager), dispatcher);

    // All protocol output funnels through one writer task, so responses
    // and notifications never interleave within a line.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
                || stdout.flush().await.is_err()
            {
                break;
            }
        }
    });

    let notifier = {
        let mut events = manager.subscribe();
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(_event) => {
                        let line = JsonRpcNotification::tools_list_changed().to_line();
                        if out_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {skipped} plugin events; notifying anyway");
                        let line = JsonRpcNotification::tools_list_changed().to_line();
                        if out_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    tracing::info!("MCP stdio transport ready");

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line).await.map_err(|e| Error::Io {
            context: "reading stdin".to_string(),
            source: e,
        })?;
        if read == 0 {
            tracing::info!("stdin closed; shutting down stdio transport");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(e) => {
                // Malformed frame: ignored, diagnostics go to stderr only.
                tracing::warn!("Ignoring malformed frame: {e}");
                continue;
            }
        };

        if let Some(response) = session.handle_request(request).await
            && out_tx.send(response.to_line()).is_err()
        {
            break;
        }
    }

    notifier.abort();
    drop(out_tx);
    let _ = writer.await;
    Ok(())
}
