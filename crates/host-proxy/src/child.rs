//! Child MCP client connections.
//!
//! A stdio child is spawned with piped streams; the MCP client runs over
//! the pipe pair while a monitor task watches for exit and a reader task
//! drains stderr into a bounded ring (child stderr never reaches the
//! parent's stdout). SSE children dial an existing server by URL.

use crate::config::ProxyConfig;
use anyhow::Context as _;
use rmcp::service::RunningService;
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;

/// Retained stderr lines per child.
const STDERR_RING_CAPACITY: usize = 100;

/// Bounded ring of recent child-stderr lines, for the `debug` verb.
#[derive(Debug, Clone, Default)]
pub(crate) struct StderrRing {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl StderrRing {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, line: String) {
        let mut lines = self.lines.lock().expect("stderr ring lock poisoned");
        lines.push_back(line);
        while lines.len() > STDERR_RING_CAPACITY {
            lines.pop_front();
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .expect("stderr ring lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.lines
            .lock()
            .expect("stderr ring lock poisoned")
            .clear();
    }
}

/// A tool discovered on the child at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTool {
    /// Tool name as exported by the child.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// Pass-through input schema.
    pub input_schema: Value,
}

/// A live connection to a child MCP server.
pub(crate) struct ChildConnection {
    /// The running MCP client.
    pub client: RunningService<RoleClient, ()>,
    /// Kill signal for the subprocess monitor (stdio children only).
    pub kill: Option<oneshot::Sender<()>>,
    /// Resolves with the exit code when the child dies on its own
    /// (stdio children only; never resolves on the kill path).
    pub exit: Option<oneshot::Receiver<Option<i32>>>,
}

impl std::fmt::Debug for ChildConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildConnection")
            .field("subprocess", &self.kill.is_some())
            .finish_non_exhaustive()
    }
}

/// Spawns the configured subprocess and performs the MCP handshake over
/// its stdio.
pub(crate) async fn connect_stdio(
    config: &ProxyConfig,
    stderr: StderrRing,
) -> anyhow::Result<ChildConnection> {
    let command = config
        .command
        .as_deref()
        .context("proxy config has no command")?;

    let mut child = tokio::process::Command::new(command)
        .args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning '{command}'"))?;

    let stdin = child.stdin.take().context("child stdin unavailable")?;
    let stdout = child.stdout.take().context("child stdout unavailable")?;
    let stderr_pipe = child.stderr.take().context("child stderr unavailable")?;

    stderr.clear();
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr_pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!("[child stderr] {line}");
            stderr.push(line);
        }
    });

    let (kill_tx, kill_rx) = oneshot::channel();
    let (exit_tx, exit_rx) = oneshot::channel();
    tokio::spawn(async move {
        tokio::select! {
            status = child.wait() => {
                let code = status.ok().and_then(|s| s.code());
                let _ = exit_tx.send(code);
            }
            _ = kill_rx => {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
    });

    let client = ()
        .serve((stdout, stdin))
        .await
        .with_context(|| format!("MCP handshake with '{command}'"))?;

    Ok(ChildConnection {
        client,
        kill: Some(kill_tx),
        exit: Some(exit_rx),
    })
}

/// Dials an SSE MCP server and performs the handshake.
pub(crate) async fn connect_sse(url: &str) -> anyhow::Result<ChildConnection> {
    let transport = rmcp::transport::SseClientTransport::start(url.to_string())
        .await
        .with_context(|| format!("opening SSE stream to {url}"))?;

    let client = ()
        .serve(transport)
        .await
        .with_context(|| format!("MCP handshake with {url}"))?;

    Ok(ChildConnection {
        client,
        kill: None,
        exit: None,
    })
}

/// Converts the child's tool descriptors to the pass-through form.
pub(crate) fn convert_tool(tool: &rmcp::model::Tool) -> DiscoveredTool {
    DiscoveredTool {
        name: tool.name.to_string(),
        description: tool
            .description
            .as_deref()
            .unwrap_or_default()
            .to_string(),
        input_schema: Value::Object(tool.input_schema.as_ref().clone()),
    }
}
