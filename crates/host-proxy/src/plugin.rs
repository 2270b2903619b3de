//! The proxy plugin: re-exports tools discovered from a child MCP server.

use crate::child::{self, ChildConnection, DiscoveredTool, StderrRing};
use crate::config::ProxyConfig;
use anyhow::Context as _;
use async_trait::async_trait;
use host_core::{Error, ToolName};
use host_plugin::{
    CliCommandSpec, CliHandler, CommandResult, Plugin, PluginContext, PluginExport, PluginHelp,
    PluginManifest, PluginModules, PluginStatus, ToolDef, ToolHandler,
};
use rmcp::model::CallToolRequestParam;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::oneshot;

/// Package specifier the proxy registers under.
pub const PROXY_PACKAGE: &str = "proxy";

/// Registers the proxy package in a module registry.
pub fn register(modules: &mut PluginModules) {
    modules.register(PROXY_PACKAGE, || Box::new(ProxyPlugin::new()));
}

#[derive(Default)]
struct Shared {
    config: Option<ProxyConfig>,
    context: Option<PluginContext>,
    connected: bool,
    tools: Vec<DiscoveredTool>,
    last_error: Option<String>,
}

/// State shared between the plugin, its verb handlers, and its
/// re-exported tool handlers.
struct ProxyInner {
    shared: Mutex<Shared>,
    connection: AsyncMutex<Option<ChildConnection>>,
    stderr: StderrRing,
}

impl ProxyInner {
    fn new() -> Self {
        Self {
            shared: Mutex::new(Shared::default()),
            connection: AsyncMutex::new(None),
            stderr: StderrRing::new(),
        }
    }

    fn lock_shared(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().expect("proxy state lock poisoned")
    }

    /// Establishes the configured transport, handshakes, and discovers
    /// the child's tools. Connecting while connected is an error.
    async fn connect(self: Arc<Self>) -> anyhow::Result<usize> {
        let config = self
            .lock_shared()
            .config
            .clone()
            .context("proxy not initialized")?;

        let mut slot = self.connection.lock().await;
        if slot.is_some() {
            anyhow::bail!("already connected");
        }

        let attempt = async {
            let mut conn = if config.command.is_some() {
                child::connect_stdio(&config, self.stderr.clone()).await?
            } else if let Some(url) = &config.url {
                child::connect_sse(url).await?
            } else {
                anyhow::bail!("proxy config has no transport");
            };

            match conn.client.peer().list_tools(Default::default()).await {
                Ok(listed) => Ok((conn, listed.tools)),
                Err(e) => {
                    if let Some(kill) = conn.kill.take() {
                        let _ = kill.send(());
                    }
                    let _ = conn.client.cancel().await;
                    Err(anyhow::Error::from(e).context("listing child tools"))
                }
            }
        };

        match attempt.await {
            Ok((mut conn, tools)) => {
                let discovered: Vec<DiscoveredTool> =
                    tools.iter().map(child::convert_tool).collect();
                let count = discovered.len();

                if let Some(exit) = conn.exit.take() {
                    spawn_exit_watcher(Arc::clone(&self), exit);
                }
                *slot = Some(conn);
                drop(slot);

                let context = {
                    let mut shared = self.lock_shared();
                    shared.connected = true;
                    shared.tools = discovered;
                    shared.last_error = None;
                    shared.context.clone()
                };
                if let Some(ctx) = context {
                    ctx.log(&format!("connected ({count} tools)"));
                    ctx.notify_state_change();
                }
                Ok(count)
            }
            Err(e) => {
                drop(slot);
                self.lock_shared().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Closes the client, kills any subprocess, and clears the tool
    /// list. Idempotent.
    async fn disconnect(&self) {
        let conn = self.connection.lock().await.take();
        if let Some(mut conn) = conn {
            if let Some(kill) = conn.kill.take() {
                let _ = kill.send(());
            }
            let _ = conn.client.cancel().await;
        }

        let context = {
            let mut shared = self.lock_shared();
            let was_connected = shared.connected;
            shared.connected = false;
            shared.tools.clear();
            was_connected.then(|| shared.context.clone()).flatten()
        };
        if let Some(ctx) = context {
            ctx.log("disconnected");
            ctx.notify_state_change();
        }
    }

    async fn restart(self: Arc<Self>) -> anyhow::Result<usize> {
        self.disconnect().await;
        self.connect().await
    }

    fn plugin_status(&self) -> PluginStatus {
        let shared = self.lock_shared();
        if shared.connected {
            PluginStatus::green(format!("{} tools", shared.tools.len()))
        } else if shared.last_error.is_some() {
            PluginStatus::red("error")
        } else {
            PluginStatus::gray("disconnected")
        }
    }

    fn status_line(&self) -> String {
        let shared = self.lock_shared();
        let transport = shared
            .config
            .as_ref()
            .map_or_else(|| "unconfigured".to_string(), ProxyConfig::transport_label);

        if shared.connected {
            format!("connected ({} tools) [{transport}]", shared.tools.len())
        } else if let Some(err) = &shared.last_error {
            format!("disconnected [{transport}]: {err}")
        } else {
            format!("disconnected [{transport}]")
        }
    }

    fn debug_dump(&self) -> String {
        let shared = self.lock_shared();
        let config = shared
            .config
            .as_ref()
            .and_then(|c| serde_json::to_string_pretty(c).ok())
            .unwrap_or_else(|| "(none)".to_string());
        let last_error = shared.last_error.as_deref().unwrap_or("(none)");

        let stderr = self.stderr.snapshot();
        let stderr = if stderr.is_empty() {
            "(empty)".to_string()
        } else {
            stderr.join("\n")
        };

        format!("config: {config}\nlast error: {last_error}\nchild stderr:\n{stderr}")
    }
}

/// Marks the instance disconnected when the child dies on its own.
fn spawn_exit_watcher(inner: Arc<ProxyInner>, exit: oneshot::Receiver<Option<i32>>) {
    tokio::spawn(async move {
        let Ok(code) = exit.await else {
            // Deliberate kill; disconnect() already handled the state.
            return;
        };

        let message = Error::ChildExited { code }.to_string();
        let context = {
            let mut shared = inner.lock_shared();
            if !shared.connected {
                return;
            }
            shared.connected = false;
            shared.tools.clear();
            shared.last_error = Some(message.clone());
            shared.context.clone()
        };

        *inner.connection.lock().await = None;

        if let Some(ctx) = context {
            ctx.log(&message);
            ctx.notify_state_change();
        }
    });
}

/// Forwards one re-exported tool to the child client.
struct ProxyToolHandler {
    tool: String,
    inner: Arc<ProxyInner>,
}

#[async_trait]
impl ToolHandler for ProxyToolHandler {
    async fn invoke(&self, params: Value) -> anyhow::Result<Value> {
        let peer = {
            let conn = self.inner.connection.lock().await;
            match conn.as_ref() {
                Some(conn) => conn.client.peer().clone(),
                None => anyhow::bail!("not connected"),
            }
        };

        let arguments = params.as_object().cloned();
        let result = peer
            .call_tool(CallToolRequestParam {
                name: Cow::Owned(self.tool.clone()),
                arguments,
            })
            .await
            .with_context(|| format!("calling child tool '{}'", self.tool))?;

        let text = result
            .content
            .iter()
            .find_map(|content| content.as_text().map(|t| t.text.clone()));

        if result.is_error.unwrap_or(false) {
            anyhow::bail!(
                "{}",
                text.unwrap_or_else(|| "child tool call failed".to_string())
            );
        }

        Ok(Value::String(text.unwrap_or_default()))
    }
}

#[derive(Clone, Copy)]
enum ProxyVerb {
    Connect,
    Disconnect,
    Restart,
    Status,
    Debug,
}

struct ProxyVerbHandler {
    verb: ProxyVerb,
    inner: Arc<ProxyInner>,
}

#[async_trait]
impl CliHandler for ProxyVerbHandler {
    async fn execute(&self, _args: Vec<String>) -> CommandResult {
        match self.verb {
            ProxyVerb::Connect => match Arc::clone(&self.inner).connect().await {
                Ok(count) => CommandResult::ok(format!("connected ({count} tools)")),
                Err(e) => CommandResult::fail(format!("connect failed: {e}")),
            },
            ProxyVerb::Disconnect => {
                self.inner.disconnect().await;
                CommandResult::ok("disconnected")
            }
            ProxyVerb::Restart => match Arc::clone(&self.inner).restart().await {
                Ok(count) => CommandResult::ok(format!("reconnected ({count} tools)")),
                Err(e) => CommandResult::fail(format!("restart failed: {e}")),
            },
            ProxyVerb::Status => CommandResult::ok(self.inner.status_line()),
            ProxyVerb::Debug => CommandResult::ok(self.inner.debug_dump()),
        }
    }
}

/// A plugin whose tools are discovered from an external MCP server.
///
/// Each registered name gets its own instance with its own child client,
/// so one host can front any number of external servers at once.
pub struct ProxyPlugin {
    inner: Arc<ProxyInner>,
}

impl fmt::Debug for ProxyPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyPlugin")
            .field("status", &self.inner.plugin_status())
            .finish_non_exhaustive()
    }
}

impl ProxyPlugin {
    /// Creates an unconfigured instance; `init` supplies the config.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ProxyInner::new()),
        }
    }

    fn verb(&self, name: &str, description: &str, verb: ProxyVerb) -> PluginExport {
        PluginExport::Cli(CliCommandSpec {
            name: name.to_string(),
            description: description.to_string(),
            args: Vec::new(),
            handler: Arc::new(ProxyVerbHandler {
                verb,
                inner: Arc::clone(&self.inner),
            }),
        })
    }
}

impl Default for ProxyPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for ProxyPlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new(
            "mcp-proxy",
            env!("CARGO_PKG_VERSION"),
            "Re-exports tools from an external MCP server",
        )
    }

    async fn init(&self, ctx: PluginContext) -> anyhow::Result<()> {
        let config = ProxyConfig::from_value(ctx.config())?;
        let auto_connect = config.auto_connect;

        {
            let mut shared = self.inner.lock_shared();
            shared.config = Some(config);
            shared.context = Some(ctx.clone());
        }

        if auto_connect
            && let Err(e) = Arc::clone(&self.inner).connect().await
        {
            // Captured as last_error by connect(); the load still succeeds.
            ctx.log(&format!("auto-connect failed: {e}"));
        }

        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        self.inner.disconnect().await;
        Ok(())
    }

    fn exports(&self) -> Vec<PluginExport> {
        let mut exports = vec![
            self.verb("connect", "Connect to the child MCP server", ProxyVerb::Connect),
            self.verb(
                "disconnect",
                "Disconnect from the child MCP server",
                ProxyVerb::Disconnect,
            ),
            self.verb("restart", "Disconnect, then connect again", ProxyVerb::Restart),
            self.verb("status", "Show connection state", ProxyVerb::Status),
            self.verb(
                "debug",
                "Dump config, last error, and recent child stderr",
                ProxyVerb::Debug,
            ),
        ];

        let tools = self.inner.lock_shared().tools.clone();
        for tool in tools {
            exports.push(PluginExport::Tool(ToolDef {
                name: ToolName::new(tool.name.clone()),
                description: tool.description,
                input_schema: tool.input_schema,
                handler: Arc::new(ProxyToolHandler {
                    tool: tool.name,
                    inner: Arc::clone(&self.inner),
                }),
            }));
        }

        exports
    }

    fn status(&self) -> PluginStatus {
        self.inner.plugin_status()
    }

    fn help(&self) -> PluginHelp {
        PluginHelp::new(
            "Hosts a child MCP server and re-exports its tools under this \
             plugin's name.",
        )
        .topic("connect", "Connect to the configured server")
        .topic("disconnect", "Close the connection (kills the subprocess)")
        .topic("restart", "Disconnect, then connect again")
        .topic("status", "Show connection state and tool count")
        .topic("debug", "Dump config, last error, and recent child stderr")
    }
}
