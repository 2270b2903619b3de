//! Built-in verbs owned by the runtime.
//!
//! These are always authoritative: a plugin claiming one of these names
//! is ignored with a warning. Handlers fold every failure into a failed
//! `CommandResult`; nothing here panics the shell.

use crate::app::AppShared;
use async_trait::async_trait;
use host_core::{ClientId, Error, Result};
use host_dispatch::{BuiltinCommand, CommandRegistry, ToolDispatcher};
use host_plugin::{ArgSpec, CliHandler, CommandResult, PluginManager, StatusIndicator};
use host_server::spawn_sse;
use host_telemetry::{TelemetryStore, ToolCallRecord};
use serde_json::Value;
use std::sync::Arc;

/// Fixed verb set with the descriptions shown by `help`.
const BUILTIN_SUMMARY: &[(&str, &str)] = &[
    ("help", "Show available commands, or help for one topic"),
    ("plugins", "List plugins, or enable/disable one"),
    ("tools", "List visible tools, or enable/disable one"),
    ("call", "Invoke a tool: call <plugin> <tool> [key=value ...]"),
    ("logs", "Show recent calls, or: on | off | clear | <count>"),
    ("stats", "Show call statistics, or: <tool> | reset"),
    ("serve", "Start the SSE transport: serve [port]"),
    ("stop", "Stop the SSE transport"),
    ("clear", "Clear the screen"),
    ("exit", "Leave the shell"),
];

/// Registers the whole built-in verb set.
///
/// Propagates duplicate-name errors from the registry (programming
/// error; the set above is statically unique).
pub(crate) fn register_builtins(
    registry: &mut CommandRegistry,
    manager: &Arc<PluginManager>,
    telemetry: &Arc<TelemetryStore>,
    dispatcher: &Arc<ToolDispatcher>,
    shared: &Arc<AppShared>,
) -> Result<()> {
    let commands: Vec<BuiltinCommand> = vec![
        BuiltinCommand {
            name: "help".to_string(),
            aliases: vec!["h".to_string()],
            description: describe("help"),
            args: vec![ArgSpec::optional("topic")],
            handler: Arc::new(HelpCommand {
                manager: Arc::clone(manager),
            }),
        },
        BuiltinCommand {
            name: "plugins".to_string(),
            aliases: Vec::new(),
            description: describe("plugins"),
            args: vec![
                ArgSpec::optional("action").with_choices(&["list", "enable", "disable"]),
                ArgSpec::optional("name"),
            ],
            handler: Arc::new(PluginsCommand {
                manager: Arc::clone(manager),
            }),
        },
        BuiltinCommand {
            name: "tools".to_string(),
            aliases: Vec::new(),
            description: describe("tools"),
            args: vec![
                ArgSpec::optional("action").with_choices(&["list", "enable", "disable"]),
                ArgSpec::optional("plugin"),
                ArgSpec::optional("tool"),
            ],
            handler: Arc::new(ToolsCommand {
                manager: Arc::clone(manager),
            }),
        },
        BuiltinCommand {
            name: "call".to_string(),
            aliases: Vec::new(),
            description: describe("call"),
            args: vec![ArgSpec::required("plugin"), ArgSpec::required("tool")],
            handler: Arc::new(CallCommand {
                dispatcher: Arc::clone(dispatcher),
            }),
        },
        BuiltinCommand {
            name: "logs".to_string(),
            aliases: Vec::new(),
            description: describe("logs"),
            args: vec![ArgSpec::optional("action").with_choices(&["on", "off", "clear"])],
            handler: Arc::new(LogsCommand {
                telemetry: Arc::clone(telemetry),
                shared: Arc::clone(shared),
            }),
        },
        BuiltinCommand {
            name: "stats".to_string(),
            aliases: Vec::new(),
            description: describe("stats"),
            args: vec![ArgSpec::optional("tool").with_choices(&["reset"])],
            handler: Arc::new(StatsCommand {
                telemetry: Arc::clone(telemetry),
            }),
        },
        BuiltinCommand {
            name: "serve".to_string(),
            aliases: Vec::new(),
            description: describe("serve"),
            args: vec![ArgSpec::optional("port")],
            handler: Arc::new(ServeCommand {
                manager: Arc::clone(manager),
                dispatcher: Arc::clone(dispatcher),
                shared: Arc::clone(shared),
            }),
        },
        BuiltinCommand {
            name: "stop".to_string(),
            aliases: Vec::new(),
            description: describe("stop"),
            args: Vec::new(),
            handler: Arc::new(StopCommand {
                shared: Arc::clone(shared),
            }),
        },
        BuiltinCommand {
            name: "clear".to_string(),
            aliases: Vec::new(),
            description: describe("clear"),
            args: Vec::new(),
            handler: Arc::new(ClearCommand),
        },
        BuiltinCommand {
            name: "exit".to_string(),
            aliases: vec!["quit".to_string()],
            description: describe("exit"),
            args: Vec::new(),
            handler: Arc::new(ExitCommand {
                shared: Arc::clone(shared),
            }),
        },
    ];

    for command in commands {
        registry.register_builtin(command)?;
    }
    Ok(())
}

fn describe(name: &str) -> String {
    BUILTIN_SUMMARY
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, d)| (*d).to_string())
        .unwrap_or_default()
}

fn indicator_label(indicator: StatusIndicator) -> &'static str {
    match indicator {
        StatusIndicator::Green => "green",
        StatusIndicator::Yellow => "yellow",
        StatusIndicator::Red => "red",
        StatusIndicator::Gray => "gray",
    }
}

/// Plain-text plugin table, shared by the `plugins` verb and the
/// top-level `plugins` subcommand.
#[must_use]
pub fn render_plugin_table(manager: &PluginManager) -> String {
    let overview = manager.list();
    if overview.is_empty() {
        return "No plugins loaded".to_string();
    }

    let mut lines = Vec::with_capacity(overview.len());
    for plugin in overview {
        let state = if plugin.enabled { "enabled" } else { "disabled" };
        let mut line = format!(
            "{:<14} {:<9} {:<7} v{:<9} {}",
            plugin.name,
            state,
            indicator_label(plugin.status.indicator),
            plugin.manifest.version,
            plugin.status.text,
        );
        if !plugin.disabled_tools.is_empty() {
            line.push_str(&format!("  (masked: {})", plugin.disabled_tools.join(", ")));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn format_record(record: &ToolCallRecord) -> String {
    let status = if record.success { "ok" } else { "err" };
    let mut line = format!(
        "{} {:<10} {:<24} {:<3} {}ms {}B/{}B",
        record.timestamp.format("%H:%M:%S"),
        record.client,
        record.tool,
        status,
        record.duration_ms,
        record.request_bytes,
        record.response_bytes,
    );
    if let Some(error) = &record.error {
        line.push_str(&format!("  {error}"));
    }
    line
}

// ---------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------

struct HelpCommand {
    manager: Arc<PluginManager>,
}

#[async_trait]
impl CliHandler for HelpCommand {
    async fn execute(&self, args: Vec<String>) -> CommandResult {
        if let Some(topic) = args.first() {
            if let Ok(help) = self.manager.plugin_help(topic) {
                let mut out = format!("[{topic}] {}", help.summary);
                for entry in help.topics {
                    out.push_str(&format!("\n  {:<12} {}", entry.name, entry.description));
                }
                return CommandResult::ok(out);
            }

            let lowered = topic.to_lowercase();
            if let Some((name, description)) =
                BUILTIN_SUMMARY.iter().find(|(n, _)| *n == lowered)
            {
                return CommandResult::ok(format!("{name}: {description}"));
            }

            return CommandResult::fail(format!("No help for '{topic}'"));
        }

        let mut out = String::from("Built-in commands:");
        for (name, description) in BUILTIN_SUMMARY {
            out.push_str(&format!("\n  {name:<12} {description}"));
        }

        let claims = self.manager.cli_commands();
        if !claims.is_empty() {
            out.push_str("\n\nPlugin commands:");
            for claim in claims {
                out.push_str(&format!(
                    "\n  {:<12} [{}] {}",
                    claim.spec.name, claim.plugin, claim.spec.description
                ));
            }
        }

        CommandResult::ok(out)
    }
}

struct PluginsCommand {
    manager: Arc<PluginManager>,
}

#[async_trait]
impl CliHandler for PluginsCommand {
    async fn execute(&self, args: Vec<String>) -> CommandResult {
        match args.first().map(String::as_str) {
            None | Some("list") => CommandResult::ok(render_plugin_table(&self.manager)),
            Some("enable") => {
                let Some(name) = args.get(1) else {
                    return CommandResult::fail("Usage: plugins enable <name>");
                };
                match self.manager.enable_plugin(name).await {
                    Ok(()) => CommandResult::ok(format!("Plugin '{name}' enabled")),
                    Err(e) => CommandResult::fail(e.to_string()),
                }
            }
            Some("disable") => {
                let Some(name) = args.get(1) else {
                    return CommandResult::fail("Usage: plugins disable <name>");
                };
                match self.manager.disable_plugin(name).await {
                    Ok(()) => CommandResult::ok(format!("Plugin '{name}' disabled")),
                    Err(e) => CommandResult::fail(e.to_string()),
                }
            }
            Some(other) => {
                CommandResult::fail(format!("Unknown action '{other}'; try list, enable, disable"))
            }
        }
    }
}

struct ToolsCommand {
    manager: Arc<PluginManager>,
}

#[async_trait]
impl CliHandler for ToolsCommand {
    async fn execute(&self, args: Vec<String>) -> CommandResult {
        match args.first().map(String::as_str) {
            None | Some("list") => {
                let tools = self.manager.tools();
                if tools.is_empty() {
                    return CommandResult::ok("No tools visible");
                }
                let lines: Vec<String> = tools
                    .iter()
                    .map(|t| format!("{:<28} {}", t.name, t.description))
                    .collect();
                CommandResult::ok(lines.join("\n"))
            }
            Some(action @ ("enable" | "disable")) => {
                // Either `<plugin> <tool>` or the qualified form shown by
                // `tools list`.
                let (plugin, tool) = match (args.get(1), args.get(2)) {
                    (Some(plugin), Some(tool)) => (plugin.clone(), tool.clone()),
                    (Some(qualified), None) => match self.manager.resolve_qualified(qualified) {
                        Some((plugin, tool)) => (plugin.into_inner(), tool.into_inner()),
                        None => {
                            return CommandResult::fail(
                                Error::UnknownTool {
                                    name: qualified.clone(),
                                }
                                .to_string(),
                            );
                        }
                    },
                    _ => {
                        return CommandResult::fail(format!(
                            "Usage: tools {action} <plugin> <tool>"
                        ));
                    }
                };

                let result = if action == "enable" {
                    self.manager.enable_tool(&plugin, &tool)
                } else {
                    self.manager.disable_tool(&plugin, &tool)
                };
                match result {
                    Ok(()) => CommandResult::ok(format!("Tool '{plugin}_{tool}' {action}d")),
                    Err(e) => CommandResult::fail(e.to_string()),
                }
            }
            Some(other) => {
                CommandResult::fail(format!("Unknown action '{other}'; try list, enable, disable"))
            }
        }
    }
}

struct CallCommand {
    dispatcher: Arc<ToolDispatcher>,
}

#[async_trait]
impl CliHandler for CallCommand {
    async fn execute(&self, args: Vec<String>) -> CommandResult {
        let (Some(plugin), Some(tool)) = (args.first(), args.get(1)) else {
            return CommandResult::fail("Usage: call <plugin> <tool> [key=value ...]");
        };

        let mut params = serde_json::Map::new();
        for arg in &args[2..] {
            let Some((key, raw)) = arg.split_once('=') else {
                return CommandResult::fail(format!("Argument '{arg}' is not key=value"));
            };
            // JSON values pass through typed; anything else is a string.
            let value = serde_json::from_str(raw)
                .unwrap_or_else(|_| Value::String(raw.to_string()));
            params.insert(key.to_string(), value);
        }

        let name = format!("{plugin}_{tool}");
        let outcome = self
            .dispatcher
            .dispatch(&name, Value::Object(params), &ClientId::cli())
            .await;

        CommandResult {
            output: outcome.text().unwrap_or_default().to_string(),
            success: !outcome.is_error,
        }
    }
}

struct LogsCommand {
    telemetry: Arc<TelemetryStore>,
    shared: Arc<AppShared>,
}

impl LogsCommand {
    fn render_recent(&self, count: usize) -> CommandResult {
        let records = self.telemetry.recent(count);
        if records.is_empty() {
            return CommandResult::ok("No calls recorded");
        }
        let lines: Vec<String> = records.iter().map(format_record).collect();
        CommandResult::ok(lines.join("\n"))
    }
}

#[async_trait]
impl CliHandler for LogsCommand {
    async fn execute(&self, args: Vec<String>) -> CommandResult {
        match args.first().map(String::as_str) {
            Some("on") => {
                let mut slot = self.shared.logs.lock().expect("logs lock poisoned");
                if slot.is_some() {
                    return CommandResult::ok("Live logs already on");
                }
                let id = self
                    .telemetry
                    .subscribe(|record| println!("{}", format_record(record)));
                *slot = Some(id);
                CommandResult::ok("Live logs on")
            }
            Some("off") => {
                let taken = self
                    .shared
                    .logs
                    .lock()
                    .expect("logs lock poisoned")
                    .take();
                match taken {
                    Some(id) => {
                        self.telemetry.unsubscribe(id);
                        CommandResult::ok("Live logs off")
                    }
                    None => CommandResult::ok("Live logs already off"),
                }
            }
            Some("clear") => {
                self.telemetry.clear_history();
                CommandResult::ok("History cleared")
            }
            Some(raw) => match raw.parse::<usize>() {
                Ok(count) => self.render_recent(count),
                Err(_) => {
                    CommandResult::fail(format!("Unknown action '{raw}'; try on, off, clear, or a count"))
                }
            },
            None => self.render_recent(20),
        }
    }
}

struct StatsCommand {
    telemetry: Arc<TelemetryStore>,
}

#[async_trait]
impl CliHandler for StatsCommand {
    async fn execute(&self, args: Vec<String>) -> CommandResult {
        match args.first().map(String::as_str) {
            Some("reset") => {
                self.telemetry.reset_stats();
                CommandResult::ok("Statistics reset")
            }
            Some(tool) => {
                let stats = self.telemetry.stats();
                match stats.tools.get(tool) {
                    Some(entry) => CommandResult::ok(format!(
                        "{tool}: {} calls ({} ok, {} err), {}ms total, {}B in / {}B out",
                        entry.calls,
                        entry.success,
                        entry.errors,
                        entry.total_duration_ms,
                        entry.total_request_bytes,
                        entry.total_response_bytes,
                    )),
                    None => CommandResult::fail(
                        Error::UnknownTool {
                            name: tool.to_string(),
                        }
                        .to_string(),
                    ),
                }
            }
            None => {
                let stats = self.telemetry.stats();
                let mut out = format!(
                    "since {}\ntotals: {} calls ({} ok, {} err), {}ms, {}B in / {}B out",
                    stats.since.format("%Y-%m-%d %H:%M:%S"),
                    stats.totals.calls,
                    stats.totals.success,
                    stats.totals.errors,
                    stats.totals.total_duration_ms,
                    stats.totals.total_request_bytes,
                    stats.totals.total_response_bytes,
                );
                for (name, entry) in &stats.tools {
                    out.push_str(&format!(
                        "\n  {name:<28} {} calls ({} ok, {} err)",
                        entry.calls, entry.success, entry.errors
                    ));
                }
                CommandResult::ok(out)
            }
        }
    }
}

struct ServeCommand {
    manager: Arc<PluginManager>,
    dispatcher: Arc<ToolDispatcher>,
    shared: Arc<AppShared>,
}

#[async_trait]
impl CliHandler for ServeCommand {
    async fn execute(&self, args: Vec<String>) -> CommandResult {
        let port = match args.first() {
            Some(raw) => match raw.parse::<u16>() {
                Ok(port) => port,
                Err(_) => return CommandResult::fail(format!("Invalid port '{raw}'")),
            },
            None => self.shared.default_port,
        };

        let mut slot = self.shared.sse.lock().await;
        if slot.is_some() {
            return CommandResult::fail("Already serving; use 'stop' first");
        }

        match spawn_sse(
            Arc::clone(&self.manager),
            Arc::clone(&self.dispatcher),
            port,
        )
        .await
        {
            Ok(handle) => {
                let port = handle.port();
                *slot = Some(handle);
                CommandResult::ok(format!("SSE transport listening on port {port}"))
            }
            Err(e) => CommandResult::fail(e.to_string()),
        }
    }
}

struct StopCommand {
    shared: Arc<AppShared>,
}

#[async_trait]
impl CliHandler for StopCommand {
    async fn execute(&self, _args: Vec<String>) -> CommandResult {
        let taken = self.shared.sse.lock().await.take();
        match taken {
            Some(handle) => {
                handle.stop().await;
                CommandResult::ok("SSE transport stopped")
            }
            None => CommandResult::fail("Not serving"),
        }
    }
}

struct ClearCommand;

#[async_trait]
impl CliHandler for ClearCommand {
    async fn execute(&self, _args: Vec<String>) -> CommandResult {
        // ANSI clear-screen plus cursor home.
        CommandResult::ok("\x1b[2J\x1b[1;1H")
    }
}

struct ExitCommand {
    shared: Arc<AppShared>,
}

#[async_trait]
impl CliHandler for ExitCommand {
    async fn execute(&self, _args: Vec<String>) -> CommandResult {
        self.shared
            .shutdown
            .store(true, std::sync::atomic::Ordering::SeqCst);
        CommandResult::ok("Shutting down")
    }
}
