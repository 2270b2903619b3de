//! End-to-end shell flows through the assembled application context.

mod common;

use common::test_modules;
use host_core::{HostConfig, PluginEntry};
use host_telemetry::TelemetryStore;
use mcp_host::AppContext;
use serde_json::json;
use std::sync::Arc;

async fn app_with(plugins: &[(&str, &[&str])]) -> Arc<AppContext> {
    let mut config = HostConfig::default();
    for (name, disabled) in plugins {
        let mut entry = PluginEntry::new("demo");
        entry.config = json!({});
        entry.disabled_tools = disabled.iter().map(ToString::to_string).collect();
        config.plugins.insert((*name).to_string(), entry);
    }

    AppContext::initialize(config, test_modules(), Arc::new(TelemetryStore::new(1000)))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_call_verb_round_trip() {
    let app = app_with(&[("demo", &[])]).await;

    let result = app.commands.dispatch("call demo echo message=hi").await;
    assert!(result.success);
    assert_eq!(result.output, "hi");

    let history = app.telemetry.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tool, "demo_echo");
    assert!(history[0].success);
}

#[tokio::test]
async fn test_call_verb_quoted_value() {
    let app = app_with(&[("demo", &[])]).await;

    let result = app
        .commands
        .dispatch(r#"call demo echo message="hello world""#)
        .await;
    assert!(result.success);
    assert_eq!(result.output, "hello world");
}

#[tokio::test]
async fn test_call_verb_json_values_decode() {
    let app = app_with(&[("demo", &[])]).await;

    // A JSON number decodes typed; the echo tool returns it unchanged,
    // and the dispatcher pretty-prints the non-string result.
    let result = app.commands.dispatch("call demo echo message=42").await;
    assert!(result.success);
    assert_eq!(result.output, "42");
}

#[tokio::test]
async fn test_empty_input_is_noop() {
    let app = app_with(&[("demo", &[])]).await;
    let result = app.commands.dispatch("   ").await;
    assert!(result.success);
    assert_eq!(result.output, "");
    assert!(app.telemetry.history().is_empty());
}

#[tokio::test]
async fn test_plugin_disable_hides_tools() {
    let app = app_with(&[("demo", &[])]).await;

    let result = app.commands.dispatch("plugins disable demo").await;
    assert!(result.success);

    let tools = app.commands.dispatch("tools list").await;
    assert_eq!(tools.output, "No tools visible");

    let call = app.commands.dispatch("call demo echo message=hi").await;
    assert!(!call.success);
    assert_eq!(call.output, "Unknown tool: demo_echo");
}

#[tokio::test]
async fn test_config_tool_mask_applies() {
    let app = app_with(&[("fs", &["danger"])]).await;

    let tools = app.commands.dispatch("tools").await;
    assert!(tools.output.contains("fs_echo"));
    assert!(!tools.output.contains("fs_danger"));

    let call = app.commands.dispatch("call fs danger").await;
    assert!(!call.success);
    assert_eq!(call.output, "Unknown tool: fs_danger");

    // Unmask and the tool comes back.
    let enable = app.commands.dispatch("tools enable fs danger").await;
    assert!(enable.success);
    let call = app.commands.dispatch("call fs danger").await;
    assert!(call.success);
    assert_eq!(call.output, "boom");
}

#[tokio::test]
async fn test_tools_verbs_accept_qualified_names() {
    let app = app_with(&[("demo", &[])]).await;

    let disabled = app.commands.dispatch("tools disable demo_danger").await;
    assert!(disabled.success);
    let tools = app.commands.dispatch("tools list").await;
    assert!(!tools.output.contains("demo_danger"));

    let enabled = app.commands.dispatch("tools enable demo_danger").await;
    assert!(enabled.success);
    let tools = app.commands.dispatch("tools list").await;
    assert!(tools.output.contains("demo_danger"));

    let unknown = app.commands.dispatch("tools disable ghost_danger").await;
    assert!(!unknown.success);
    assert_eq!(unknown.output, "Unknown tool: ghost_danger");
}

#[tokio::test]
async fn test_router_verb_with_two_claimants() {
    let app = app_with(&[("a", &[]), ("b", &[])]).await;

    let bare = app.commands.dispatch("status").await;
    assert!(!bare.success);
    assert!(bare.output.contains("a, b"));

    let routed = app.commands.dispatch("status a extra").await;
    assert!(routed.success);
    assert_eq!(routed.output, "[a] status(extra)");
}

#[tokio::test]
async fn test_logs_count_and_clear() {
    let app = app_with(&[("demo", &[])]).await;
    for _ in 0..3 {
        app.commands.dispatch("call demo echo message=x").await;
    }

    let two = app.commands.dispatch("logs 2").await;
    assert_eq!(two.output.lines().count(), 2);

    let cleared = app.commands.dispatch("logs clear").await;
    assert!(cleared.success);
    let after = app.commands.dispatch("logs").await;
    assert_eq!(after.output, "No calls recorded");
}

#[tokio::test]
async fn test_stats_totals_and_reset() {
    let app = app_with(&[("demo", &[])]).await;
    for _ in 0..4 {
        app.commands.dispatch("call demo echo message=x").await;
    }
    app.commands.dispatch("call demo missing").await;

    let stats = app.commands.dispatch("stats").await;
    assert!(stats.output.contains("5 calls (4 ok, 1 err)"));

    let per_tool = app.commands.dispatch("stats demo_echo").await;
    assert!(per_tool.success);
    assert!(per_tool.output.contains("4 calls"));

    let unknown = app.commands.dispatch("stats demo_nope").await;
    assert!(!unknown.success);

    let reset = app.commands.dispatch("stats reset").await;
    assert!(reset.success);
    assert_eq!(app.telemetry.stats().totals.calls, 0);
}

#[tokio::test]
async fn test_serve_and_stop() {
    let app = app_with(&[("demo", &[])]).await;

    let started = app.commands.dispatch("serve 0").await;
    assert!(started.success, "{}", started.output);
    assert!(started.output.contains("listening on port"));

    let again = app.commands.dispatch("serve 0").await;
    assert!(!again.success);

    let stopped = app.commands.dispatch("stop").await;
    assert!(stopped.success);

    let idle = app.commands.dispatch("stop").await;
    assert!(!idle.success);
    assert_eq!(idle.output, "Not serving");
}

#[tokio::test]
async fn test_exit_requests_shutdown() {
    let app = app_with(&[]).await;
    assert!(!app.shutdown_requested());

    let result = app.commands.dispatch("exit").await;
    assert!(result.success);
    assert!(app.shutdown_requested());

    app.shutdown().await;
}

#[tokio::test]
async fn test_help_lists_builtins_and_plugin_verbs() {
    let app = app_with(&[("demo", &[])]).await;

    let help = app.commands.dispatch("help").await;
    assert!(help.output.contains("call"));
    assert!(help.output.contains("Plugin commands:"));
    assert!(help.output.contains("[demo]"));

    let topic = app.commands.dispatch("help demo").await;
    assert!(topic.success);
    assert!(topic.output.contains("Demo plugin"));

    let missing = app.commands.dispatch("help nope").await;
    assert!(!missing.success);
}

#[tokio::test]
async fn test_unknown_command_fails() {
    let app = app_with(&[]).await;
    let result = app.commands.dispatch("frobnicate now").await;
    assert!(!result.success);
    assert_eq!(result.output, "Unknown command: frobnicate");
}

#[tokio::test]
async fn test_plugins_table_lists_masked_tools() {
    let app = app_with(&[("fs", &["danger"])]).await;
    let table = app.commands.dispatch("plugins").await;
    assert!(table.output.contains("fs"));
    assert!(table.output.contains("enabled"));
    assert!(table.output.contains("masked: danger"));
}
