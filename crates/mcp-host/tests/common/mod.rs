//! Shared fixtures for integration tests.

use async_trait::async_trait;
use host_core::ToolName;
use host_plugin::{
    CliCommandSpec, CommandResult, FnCliHandler, FnToolHandler, Plugin, PluginContext,
    PluginExport, PluginHelp, PluginManifest, PluginModules, PluginStatus, ToolDef,
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Exports an `echo` tool, a `danger` tool, and a `status` verb.
pub struct DemoPlugin;

#[async_trait]
impl Plugin for DemoPlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new("demo", "1.0.0", "Demo plugin for tests")
    }

    async fn init(&self, _ctx: PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn exports(&self) -> Vec<PluginExport> {
        vec![
            PluginExport::Tool(ToolDef {
                name: ToolName::new("echo"),
                description: "Echo the message back".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}},
                    "required": ["message"]
                }),
                handler: Arc::new(FnToolHandler(|params: Value| {
                    Ok(params["message"].clone())
                })),
            }),
            PluginExport::Tool(ToolDef {
                name: ToolName::new("danger"),
                description: "A tool commonly masked in config".to_string(),
                input_schema: json!({"type": "object"}),
                handler: Arc::new(FnToolHandler(|_: Value| Ok(Value::String("boom".to_string())))),
            }),
            PluginExport::Cli(CliCommandSpec {
                name: "status".to_string(),
                description: "Report status".to_string(),
                args: Vec::new(),
                handler: Arc::new(FnCliHandler(|args: Vec<String>| {
                    CommandResult::ok(format!("status({})", args.join(",")))
                })),
            }),
        ]
    }

    fn status(&self) -> PluginStatus {
        PluginStatus::green("2 tools")
    }

    fn help(&self) -> PluginHelp {
        PluginHelp::new("Demo plugin").topic("echo", "Echo the message back")
    }
}

/// Module registry with the demo package (registered twice so router
/// verbs can be exercised with two instances).
pub fn test_modules() -> PluginModules {
    let mut modules = PluginModules::new();
    modules.register("demo", || Box::new(DemoPlugin));
    modules
}
