//! Plugin exports: the tagged sum of CLI verbs and MCP tools.
//!
//! CLI verbs and tools share nothing structurally, so exports are a proper
//! sum type instead of duck-typed objects. Handlers are trait objects so a
//! plugin can close over whatever state it owns.

use async_trait::async_trait;
use host_core::ToolName;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Outcome of a CLI verb invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Text shown to the user.
    pub output: String,
    /// Whether the verb succeeded.
    pub success: bool,
}

impl CommandResult {
    /// Successful result with the given output.
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
        }
    }

    /// Failed result with the given output.
    #[must_use]
    pub fn fail(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
        }
    }
}

/// Handler for a CLI verb.
///
/// Infallible by construction: errors are folded into a failed
/// [`CommandResult`].
#[async_trait]
pub trait CliHandler: Send + Sync {
    /// Runs the verb with its (already tokenized) arguments.
    async fn execute(&self, args: Vec<String>) -> CommandResult;
}

/// Handler for an MCP tool.
///
/// Handlers may be long-running; the dispatcher treats every invocation as
/// a suspension point. Failures are reported as errors and surfaced to the
/// peer as `isError` responses.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invokes the tool with its JSON parameters.
    async fn invoke(&self, params: Value) -> anyhow::Result<Value>;
}

/// Adapter: a synchronous closure as a [`ToolHandler`].
///
/// # Examples
///
/// ```
/// use host_plugin::FnToolHandler;
/// use serde_json::Value;
///
/// let handler = FnToolHandler(|params: Value| -> anyhow::Result<Value> {
///     Ok(params["message"].clone())
/// });
/// # let _ = handler;
/// ```
pub struct FnToolHandler<F>(pub F);

impl<F> fmt::Debug for FnToolHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnToolHandler")
    }
}

#[async_trait]
impl<F> ToolHandler for FnToolHandler<F>
where
    F: Fn(Value) -> anyhow::Result<Value> + Send + Sync,
{
    async fn invoke(&self, params: Value) -> anyhow::Result<Value> {
        (self.0)(params)
    }
}

/// Adapter: a synchronous closure as a [`CliHandler`].
pub struct FnCliHandler<F>(pub F);

impl<F> fmt::Debug for FnCliHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCliHandler")
    }
}

#[async_trait]
impl<F> CliHandler for FnCliHandler<F>
where
    F: Fn(Vec<String>) -> CommandResult + Send + Sync,
{
    async fn execute(&self, args: Vec<String>) -> CommandResult {
        (self.0)(args)
    }
}

/// Declared argument of a CLI verb.
///
/// `choices` are completion hints only; the runtime never enforces them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgSpec {
    /// Argument name.
    pub name: String,
    /// Whether the argument must be present.
    pub required: bool,
    /// Enumerated completion candidates.
    pub choices: Vec<String>,
}

impl ArgSpec {
    /// Required argument.
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            choices: Vec::new(),
        }
    }

    /// Optional argument.
    #[must_use]
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            choices: Vec::new(),
        }
    }

    /// Attaches completion choices (builder style).
    #[must_use]
    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = choices.iter().map(ToString::to_string).collect();
        self
    }
}

/// A CLI verb contributed by a plugin.
#[derive(Clone)]
pub struct CliCommandSpec {
    /// Verb name as typed by the user.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Declared arguments (for help and completion).
    pub args: Vec<ArgSpec>,
    /// The verb implementation.
    pub handler: Arc<dyn CliHandler>,
}

impl fmt::Debug for CliCommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliCommandSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// An MCP tool contributed by a plugin.
#[derive(Clone)]
pub struct ToolDef {
    /// Local (unqualified) tool name.
    pub name: ToolName,
    /// One-line description surfaced in `tools/list`.
    pub description: String,
    /// JSON-Schema object describing the parameters.
    pub input_schema: Value,
    /// The tool implementation.
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDef")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// One entry of a plugin's export mapping.
#[derive(Debug, Clone)]
pub enum PluginExport {
    /// A CLI verb for the interactive shell.
    Cli(CliCommandSpec),
    /// An MCP tool for `tools/list` / `tools/call`.
    Tool(ToolDef),
}

impl PluginExport {
    /// The export's name (verb name or local tool name).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Cli(spec) => &spec.name,
            Self::Tool(def) => def.name.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_result_constructors() {
        let ok = CommandResult::ok("done");
        assert!(ok.success);
        assert_eq!(ok.output, "done");

        let fail = CommandResult::fail("nope");
        assert!(!fail.success);
    }

    #[tokio::test]
    async fn test_fn_tool_handler_adapts_closure() {
        let handler = FnToolHandler(|params: Value| Ok(json!({"echoed": params})));
        let result = handler.invoke(json!("hi")).await.unwrap();
        assert_eq!(result["echoed"], "hi");
    }

    #[tokio::test]
    async fn test_fn_cli_handler_adapts_closure() {
        let handler = FnCliHandler(|args: Vec<String>| CommandResult::ok(args.join(",")));
        let result = handler.execute(vec!["a".to_string(), "b".to_string()]).await;
        assert_eq!(result.output, "a,b");
    }

    #[test]
    fn test_export_name() {
        let tool = PluginExport::Tool(ToolDef {
            name: ToolName::new("echo"),
            description: "Echo".to_string(),
            input_schema: json!({"type": "object"}),
            handler: Arc::new(FnToolHandler(|params: Value| Ok(params))),
        });
        assert_eq!(tool.name(), "echo");

        let verb = PluginExport::Cli(CliCommandSpec {
            name: "status".to_string(),
            description: "Status".to_string(),
            args: vec![ArgSpec::optional("verbose").with_choices(&["on", "off"])],
            handler: Arc::new(FnCliHandler(|_: Vec<String>| CommandResult::ok(""))),
        });
        assert_eq!(verb.name(), "status");
    }
}
