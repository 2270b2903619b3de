//! The plugin manager: instance ownership, lifecycle, aggregated views.

use crate::context::PluginContext;
use crate::events::PluginEvent;
use crate::exports::{CliCommandSpec, PluginExport, ToolHandler};
use crate::manifest::{PluginHelp, PluginManifest, PluginStatus};
use crate::plugin::{Plugin, PluginModules};
use host_core::{Error, PluginName, Result, ToolName};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Capacity of the lifecycle event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct Instance {
    plugin: Arc<dyn Plugin>,
    enabled: bool,
    disabled_tools: HashSet<String>,
}

/// A tool currently visible to MCP clients, renamed to its
/// fully-qualified form and annotated with its origin plugin.
#[derive(Clone)]
pub struct VisibleTool {
    /// Fully-qualified name (`<plugin>_<tool>`).
    pub name: String,
    /// Origin plugin (registered name).
    pub plugin: PluginName,
    /// Local name inside the plugin.
    pub local_name: ToolName,
    /// Tool description.
    pub description: String,
    /// JSON-Schema of the parameters.
    pub input_schema: Value,
    /// The implementation.
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for VisibleTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibleTool")
            .field("name", &self.name)
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}

/// A CLI verb currently visible, tagged with its origin plugin.
#[derive(Debug, Clone)]
pub struct PluginCommand {
    /// Origin plugin (registered name).
    pub plugin: PluginName,
    /// The verb specification.
    pub spec: CliCommandSpec,
}

/// Row in the `plugins` listing.
#[derive(Debug, Clone)]
pub struct PluginOverview {
    /// Registered name.
    pub name: PluginName,
    /// Manifest metadata.
    pub manifest: PluginManifest,
    /// Enabled flag.
    pub enabled: bool,
    /// Current status signal.
    pub status: PluginStatus,
    /// Masked local tool names, sorted.
    pub disabled_tools: Vec<String>,
}

/// Owns every plugin instance and mediates its lifecycle.
///
/// Consumers query aggregated snapshots ([`Self::tools`],
/// [`Self::cli_commands`]) rather than reaching into instances, and
/// subscribe to [`PluginEvent`]s for change notification; the manager
/// knows nothing about the transports observing it.
pub struct PluginManager {
    modules: PluginModules,
    instances: RwLock<BTreeMap<String, Instance>>,
    events: broadcast::Sender<PluginEvent>,
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .instances
            .read()
            .expect("plugin map lock poisoned")
            .keys()
            .cloned()
            .collect();
        f.debug_struct("PluginManager")
            .field("plugins", &names)
            .finish_non_exhaustive()
    }
}

impl PluginManager {
    /// Creates a manager resolving packages against `modules`.
    #[must_use]
    pub fn new(modules: PluginModules) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            modules,
            instances: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    /// Subscribes to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.events.subscribe()
    }

    /// Loads a plugin module under `name`.
    ///
    /// Resolves `package` against the module registry, obtains a fresh
    /// plugin from the factory, validates its shape, and runs `init` with
    /// a new context. Emits [`PluginEvent::Loaded`] on success.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateName`] if `name` is already registered
    /// - [`Error::InvalidPlugin`] on shape errors
    /// - [`Error::LoadFailure`] if the package is unknown or `init`
    ///   rejects (no partial instance is left behind)
    pub async fn load_plugin(
        &self,
        name: &str,
        package: &str,
        config: Value,
        disabled_tools: Vec<String>,
    ) -> Result<()> {
        if self.read_instances().contains_key(name) {
            return Err(Error::DuplicateName {
                name: name.to_string(),
            });
        }

        let factory = self
            .modules
            .resolve(package)
            .ok_or_else(|| Error::LoadFailure {
                name: name.to_string(),
                message: format!("unknown package '{package}'"),
            })?;

        let plugin: Arc<dyn Plugin> = Arc::from(factory());
        validate_shape(name, plugin.as_ref())?;

        let context = PluginContext::new(PluginName::new(name), config, self.events.clone());
        plugin
            .init(context)
            .await
            .map_err(|e| Error::LoadFailure {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        let raced = {
            let mut instances = self.write_instances();
            if instances.contains_key(name) {
                true
            } else {
                instances.insert(
                    name.to_string(),
                    Instance {
                        plugin: Arc::clone(&plugin),
                        enabled: true,
                        disabled_tools: disabled_tools.into_iter().collect(),
                    },
                );
                false
            }
        };
        if raced {
            // Lost a load race for the same name; tear our copy down.
            if let Err(e) = plugin.destroy().await {
                tracing::warn!("[{name}] destroy after load race failed: {e}");
            }
            return Err(Error::DuplicateName {
                name: name.to_string(),
            });
        }

        tracing::info!("Loaded plugin '{name}' from package '{package}'");
        let _ = self.events.send(PluginEvent::Loaded(PluginName::new(name)));
        Ok(())
    }

    /// Destroys and removes a plugin. Emits [`PluginEvent::Unloaded`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPlugin`] when `name` is not registered.
    pub async fn unload_plugin(&self, name: &str) -> Result<()> {
        let instance = self
            .write_instances()
            .remove(name)
            .ok_or_else(|| Error::UnknownPlugin {
                name: name.to_string(),
            })?;

        if let Err(e) = instance.plugin.destroy().await {
            tracing::warn!("[{name}] destroy failed: {e}");
        }

        tracing::info!("Unloaded plugin '{name}'");
        let _ = self
            .events
            .send(PluginEvent::Unloaded(PluginName::new(name)));
        Ok(())
    }

    /// Enables a plugin. Idempotent: enabling an enabled plugin is a
    /// no-op (no hook, no event).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPlugin`] when `name` is not registered.
    pub async fn enable_plugin(&self, name: &str) -> Result<()> {
        let plugin = {
            let mut instances = self.write_instances();
            let instance = instances.get_mut(name).ok_or_else(|| Error::UnknownPlugin {
                name: name.to_string(),
            })?;
            if instance.enabled {
                return Ok(());
            }
            instance.enabled = true;
            Arc::clone(&instance.plugin)
        };

        plugin.on_enable().await;
        let _ = self
            .events
            .send(PluginEvent::Enabled(PluginName::new(name)));
        Ok(())
    }

    /// Disables a plugin; its verbs and tools vanish from the next query.
    /// Idempotent like [`Self::enable_plugin`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPlugin`] when `name` is not registered.
    pub async fn disable_plugin(&self, name: &str) -> Result<()> {
        let plugin = {
            let mut instances = self.write_instances();
            let instance = instances.get_mut(name).ok_or_else(|| Error::UnknownPlugin {
                name: name.to_string(),
            })?;
            if !instance.enabled {
                return Ok(());
            }
            instance.enabled = false;
            Arc::clone(&instance.plugin)
        };

        plugin.on_disable().await;
        let _ = self
            .events
            .send(PluginEvent::Disabled(PluginName::new(name)));
        Ok(())
    }

    /// Unmasks a tool. Permissive: removing an absent mask entry is a
    /// no-op. Emits [`PluginEvent::StateChange`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPlugin`] when `plugin` is not registered.
    pub fn enable_tool(&self, plugin: &str, tool: &str) -> Result<()> {
        {
            let mut instances = self.write_instances();
            let instance = instances
                .get_mut(plugin)
                .ok_or_else(|| Error::UnknownPlugin {
                    name: plugin.to_string(),
                })?;
            instance.disabled_tools.remove(tool);
        }

        let _ = self
            .events
            .send(PluginEvent::StateChange(PluginName::new(plugin)));
        Ok(())
    }

    /// Masks a tool so it disappears from `tools/list`. Emits
    /// [`PluginEvent::StateChange`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPlugin`] when `plugin` is not registered,
    /// or [`Error::UnknownTool`] when the plugin exports no such tool.
    pub fn disable_tool(&self, plugin: &str, tool: &str) -> Result<()> {
        let instance_plugin = {
            let instances = self.read_instances();
            let instance = instances.get(plugin).ok_or_else(|| Error::UnknownPlugin {
                name: plugin.to_string(),
            })?;
            Arc::clone(&instance.plugin)
        };

        let exists = instance_plugin
            .exports()
            .iter()
            .any(|e| matches!(e, PluginExport::Tool(def) if def.name.as_str() == tool));
        if !exists {
            return Err(Error::UnknownTool {
                name: PluginName::new(plugin).qualify(&ToolName::new(tool)),
            });
        }

        {
            let mut instances = self.write_instances();
            let instance = instances
                .get_mut(plugin)
                .ok_or_else(|| Error::UnknownPlugin {
                    name: plugin.to_string(),
                })?;
            instance.disabled_tools.insert(tool.to_string());
        }

        let _ = self
            .events
            .send(PluginEvent::StateChange(PluginName::new(plugin)));
        Ok(())
    }

    /// Currently-visible tools: enabled plugins, unmasked tools, renamed
    /// to their fully-qualified form.
    ///
    /// The list is recomputed on every call; callers hold a consistent
    /// snapshot, never a live view. Export sets can change after load
    /// (the proxy gains tools at connect time), so local-name uniqueness
    /// is enforced here as well: a repeated local name is dropped with a
    /// warning, keeping the first occurrence.
    #[must_use]
    pub fn tools(&self) -> Vec<VisibleTool> {
        let snapshot = self.enabled_snapshot();

        let mut tools = Vec::new();
        for (name, plugin, mask) in snapshot {
            let mut seen: HashSet<String> = HashSet::new();
            for export in plugin.exports() {
                if let PluginExport::Tool(def) = export {
                    if mask.contains(def.name.as_str()) {
                        continue;
                    }
                    if !seen.insert(def.name.as_str().to_string()) {
                        tracing::warn!("[{name}] duplicate tool '{}' ignored", def.name);
                        continue;
                    }
                    tools.push(VisibleTool {
                        name: name.qualify(&def.name),
                        plugin: name.clone(),
                        local_name: def.name,
                        description: def.description,
                        input_schema: def.input_schema,
                        handler: def.handler,
                    });
                }
            }
        }
        tools
    }

    /// Currently-visible CLI verbs, tagged with their origin plugin.
    #[must_use]
    pub fn cli_commands(&self) -> Vec<PluginCommand> {
        let snapshot = self.enabled_snapshot();

        let mut commands = Vec::new();
        for (name, plugin, _mask) in snapshot {
            for export in plugin.exports() {
                if let PluginExport::Cli(spec) = export {
                    commands.push(PluginCommand {
                        plugin: name.clone(),
                        spec,
                    });
                }
            }
        }
        commands
    }

    /// Overview of every registered plugin, load-order sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<PluginOverview> {
        let snapshot: Vec<(String, Arc<dyn Plugin>, bool, Vec<String>)> = self
            .read_instances()
            .iter()
            .map(|(name, instance)| {
                let mut masked: Vec<String> =
                    instance.disabled_tools.iter().cloned().collect();
                masked.sort();
                (
                    name.clone(),
                    Arc::clone(&instance.plugin),
                    instance.enabled,
                    masked,
                )
            })
            .collect();

        snapshot
            .into_iter()
            .map(|(name, plugin, enabled, disabled_tools)| PluginOverview {
                name: PluginName::new(name),
                manifest: plugin.manifest(),
                enabled,
                status: plugin.status(),
                disabled_tools,
            })
            .collect()
    }

    /// Whether a plugin is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.read_instances().contains_key(name)
    }

    /// Registered plugin names, sorted.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<PluginName> {
        self.read_instances()
            .keys()
            .map(|name| PluginName::new(name.clone()))
            .collect()
    }

    /// Splits a fully-qualified tool name back into its plugin and local
    /// parts, resolved against the registered plugin names (names may
    /// contain underscores, so naive splitting would misroute).
    #[must_use]
    pub fn resolve_qualified(&self, qualified: &str) -> Option<(PluginName, ToolName)> {
        PluginName::split_qualified(qualified, &self.plugin_names())
    }

    /// Structured help for one plugin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPlugin`] when `name` is not registered.
    pub fn plugin_help(&self, name: &str) -> Result<PluginHelp> {
        let plugin = {
            let instances = self.read_instances();
            let instance = instances.get(name).ok_or_else(|| Error::UnknownPlugin {
                name: name.to_string(),
            })?;
            Arc::clone(&instance.plugin)
        };
        Ok(plugin.help())
    }

    /// Destroys every plugin, in name order. Used on shutdown.
    pub async fn unload_all(&self) {
        let names: Vec<String> = self.read_instances().keys().cloned().collect();
        for name in names {
            if let Err(e) = self.unload_plugin(&name).await {
                tracing::warn!("Unload of '{name}' failed: {e}");
            }
        }
    }

    fn enabled_snapshot(&self) -> Vec<(PluginName, Arc<dyn Plugin>, HashSet<String>)> {
        self.read_instances()
            .iter()
            .filter(|(_, instance)| instance.enabled)
            .map(|(name, instance)| {
                (
                    PluginName::new(name.clone()),
                    Arc::clone(&instance.plugin),
                    instance.disabled_tools.clone(),
                )
            })
            .collect()
    }

    fn read_instances(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Instance>> {
        self.instances.read().expect("plugin map lock poisoned")
    }

    fn write_instances(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Instance>> {
        self.instances.write().expect("plugin map lock poisoned")
    }
}

fn validate_shape(name: &str, plugin: &dyn Plugin) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidPlugin {
            name: name.to_string(),
            reason: "registration name is empty".to_string(),
        });
    }

    let manifest = plugin.manifest();
    if manifest.name.is_empty() {
        return Err(Error::InvalidPlugin {
            name: name.to_string(),
            reason: "manifest name is empty".to_string(),
        });
    }
    if manifest.version.is_empty() {
        return Err(Error::InvalidPlugin {
            name: name.to_string(),
            reason: "manifest version is empty".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for export in plugin.exports() {
        if let PluginExport::Tool(def) = &export
            && !seen.insert(def.name.as_str().to_string())
        {
            return Err(Error::InvalidPlugin {
                name: name.to_string(),
                reason: format!("duplicate tool '{}'", def.name),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exports::{CommandResult, FnCliHandler, FnToolHandler, ToolDef};
    use serde_json::json;

    /// Fixture exporting one `echo` tool and one `status` verb.
    struct DemoPlugin {
        manifest: PluginManifest,
        fail_init: bool,
    }

    impl DemoPlugin {
        fn new() -> Self {
            Self {
                manifest: PluginManifest::new("demo", "1.0.0", "Demo plugin"),
                fail_init: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl Plugin for DemoPlugin {
        fn manifest(&self) -> PluginManifest {
            self.manifest.clone()
        }

        async fn init(&self, _ctx: PluginContext) -> anyhow::Result<()> {
            if self.fail_init {
                anyhow::bail!("init exploded")
            }
            Ok(())
        }

        fn exports(&self) -> Vec<PluginExport> {
            vec![
                PluginExport::Tool(ToolDef {
                    name: ToolName::new("echo"),
                    description: "Echo a message".to_string(),
                    input_schema: json!({
                        "type": "object",
                        "properties": {"message": {"type": "string"}}
                    }),
                    handler: Arc::new(FnToolHandler(|params: Value| {
                        Ok(params["message"].clone())
                    })),
                }),
                PluginExport::Cli(CliCommandSpec {
                    name: "status".to_string(),
                    description: "Show status".to_string(),
                    args: Vec::new(),
                    handler: Arc::new(FnCliHandler(|_: Vec<String>| CommandResult::ok("fine"))),
                }),
            ]
        }

        fn status(&self) -> PluginStatus {
            PluginStatus::green("ready")
        }

        fn help(&self) -> PluginHelp {
            PluginHelp::new("Demo plugin").topic("echo", "Echo a message")
        }
    }

    fn modules() -> PluginModules {
        let mut modules = PluginModules::new();
        modules.register("demo", || Box::new(DemoPlugin::new()));
        modules.register("broken", || {
            Box::new(DemoPlugin {
                manifest: PluginManifest::new("broken", "1.0.0", "Fails init"),
                fail_init: true,
            })
        });
        modules
    }

    #[tokio::test]
    async fn test_load_exposes_qualified_tools() {
        let manager = PluginManager::new(modules());
        manager
            .load_plugin("demo", "demo", json!({}), Vec::new())
            .await
            .unwrap();

        let tools = manager.tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "demo_echo");
        assert_eq!(tools[0].plugin.as_str(), "demo");
    }

    #[tokio::test]
    async fn test_duplicate_load_rejected() {
        let manager = PluginManager::new(modules());
        manager
            .load_plugin("demo", "demo", json!({}), Vec::new())
            .await
            .unwrap();

        let err = manager
            .load_plugin("demo", "demo", json!({}), Vec::new())
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn test_unknown_package_is_load_failure() {
        let manager = PluginManager::new(modules());
        let err = manager
            .load_plugin("x", "no-such-package", json!({}), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LoadFailure { .. }));
    }

    #[tokio::test]
    async fn test_failed_init_leaves_no_instance() {
        let manager = PluginManager::new(modules());
        let err = manager
            .load_plugin("bad", "broken", json!({}), Vec::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::LoadFailure { ref message, .. } if message == "init exploded"));
        assert!(!manager.contains("bad"));
    }

    #[tokio::test]
    async fn test_load_unload_load_yields_fresh_instance() {
        let manager = PluginManager::new(modules());
        manager
            .load_plugin("demo", "demo", json!({}), Vec::new())
            .await
            .unwrap();
        manager.unload_plugin("demo").await.unwrap();
        assert!(!manager.contains("demo"));
        manager
            .load_plugin("demo", "demo", json!({}), Vec::new())
            .await
            .unwrap();
        assert_eq!(manager.tools().len(), 1);
    }

    #[tokio::test]
    async fn test_unload_unknown_plugin() {
        let manager = PluginManager::new(modules());
        let err = manager.unload_plugin("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_disable_hides_tools_and_verbs() {
        let manager = PluginManager::new(modules());
        manager
            .load_plugin("demo", "demo", json!({}), Vec::new())
            .await
            .unwrap();

        manager.disable_plugin("demo").await.unwrap();
        assert!(manager.tools().is_empty());
        assert!(manager.cli_commands().is_empty());

        manager.enable_plugin("demo").await.unwrap();
        assert_eq!(manager.tools().len(), 1);
        assert_eq!(manager.cli_commands().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_mask_from_config() {
        let manager = PluginManager::new(modules());
        manager
            .load_plugin("demo", "demo", json!({}), vec!["echo".to_string()])
            .await
            .unwrap();

        assert!(manager.tools().is_empty());

        manager.enable_tool("demo", "echo").unwrap();
        assert_eq!(manager.tools().len(), 1);
    }

    #[tokio::test]
    async fn test_disable_then_enable_tool_round_trips() {
        let manager = PluginManager::new(modules());
        manager
            .load_plugin("demo", "demo", json!({}), Vec::new())
            .await
            .unwrap();

        let before: Vec<String> = manager.tools().iter().map(|t| t.name.clone()).collect();
        manager.disable_tool("demo", "echo").unwrap();
        assert!(manager.tools().is_empty());
        manager.enable_tool("demo", "echo").unwrap();
        let after: Vec<String> = manager.tools().iter().map(|t| t.name.clone()).collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_disable_unknown_tool_rejected() {
        let manager = PluginManager::new(modules());
        manager
            .load_plugin("demo", "demo", json!({}), Vec::new())
            .await
            .unwrap();

        let err = manager.disable_tool("demo", "nope").unwrap_err();
        assert!(matches!(err, Error::UnknownTool { ref name } if name == "demo_nope"));

        // enable_tool is permissive about unknown names.
        manager.enable_tool("demo", "nope").unwrap();
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let manager = PluginManager::new(modules());
        let mut rx = manager.subscribe();

        manager
            .load_plugin("demo", "demo", json!({}), Vec::new())
            .await
            .unwrap();
        manager.disable_plugin("demo").await.unwrap();
        manager.enable_plugin("demo").await.unwrap();
        // Idempotent enable emits nothing.
        manager.enable_plugin("demo").await.unwrap();
        manager.unload_plugin("demo").await.unwrap();

        let demo = PluginName::new("demo");
        assert_eq!(rx.try_recv().unwrap(), PluginEvent::Loaded(demo.clone()));
        assert_eq!(rx.try_recv().unwrap(), PluginEvent::Disabled(demo.clone()));
        assert_eq!(rx.try_recv().unwrap(), PluginEvent::Enabled(demo.clone()));
        assert_eq!(rx.try_recv().unwrap(), PluginEvent::Unloaded(demo));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_list_overview() {
        let manager = PluginManager::new(modules());
        manager
            .load_plugin("demo", "demo", json!({}), vec!["echo".to_string()])
            .await
            .unwrap();

        let overview = manager.list();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].name.as_str(), "demo");
        assert!(overview[0].enabled);
        assert_eq!(overview[0].disabled_tools, vec!["echo"]);
        assert_eq!(overview[0].status, PluginStatus::green("ready"));
    }

    #[tokio::test]
    async fn test_same_package_under_two_names() {
        let manager = PluginManager::new(modules());
        manager
            .load_plugin("first", "demo", json!({}), Vec::new())
            .await
            .unwrap();
        manager
            .load_plugin("second", "demo", json!({}), Vec::new())
            .await
            .unwrap();

        let mut names: Vec<String> = manager.tools().iter().map(|t| t.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["first_echo", "second_echo"]);
    }

    #[tokio::test]
    async fn test_resolve_qualified_against_registered_names() {
        let manager = PluginManager::new(modules());
        manager
            .load_plugin("demo", "demo", json!({}), Vec::new())
            .await
            .unwrap();
        manager
            .load_plugin("demo_x", "demo", json!({}), Vec::new())
            .await
            .unwrap();

        // Longest registered prefix wins for underscored names.
        let (plugin, tool) = manager.resolve_qualified("demo_x_echo").unwrap();
        assert_eq!(plugin.as_str(), "demo_x");
        assert_eq!(tool.as_str(), "echo");

        let (plugin, tool) = manager.resolve_qualified("demo_echo").unwrap();
        assert_eq!(plugin.as_str(), "demo");
        assert_eq!(tool.as_str(), "echo");

        assert!(manager.resolve_qualified("ghost_echo").is_none());
    }

    struct MutableExportsPlugin {
        duplicate: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait::async_trait]
    impl Plugin for MutableExportsPlugin {
        fn manifest(&self) -> PluginManifest {
            PluginManifest::new("mutable", "1.0.0", "Exports change at runtime")
        }

        async fn init(&self, _ctx: PluginContext) -> anyhow::Result<()> {
            Ok(())
        }

        fn exports(&self) -> Vec<PluginExport> {
            let def = ToolDef {
                name: ToolName::new("echo"),
                description: String::new(),
                input_schema: json!({"type": "object"}),
                handler: Arc::new(FnToolHandler(|params: Value| Ok(params))),
            };
            if self.duplicate.load(std::sync::atomic::Ordering::SeqCst) {
                vec![PluginExport::Tool(def.clone()), PluginExport::Tool(def)]
            } else {
                vec![PluginExport::Tool(def)]
            }
        }

        fn status(&self) -> PluginStatus {
            PluginStatus::gray("idle")
        }

        fn help(&self) -> PluginHelp {
            PluginHelp::default()
        }
    }

    #[tokio::test]
    async fn test_post_load_duplicate_export_dropped_from_views() {
        let duplicate = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut modules = PluginModules::new();
        let flag = Arc::clone(&duplicate);
        modules.register("mutable", move || {
            Box::new(MutableExportsPlugin {
                duplicate: Arc::clone(&flag),
            })
        });

        let manager = PluginManager::new(modules);
        manager
            .load_plugin("mutable", "mutable", json!({}), Vec::new())
            .await
            .unwrap();
        assert_eq!(manager.tools().len(), 1);

        // The export set grows a duplicate after load; views keep the
        // first occurrence only.
        duplicate.store(true, std::sync::atomic::Ordering::SeqCst);
        let tools = manager.tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "mutable_echo");
    }

    struct DuplicateToolPlugin;

    #[async_trait::async_trait]
    impl Plugin for DuplicateToolPlugin {
        fn manifest(&self) -> PluginManifest {
            PluginManifest::new("dup", "1.0.0", "Exports the same tool twice")
        }

        async fn init(&self, _ctx: PluginContext) -> anyhow::Result<()> {
            Ok(())
        }

        fn exports(&self) -> Vec<PluginExport> {
            let def = ToolDef {
                name: ToolName::new("twice"),
                description: String::new(),
                input_schema: json!({"type": "object"}),
                handler: Arc::new(FnToolHandler(|params: Value| Ok(params))),
            };
            vec![
                PluginExport::Tool(def.clone()),
                PluginExport::Tool(def),
            ]
        }

        fn status(&self) -> PluginStatus {
            PluginStatus::gray("idle")
        }

        fn help(&self) -> PluginHelp {
            PluginHelp::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_local_tool_name_is_invalid() {
        let mut modules = PluginModules::new();
        modules.register("dup", || Box::new(DuplicateToolPlugin));
        let manager = PluginManager::new(modules);

        let err = manager
            .load_plugin("dup", "dup", json!({}), Vec::new())
            .await
            .unwrap_err();
        assert!(err.is_invalid_plugin());
    }
}
