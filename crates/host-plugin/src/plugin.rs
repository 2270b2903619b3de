//! The plugin contract and the module registry that resolves packages.

use crate::context::PluginContext;
use crate::exports::PluginExport;
use crate::manifest::{PluginHelp, PluginManifest, PluginStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Contract every plugin implements.
///
/// A plugin is created by its module's factory, initialized once with a
/// [`PluginContext`], and destroyed on unload. Between init and destroy it
/// is either enabled or disabled (it starts enabled); the optional
/// `on_enable` / `on_disable` hooks observe those transitions.
///
/// `exports()` is recomputed on every query: a plugin whose surface
/// changes at runtime (the proxy after connecting to its child) simply
/// returns the current set.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Identity metadata.
    fn manifest(&self) -> PluginManifest;

    /// Called once after construction. A rejected init aborts the load and
    /// leaves no instance behind.
    async fn init(&self, ctx: PluginContext) -> anyhow::Result<()>;

    /// Called once before the instance is dropped on unload.
    async fn destroy(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Observes the disabled→enabled transition.
    async fn on_enable(&self) {}

    /// Observes the enabled→disabled transition.
    async fn on_disable(&self) {}

    /// Current export mapping (CLI verbs and tools).
    fn exports(&self) -> Vec<PluginExport>;

    /// Current status signal for the UI.
    fn status(&self) -> PluginStatus;

    /// Structured documentation for the `help` verb.
    fn help(&self) -> PluginHelp;
}

/// Constructor invoked once per registered name.
///
/// Packages that support multiple independent instances (the proxy)
/// return a fresh plugin per call; singleton packages may return the same
/// closed-over behavior each time, uniform at the call site.
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Registry mapping package specifiers to plugin factories.
///
/// This is the module-resolution step: there is no dynamic code loading,
/// so every loadable package registers its constructor here (built-ins at
/// startup, fixtures in tests).
///
/// # Examples
///
/// ```
/// use host_plugin::PluginModules;
///
/// let modules = PluginModules::new();
/// assert!(modules.resolve("missing").is_none());
/// ```
#[derive(Clone, Default)]
pub struct PluginModules {
    factories: HashMap<String, PluginFactory>,
}

impl fmt::Debug for PluginModules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut packages: Vec<&String> = self.factories.keys().collect();
        packages.sort();
        f.debug_struct("PluginModules")
            .field("packages", &packages)
            .finish()
    }
}

impl PluginModules {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a package constructor, replacing any previous one.
    pub fn register(
        &mut self,
        package: impl Into<String>,
        factory: impl Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    ) {
        self.factories.insert(package.into(), Arc::new(factory));
    }

    /// Resolves a package specifier to its factory.
    #[must_use]
    pub fn resolve(&self, package: &str) -> Option<PluginFactory> {
        self.factories.get(package).cloned()
    }

    /// Registered package specifiers, sorted.
    #[must_use]
    pub fn packages(&self) -> Vec<String> {
        let mut packages: Vec<String> = self.factories.keys().cloned().collect();
        packages.sort();
        packages
    }
}
