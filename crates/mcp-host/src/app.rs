//! Application context: the explicit owner of the shared singletons.
//!
//! Everything the verbs and transports touch (plugin manager, telemetry,
//! dispatcher, command registry) hangs off one [`AppContext`] value that
//! is constructed at startup and passed down. Tests that need isolation
//! build a fresh context with their own module registry and an in-memory
//! telemetry store.

use crate::builtins;
use host_core::{HostConfig, Result};
use host_dispatch::{CommandRegistry, ToolDispatcher};
use host_plugin::{PluginManager, PluginModules};
use host_server::SseServerHandle;
use host_telemetry::{SubscriptionId, TelemetryStore};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex as AsyncMutex;

/// Mutable app-level state shared with the built-in verb handlers.
pub(crate) struct AppShared {
    /// The background SSE listener started by the `serve` verb.
    pub sse: AsyncMutex<Option<SseServerHandle>>,
    /// Set by the `exit` verb; the shell loop checks it after dispatch.
    pub shutdown: AtomicBool,
    /// Live-log subscription installed by `logs on`.
    pub logs: Mutex<Option<SubscriptionId>>,
    /// Port used by `serve` when none is given.
    pub default_port: u16,
}

/// The assembled runtime: configuration, singletons, and command surface.
pub struct AppContext {
    /// Normalized configuration the context was built from.
    pub config: HostConfig,
    /// Plugin instances and lifecycle.
    pub manager: Arc<PluginManager>,
    /// Call history and statistics.
    pub telemetry: Arc<TelemetryStore>,
    /// Tool-call router.
    pub dispatcher: Arc<ToolDispatcher>,
    /// CLI verb router (built-ins plus plugin claims).
    pub commands: CommandRegistry,
    pub(crate) shared: Arc<AppShared>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("plugins", &self.config.plugins.len())
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Builds the runtime and loads every configured plugin.
    ///
    /// Individual plugin load failures are logged and skipped; they do
    /// not abort startup.
    ///
    /// # Errors
    ///
    /// Returns an error when the built-in verb set cannot be registered
    /// (a duplicate verb name, which indicates a programming error).
    pub async fn initialize(
        config: HostConfig,
        modules: PluginModules,
        telemetry: Arc<TelemetryStore>,
    ) -> Result<Arc<Self>> {
        let manager = Arc::new(PluginManager::new(modules));
        let dispatcher = Arc::new(ToolDispatcher::new(
            Arc::clone(&manager),
            Arc::clone(&telemetry),
        ));
        let shared = Arc::new(AppShared {
            sse: AsyncMutex::new(None),
            shutdown: AtomicBool::new(false),
            logs: Mutex::new(None),
            default_port: config.mcp.port,
        });

        let mut commands = CommandRegistry::new(Arc::clone(&manager));
        builtins::register_builtins(
            &mut commands,
            &manager,
            &telemetry,
            &dispatcher,
            &shared,
        )?;

        for (name, entry) in &config.plugins {
            if let Err(e) = manager
                .load_plugin(
                    name,
                    &entry.package,
                    entry.config.clone(),
                    entry.disabled_tools.clone(),
                )
                .await
            {
                tracing::warn!("Failed to load plugin '{name}': {e}");
            }
        }

        Ok(Arc::new(Self {
            config,
            manager,
            telemetry,
            dispatcher,
            commands,
            shared,
        }))
    }

    /// The module registry with every built-in package.
    #[must_use]
    pub fn default_modules() -> PluginModules {
        let mut modules = PluginModules::new();
        host_proxy::register(&mut modules);
        modules
    }

    /// Whether the `exit` verb has been invoked.
    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    /// Orderly teardown: stop the SSE listener, destroy plugins (which
    /// disconnects proxy children), and drain the telemetry writer.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.shared.sse.lock().await.take() {
            handle.stop().await;
        }
        self.manager.unload_all().await;
        self.telemetry.shutdown().await;
    }
}
