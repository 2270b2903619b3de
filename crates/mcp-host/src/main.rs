//! MCP host entry point.
//!
//! # Usage
//!
//! ```bash
//! # Interactive shell (default)
//! mcp-host
//!
//! # Serve MCP to a parent process over stdio
//! mcp-host serve --mode stdio
//!
//! # Serve MCP over HTTP/SSE
//! mcp-host serve --mode sse --port 3000
//!
//! # Show configured plugins without entering the shell
//! mcp-host plugins
//! ```
//!
//! Configuration lives at `~/.mcp-cli/config.json`; call journals and
//! statistics land under `~/.mcp-cli/logs/`.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use host_core::HostConfig;
use host_telemetry::{DEFAULT_HISTORY_CAPACITY, TelemetryStore};
use mcp_host::app::AppContext;
use mcp_host::{builtins, shell};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Universal host for Model Context Protocol servers.
///
/// Loads plugins, aggregates their tools under one namespace, and exposes
/// them to terminal users and remote MCP clients simultaneously.
#[derive(Parser, Debug)]
#[command(name = "mcp-host")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand; the interactive shell runs when omitted.
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (default: ~/.mcp-cli/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the interactive shell (the default).
    Interactive,

    /// Serve MCP to remote clients.
    Serve {
        /// Transport: the process's stdio, or HTTP/SSE.
        #[arg(long, value_enum, default_value_t = ServeMode::Sse)]
        mode: ServeMode,

        /// Port for the SSE transport (flag beats MCP_HOST_PORT beats
        /// config).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List configured plugins and their status.
    Plugins,

    /// Generate shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ServeMode {
    /// Line-delimited JSON-RPC on stdin/stdout.
    Stdio,
    /// HTTP/SSE with POST-back.
    Sse,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(Commands::Completions { shell }) = &cli.command {
        use clap::CommandFactory;
        let mut command = Cli::command();
        clap_complete::generate(*shell, &mut command, "mcp-host", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli.config.unwrap_or_else(HostConfig::default_path);
    let config = HostConfig::load(&config_path)?;

    let telemetry = Arc::new(TelemetryStore::with_persistence(
        DEFAULT_HISTORY_CAPACITY,
        host_core::logs_dir(),
    ));
    let app = AppContext::initialize(config, AppContext::default_modules(), telemetry).await?;

    match cli.command {
        None | Some(Commands::Interactive) => shell::run_shell(app).await,
        Some(Commands::Serve { mode, port }) => serve(app, mode, port).await,
        Some(Commands::Plugins) => {
            println!("{}", builtins::render_plugin_table(&app.manager));
            app.shutdown().await;
            Ok(())
        }
        Some(Commands::Completions { .. }) => unreachable!("handled above"),
    }
}

async fn serve(app: Arc<AppContext>, mode: ServeMode, port: Option<u16>) -> Result<()> {
    match mode {
        ServeMode::Stdio => {
            host_server::run_stdio(Arc::clone(&app.manager), Arc::clone(&app.dispatcher)).await?;
        }
        ServeMode::Sse => {
            let port = resolve_port(port, app.config.mcp.port);
            let handle = host_server::spawn_sse(
                Arc::clone(&app.manager),
                Arc::clone(&app.dispatcher),
                port,
            )
            .await?;

            tokio::signal::ctrl_c().await?;
            tracing::info!("Interrupted; shutting down");
            handle.stop().await;
        }
    }

    app.shutdown().await;
    Ok(())
}

/// Port precedence: CLI flag, then `MCP_HOST_PORT`, then config.
fn resolve_port(flag: Option<u16>, config_port: u16) -> u16 {
    flag.or_else(|| {
        std::env::var("MCP_HOST_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
    })
    .unwrap_or(config_port)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stderr only: stdout belongs to the MCP protocol in stdio mode.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
