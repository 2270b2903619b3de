//! Plain interactive shell.
//!
//! A minimal line loop over stdin: the richer terminal UI is an external
//! collaborator and consumes the same public surface this loop does
//! (command dispatch, telemetry subscription, status queries).

use crate::app::AppContext;
use anyhow::Context as _;
use std::io::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Runs the interactive loop until `exit` or EOF, then shuts the app
/// down.
///
/// # Errors
///
/// Returns an error when stdin or stdout become unusable.
pub async fn run_shell(app: Arc<AppContext>) -> anyhow::Result<()> {
    println!(
        "mcp-host {} - 'help' lists commands, 'exit' quits",
        env!("CARGO_PKG_VERSION")
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().context("flushing prompt")?;

        let Some(line) = lines.next_line().await.context("reading stdin")? else {
            break;
        };

        let result = app.commands.dispatch(&line).await;
        if !result.output.is_empty() {
            println!("{}", result.output);
        } else if !result.success {
            println!("command failed");
        }

        if app.shutdown_requested() {
            break;
        }
    }

    app.shutdown().await;
    Ok(())
}
