//! CLI verb registry: built-ins, plugin claims, and router verbs.
//!
//! Built-ins are registered once at startup and are always authoritative.
//! Plugin claims are recomputed from the manager snapshot on every
//! resolution, so load/unload/enable/disable transitions are immediately
//! observable: a verb claimed by two plugins routes through a selector
//! argument, reverts to a direct binding when one claimant remains, and
//! disappears at zero.

use crate::tokenize::tokenize;
use host_core::Error;
use host_plugin::{ArgSpec, CliHandler, CommandResult, PluginCommand, PluginManager};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A verb owned by the runtime itself.
#[derive(Clone)]
pub struct BuiltinCommand {
    /// Primary verb name.
    pub name: String,
    /// Alternate names resolving to the same handler.
    pub aliases: Vec<String>,
    /// One-line description for `help`.
    pub description: String,
    /// Declared arguments (for help and completion).
    pub args: Vec<ArgSpec>,
    /// The implementation.
    pub handler: Arc<dyn CliHandler>,
}

impl fmt::Debug for BuiltinCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinCommand")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}

/// Resolves textual verbs to handlers.
#[derive(Debug)]
pub struct CommandRegistry {
    manager: Arc<PluginManager>,
    builtins: Vec<BuiltinCommand>,
    /// Lowercased name/alias → index into `builtins`.
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    /// Creates a registry resolving plugin verbs against `manager`.
    #[must_use]
    pub fn new(manager: Arc<PluginManager>) -> Self {
        Self {
            manager,
            builtins: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registers a built-in verb and its aliases.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] when the name or an alias is
    /// already taken by another built-in.
    pub fn register_builtin(&mut self, command: BuiltinCommand) -> host_core::Result<()> {
        let mut keys = vec![command.name.to_lowercase()];
        keys.extend(command.aliases.iter().map(|a| a.to_lowercase()));

        for key in &keys {
            if self.index.contains_key(key) {
                return Err(Error::DuplicateName { name: key.clone() });
            }
        }

        let idx = self.builtins.len();
        self.builtins.push(command);
        for key in keys {
            self.index.insert(key, idx);
        }
        Ok(())
    }

    /// Registered built-ins, in registration order.
    #[must_use]
    pub fn builtins(&self) -> &[BuiltinCommand] {
        &self.builtins
    }

    /// The autocomplete view: built-in names, aliases, and visible plugin
    /// verbs (shadowed plugin verbs excluded), sorted and deduplicated.
    #[must_use]
    pub fn verbs(&self) -> Vec<String> {
        let mut verbs: Vec<String> = self.index.keys().cloned().collect();

        for claim in self.manager.cli_commands() {
            if self.index.contains_key(&claim.spec.name.to_lowercase()) {
                tracing::warn!(
                    "Plugin '{}' claims built-in verb '{}'; ignored",
                    claim.plugin,
                    claim.spec.name
                );
                continue;
            }
            verbs.push(claim.spec.name);
        }

        verbs.sort();
        verbs.dedup();
        verbs
    }

    /// Tokenizes and dispatches one input line.
    ///
    /// Resolution order: built-in (case-insensitive, aliases included),
    /// then sole plugin claimant, then router verb. Empty input is a
    /// successful no-op. Unknown verbs and selector-less router verbs
    /// yield a failed [`CommandResult`]; this method never errors.
    pub async fn dispatch(&self, line: &str) -> CommandResult {
        let mut tokens = tokenize(line);
        if tokens.is_empty() {
            return CommandResult::ok("");
        }

        let verb = tokens.remove(0);
        let args = tokens;

        if let Some(&idx) = self.index.get(&verb.to_lowercase()) {
            return self.builtins[idx].handler.execute(args).await;
        }

        let mut claims: Vec<PluginCommand> = self
            .manager
            .cli_commands()
            .into_iter()
            .filter(|claim| claim.spec.name == verb)
            .collect();

        if claims.is_empty() {
            return CommandResult::fail(Error::UnknownCommand { name: verb }.to_string());
        }
        if claims.len() == 1 {
            let claim = claims.remove(0);
            let result = claim.spec.handler.execute(args).await;
            return prefixed(claim.plugin.as_str(), result);
        }
        self.dispatch_router(&verb, claims, args).await
    }

    /// Router verb: the first positional argument selects the plugin.
    async fn dispatch_router(
        &self,
        verb: &str,
        claims: Vec<PluginCommand>,
        mut args: Vec<String>,
    ) -> CommandResult {
        let mut claimants: Vec<String> =
            claims.iter().map(|c| c.plugin.to_string()).collect();
        claimants.sort();

        let selected = args
            .first()
            .and_then(|selector| claims.iter().find(|c| c.plugin.as_str() == selector.as_str()));

        match selected {
            Some(claim) => {
                args.remove(0);
                let result = claim.spec.handler.execute(args).await;
                prefixed(claim.plugin.as_str(), result)
            }
            None => CommandResult::fail(format!(
                "'{verb}' is provided by multiple plugins: {}. \
                 Usage: {verb} <plugin> [args...]",
                claimants.join(", ")
            )),
        }
    }
}

fn prefixed(plugin: &str, result: CommandResult) -> CommandResult {
    CommandResult {
        output: format!("[{plugin}] {}", result.output),
        success: result.success,
    }
}
