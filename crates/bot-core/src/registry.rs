use std::{collections::HashMap, sync::Arc};

use tracing::warn;

use crate::CommandHandler;
use crate::config::CommandSpec;

/// The validated command definitions paired with their typed handlers.
///
/// Built once at startup from the config and the builtin handler table;
/// immutable afterwards. The spec list keeps declaration order because alias
/// resolution is first-match-wins and alias uniqueness is deliberately not
/// enforced.
pub struct CommandRegistry {
    specs: Vec<CommandSpec>,
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.command_names())
            .finish_non_exhaustive()
    }
}

impl CommandRegistry {
    /// Pair configured commands with handler implementations.
    ///
    /// A configured command without an implementation stays in the registry
    /// (it still matches at route time) but dispatch will fail into the
    /// regular error-reply path; we only warn about it up front.
    #[must_use]
    pub fn new(
        specs: Vec<CommandSpec>,
        available: HashMap<&'static str, Arc<dyn CommandHandler>>,
    ) -> Self {
        let mut handlers = HashMap::new();
        for spec in &specs {
            match available.get(spec.command.as_str()) {
                Some(handler) => {
                    handlers.insert(spec.command.clone(), Arc::clone(handler));
                }
                None => warn!(command = %spec.command, "No handler registered for configured command"),
            }
        }
        Self { specs, handlers }
    }

    /// First command in declaration order whose alias list contains `token`.
    /// Single-hop: the returned canonical name is never itself re-resolved.
    #[must_use]
    pub fn resolve_alias(&self, token: &str) -> Option<&str> {
        self.specs
            .iter()
            .find(|spec| spec.aliases.iter().any(|alias| alias == token))
            .map(|spec| spec.command.as_str())
    }

    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&CommandSpec> {
        self.specs.iter().find(|spec| spec.command == name)
    }

    #[must_use]
    pub fn handler(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    #[must_use]
    pub fn specs(&self) -> &[CommandSpec] {
        &self.specs
    }

    #[must_use]
    pub fn command_names(&self) -> Vec<String> {
        self.specs.iter().map(|spec| spec.command.clone()).collect()
    }
}
