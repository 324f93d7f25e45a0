use std::{collections::HashMap, sync::Arc};

use bot_core::CommandHandler;

/// The startup-time table of builtin command implementations. The config
/// decides which of these actually enter the registry; a configured command
/// missing from this table is warned about and fails into the error-reply
/// path when invoked.
#[rustfmt::skip]
pub fn builtin_handlers() -> HashMap<&'static str, Arc<dyn CommandHandler>> {
    HashMap::from([
        ("ping", Arc::new(cmd_ping::Ping) as Arc<dyn CommandHandler>),
        ("echo", Arc::new(cmd_echo::Echo) as Arc<dyn CommandHandler>),
        ("help", Arc::new(cmd_help::Help) as Arc<dyn CommandHandler>),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_keys_match_handler_names() {
        for (key, handler) in builtin_handlers() {
            assert_eq!(key, handler.name());
        }
    }
}
