use anyhow::Result;
use async_trait::async_trait;

use bot_core::{CommandContext, CommandHandler, CommandInvocation, CommandSpec, send_text};

#[derive(Debug)]
pub struct Help;

#[async_trait]
impl CommandHandler for Help {
    fn name(&self) -> &'static str {
        "help"
    }
    fn help(&self) -> &'static str {
        "List the configured commands and their aliases."
    }

    async fn run(&self, ctx: &CommandContext, _invocation: &CommandInvocation) -> Result<()> {
        let listing = render(&ctx.config.sign, ctx.registry.specs());
        send_text(&ctx.room, &listing).await
    }
}

fn render(sign: &str, specs: &[CommandSpec]) -> String {
    if specs.is_empty() {
        return "No commands configured.".to_owned();
    }
    let mut lines = Vec::with_capacity(specs.len() + 1);
    lines.push("Available commands:".to_owned());
    for spec in specs {
        let mut line = format!("{sign}{} — {}", spec.command, spec.description);
        if !spec.aliases.is_empty() {
            line.push_str(&format!(" (aliases: {})", spec.aliases.join(", ")));
        }
        lines.push(line);
    }
    lines.join("\n")
}
