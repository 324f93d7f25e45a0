use anyhow::Result;
use async_trait::async_trait;

use bot_core::{CommandContext, CommandHandler, CommandInvocation, send_text};

#[derive(Debug)]
pub struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    fn name(&self) -> &'static str {
        "ping"
    }
    fn help(&self) -> &'static str {
        "🏓"
    }

    async fn run(&self, ctx: &CommandContext, _invocation: &CommandInvocation) -> Result<()> {
        send_text(&ctx.room, "Pong! 🏓").await
    }
}
