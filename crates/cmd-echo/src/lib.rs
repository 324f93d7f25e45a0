use anyhow::Result;
use async_trait::async_trait;

use bot_core::{CommandContext, CommandHandler, CommandInvocation, send_text};

#[derive(Debug)]
pub struct Echo;

#[async_trait]
impl CommandHandler for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }
    fn help(&self) -> &'static str {
        "Echo the arguments back into the room."
    }

    async fn run(&self, ctx: &CommandContext, invocation: &CommandInvocation) -> Result<()> {
        let out = render(&invocation.args);
        send_text(&ctx.room, &out).await
    }
}

fn render(args: &[String]) -> String {
    let joined = args.join(" ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        "(nothing to echo)".to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_args_with_spaces() {
        let args = vec!["hello".to_owned(), "world".to_owned()];
        assert_eq!(render(&args), "hello world");
    }

    #[test]
    fn empty_args_get_a_placeholder() {
        assert_eq!(render(&[]), "(nothing to echo)");
        assert_eq!(render(&[String::new()]), "(nothing to echo)");
    }
}
