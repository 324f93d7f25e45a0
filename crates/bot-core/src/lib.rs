//! Core of the sign bot: configuration schema and validation, the command
//! registry, the pure message router, and the side-effect executor.
//!
//! The transport (login, sync, event delivery) lives in the `bot` binary
//! crate; command handlers live in their own `cmd-*` crates and only depend
//! on the traits and context defined here.

pub mod config;
pub mod effects;
pub mod registry;
pub mod router;

use std::{path::Path, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use matrix_sdk::{
    Client,
    room::Room,
    ruma::{OwnedUserId, events::room::message::RoomMessageEventContent},
};

pub use config::{BotConfig, CommandSpec, TriggerTables, load_config, validate};
pub use registry::CommandRegistry;
pub use router::{
    CommandInvocation, IgnoreReason, InboundMessage, MessageKind, RoutingDecision, TriggerKind,
    TriggerMatch, route,
};

/// Everything a command handler gets besides the invocation itself: the
/// session handle, the originating room and sender, and the shared config
/// (which carries the masters list).
#[derive(Clone)]
pub struct CommandContext {
    pub client: Client,
    pub room: Room,
    pub sender: OwnedUserId,
    pub timestamp_ms: u64,
    pub config: Arc<BotConfig>,
    pub registry: Arc<CommandRegistry>,
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("room", &self.room.room_id())
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

/// One builtin command implementation. Instances are stateless and registered
/// once at startup under their canonical name.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn help(&self) -> &'static str;
    async fn run(&self, ctx: &CommandContext, invocation: &CommandInvocation) -> Result<()>;
}

/// A side-process started once at boot, after config validation and before
/// message routing begins. Start failures are fatal: subprocesses are
/// required infrastructure, not optional plugins.
#[async_trait]
pub trait Subprocess: Send + Sync {
    fn name(&self) -> &'static str;
    async fn start(&self, client: Client, config: Arc<BotConfig>, base_dir: &Path) -> Result<()>;
}

/// Whether `user_id` is on the configured masters list.
#[must_use]
pub fn is_master(config: &BotConfig, user_id: &str) -> bool {
    config.masters.iter().any(|master| master == user_id)
}

pub async fn send_text(room: &Room, text: &str) -> Result<()> {
    let content = RoomMessageEventContent::text_plain(text);
    room.send(content).await?;
    Ok(())
}

#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
