use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};

use anyhow::{Context as _, Result, anyhow};
use async_trait::async_trait;
use matrix_sdk::Client;
use tokio::time::{Instant, interval};
use tracing::{debug, info};

use bot_core::{BotConfig, Subprocess, send_text};

#[rustfmt::skip]
fn builtin_subprocesses() -> HashMap<&'static str, Arc<dyn Subprocess>> {
    HashMap::from([
        ("heartbeat", Arc::new(Heartbeat) as Arc<dyn Subprocess>),
        ("motd", Arc::new(Motd) as Arc<dyn Subprocess>),
    ])
}

/// Start every configured subprocess, sequentially and in declared order.
/// An unknown name or a start failure aborts the whole boot sequence.
pub async fn bootstrap(client: &Client, config: &Arc<BotConfig>, base_dir: &Path) -> Result<()> {
    let table = builtin_subprocesses();
    for (idx, name) in config.subprocesses.iter().enumerate() {
        let subprocess = table
            .get(name.as_str())
            .ok_or_else(|| anyhow!("unknown subprocess '{name}' at index {idx}"))?;
        subprocess
            .start(client.clone(), Arc::clone(config), base_dir)
            .await
            .with_context(|| format!("starting subprocess '{name}'"))?;
        info!(subprocess = %name, "Subprocess started");
    }
    Ok(())
}

/// Periodic liveness log line; mostly useful with `debug: true`.
#[derive(Debug)]
struct Heartbeat;

#[async_trait]
impl Subprocess for Heartbeat {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    async fn start(&self, _client: Client, _config: Arc<BotConfig>, _base_dir: &Path) -> Result<()> {
        let started = Instant::now();
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(300));
            tick.tick().await; // first tick fires immediately
            loop {
                tick.tick().await;
                debug!(uptime_secs = started.elapsed().as_secs(), "Heartbeat");
            }
        });
        Ok(())
    }
}

/// Posts `motd.txt` from the config directory into every joined room at boot.
/// A missing file is fine; an unreadable one is a bootstrap error.
#[derive(Debug)]
struct Motd;

#[async_trait]
impl Subprocess for Motd {
    fn name(&self) -> &'static str {
        "motd"
    }

    async fn start(&self, client: Client, _config: Arc<BotConfig>, base_dir: &Path) -> Result<()> {
        let path = base_dir.join("motd.txt");
        if !path.exists() {
            debug!(path = %path.display(), "No motd file, skipping");
            return Ok(());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading motd file at {}", path.display()))?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        for room in client.joined_rooms() {
            if let Err(e) = send_text(&room, text).await {
                tracing::warn!(error = %e, room_id = %room.room_id(), "Failed to post motd");
            }
        }
        Ok(())
    }
}
