mod commands;
mod logging;
mod subprocesses;

use core::time::Duration;
use std::{
    fs,
    io::IsTerminal as _,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context as _, Result, anyhow};
use clap::Parser;
use matrix_sdk::{
    Client, SessionMeta,
    authentication::{SessionTokens, matrix::MatrixSession},
    config::SyncSettings,
    room::Room,
    ruma::events::room::{
        member::{MembershipState, StrippedRoomMemberEvent},
        message::{MessageType, OriginalSyncRoomMessageEvent},
    },
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::logging::init_tracing;
use bot_core::{
    BotConfig, CommandContext, CommandRegistry, InboundMessage, MessageKind, RoutingDecision,
    TriggerTables,
    effects::{apply_triggers, report_command_failure},
    route, truncate,
};

#[derive(Parser, Debug)]
#[command(
    name = "sign-bot",
    version,
    about = "Matrix bot with prefixed commands, reaction triggers and gif triggers"
)]
struct Args {
    /// Homeserver base URL, e.g. `https://matrix-client.matrix.org`.
    #[arg(long, env = "MATRIX_HOMESERVER")]
    homeserver: String,

    /// Username (localpart or full user ID)
    #[arg(long, env = "MATRIX_USERNAME")]
    username: String,

    /// Password (if omitted, will prompt if needed)
    #[arg(long, env = "MATRIX_PASSWORD")]
    password: Option<String>,

    /// Directory for persistent state (encryption keys, sync cache)
    #[arg(long, env = "MATRIX_STORE", default_value = "./bot-store")]
    store: PathBuf,

    /// JSON session file for access token/device info
    #[arg(long, env = "MATRIX_SESSION_FILE", default_value = "./session.json")]
    session_file: PathBuf,

    /// Device display name
    #[arg(long, env = "MATRIX_DEVICE_NAME", default_value = "sign-bot")]
    device_name: String,

    /// Path to the YAML config (sign, commands, subprocesses, reacts, gifs)
    #[arg(long, env = "BOT_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    /// Disable auto-joining rooms when invited
    #[arg(long)]
    no_autojoin: bool,

    /// Sync timeout in milliseconds
    #[arg(long, env = "MATRIX_SYNC_TIMEOUT_MS", default_value_t = 30000)]
    sync_timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user_id: String,
    device_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present so clap can pick up env vars.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // The config gates everything else: load and validate it before any
    // network activity, and let its debug flag shape the log filter.
    let config = Arc::new(bot_core::load_config(&args.config)?);
    init_tracing(config.debug);
    let base_dir = args
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    fs::create_dir_all(&args.store)
        .with_context(|| format!("creating store directory at {}", args.store.display()))?;

    // Build client with SQLite store to persist E2EE state
    let client = Client::builder()
        .homeserver_url(&args.homeserver)
        .handle_refresh_tokens()
        .sqlite_store(&args.store, None)
        .build()
        .await
        .context("building matrix client")?;

    // Restore session if available; otherwise login
    if let Some(session) = load_session(&args.session_file)? {
        info!("Restoring session for {}", session.user_id);
        let matrix_session = MatrixSession {
            meta: SessionMeta {
                user_id: session.user_id.parse().context("invalid stored user_id")?,
                device_id: session.device_id.into(),
            },
            tokens: SessionTokens {
                access_token: session.access_token,
                refresh_token: session.refresh_token,
            },
        };
        client
            .restore_session(matrix_session)
            .await
            .context("restoring session")?;
    } else {
        let password = resolve_password(&args)?;
        info!("Logging in as {}", args.username);
        let response = client
            .matrix_auth()
            .login_username(&args.username, &password)
            .initial_device_display_name(&args.device_name)
            .request_refresh_token()
            .send()
            .await
            .context("login failed")?;

        // Save session for future runs
        let session = SavedSession {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            user_id: response.user_id.to_string(),
            device_id: response.device_id.to_string(),
        };
        save_session(&args.session_file, &session)?;
        info!(
            "Logged in: user={} device={}",
            session.user_id, session.device_id
        );
    }

    // Immutable routing tables, built once and shared with the handler.
    let registry = Arc::new(CommandRegistry::new(
        config.commands.clone(),
        commands::builtin_handlers(),
    ));
    let triggers = Arc::new(TriggerTables::from_config(&config));
    let mut react_tokens: Vec<&String> = triggers.reacts.keys().collect();
    let mut gif_tokens: Vec<&String> = triggers.gifs.keys().collect();
    react_tokens.sort();
    gif_tokens.sort();
    info!(
        sign = %config.sign,
        commands = ?registry.command_names(),
        reacts = ?react_tokens,
        gifs = ?gif_tokens,
        "Routing tables ready"
    );

    // Subprocesses are required infrastructure: any failure aborts boot.
    subprocesses::bootstrap(&client, &config, &base_dir).await?;

    // Auto-join handler for invites
    if !args.no_autojoin {
        client.add_event_handler(
            async move |ev: StrippedRoomMemberEvent, room: Room, client: Client| {
                if ev.content.membership != MembershipState::Invite {
                    return;
                }
                let Some(own_id) = client.user_id() else {
                    return;
                };
                if ev.state_key != own_id.as_str() {
                    return;
                }
                info!(room_id = %room.room_id(), "Auto-joining invited room");
                if let Err(e) = room.join().await {
                    warn!(error = %e, "Failed to accept invite");
                }
            },
        );
    }

    // Message handler: one routing decision per inbound event.
    client.add_event_handler(
        async move |ev: OriginalSyncRoomMessageEvent, room: Room, client: Client| {
            handle_message(ev, room, client, &config, &registry, &triggers).await;
        },
    );

    info!(
        timeout_ms = args.sync_timeout_ms,
        "Starting sync… Press Ctrl+C to stop."
    );
    let settings = SyncSettings::new().timeout(Duration::from_millis(args.sync_timeout_ms));
    client
        .sync(settings)
        .await
        .map_err(|e| anyhow!("sync terminated: {e}"))
}

async fn handle_message(
    ev: OriginalSyncRoomMessageEvent,
    room: Room,
    client: Client,
    config: &Arc<BotConfig>,
    registry: &Arc<CommandRegistry>,
    triggers: &Arc<TriggerTables>,
) {
    let Some(own_id) = client.user_id() else {
        return;
    };

    let (kind, text) = match &ev.content.msgtype {
        MessageType::Text(t) => (MessageKind::Plain, t.body.clone()),
        MessageType::Emote(e) => (MessageKind::Emote, e.body.clone()),
        MessageType::Audio(_)
        | MessageType::File(_)
        | MessageType::Image(_)
        | MessageType::Location(_)
        | MessageType::Notice(_)
        | MessageType::ServerNotice(_)
        | MessageType::Video(_)
        | MessageType::VerificationRequest(_)
        | _ => (MessageKind::Other, String::new()),
    };
    let is_direct = room.is_direct().await.unwrap_or(false);

    let msg = InboundMessage {
        text,
        channel_id: room.room_id().to_string(),
        user_id: ev.sender.to_string(),
        event_id: ev.event_id.to_string(),
        timestamp_ms: ev.origin_server_ts.get().into(),
        kind,
        is_direct,
        sender_is_self: ev.sender == own_id,
    };
    info!(
        room_id = %msg.channel_id,
        sender = %msg.user_id,
        kind = ?msg.kind,
        body = %truncate(&msg.text, 200),
        "Incoming message"
    );

    match route(&msg, registry, triggers, &config.sign) {
        RoutingDecision::Ignored(reason) => {
            debug!(reason = ?reason, "Message not routed");
        }
        RoutingDecision::Command(invocation) => {
            let ctx = CommandContext {
                client: client.clone(),
                room: room.clone(),
                sender: ev.sender.clone(),
                timestamp_ms: msg.timestamp_ms,
                config: Arc::clone(config),
                registry: Arc::clone(registry),
            };
            // Handler failures (including a configured command with no
            // implementation) stay inside this message: report into the room
            // and keep routing.
            let outcome = match registry.handler(&invocation.name) {
                Some(handler) => handler.run(&ctx, &invocation).await,
                None => Err(anyhow!(
                    "no handler registered for command '{}'",
                    invocation.name
                )),
            };
            if let Err(e) = outcome {
                warn!(error = %e, command = %invocation.name, "Command failed");
                report_command_failure(&room, &invocation.typed, &e).await;
            }
        }
        RoutingDecision::Triggers(hits) => {
            let report = apply_triggers(&room, &ev.event_id, &hits).await;
            debug!(sent = report.sent, failed = report.failed, "Trigger batch executed");
        }
    }
}

fn resolve_password(args: &Args) -> Result<String> {
    // Treat empty env/arg as missing; avoid prompting in non-interactive
    // (Docker) mode.
    if let Some(p) = args
        .password
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return Ok(p.to_owned());
    }
    if !std::io::stdin().is_terminal() {
        return Err(anyhow!(
            "No MATRIX_PASSWORD provided and no stored session. In Docker/non-interactive mode, set MATRIX_PASSWORD env or mount an existing session at {}",
            args.session_file.display()
        ));
    }
    warn!("No password provided via --password or MATRIX_PASSWORD. Prompting...");
    #[cfg(feature = "rpassword")]
    {
        rpassword::prompt_password("Matrix password:")
            .map_err(|e| anyhow!("Failed to read password: {e}"))
    }
    #[cfg(not(feature = "rpassword"))]
    {
        Err(anyhow!(
            "rpassword feature is not enabled. Cannot prompt for password."
        ))
    }
}

fn load_session(path: &PathBuf) -> Result<Option<SavedSession>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading session file at {}", path.display()))?;
    let session: SavedSession = serde_json::from_str(&data).context("parsing session JSON")?;
    Ok(Some(session))
}

fn save_session(path: &PathBuf, session: &SavedSession) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(session)?;
    fs::write(path, data).with_context(|| format!("writing session file at {}", path.display()))?;
    Ok(())
}
