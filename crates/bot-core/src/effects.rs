use anyhow::{Context as _, Result};
use matrix_sdk::{
    attachment::AttachmentConfig,
    room::Room,
    ruma::{
        EventId,
        events::{reaction::ReactionEventContent, relation::Annotation},
    },
};
use mime::{APPLICATION_OCTET_STREAM, IMAGE_GIF, IMAGE_JPEG, IMAGE_PNG, Mime};
use tracing::{debug, warn};

use crate::router::{TriggerKind, TriggerMatch};
use crate::send_text;

/// Outcome of executing one batch of trigger matches. Callers may log or
/// ignore it; the details have already been reported through tracing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerReport {
    pub sent: usize,
    pub failed: usize,
}

/// Execute the fallback-path side effects for one routed message: post the
/// reaction or gif for each match, then redact the origin event where the
/// exact-match rule asked for it. Failures never propagate; each one is
/// logged and the rest of the batch still runs.
pub async fn apply_triggers(room: &Room, event_id: &EventId, hits: &[TriggerMatch]) -> TriggerReport {
    let mut report = TriggerReport::default();
    for hit in hits {
        let outcome = match hit.kind {
            TriggerKind::Reaction => react(room, event_id, &hit.payload).await,
            TriggerKind::Gif => send_gif(room, &hit.token, &hit.payload).await,
        };
        match outcome {
            Ok(()) => {
                report.sent += 1;
                debug!(token = %hit.token, kind = ?hit.kind, "Trigger sent");
            }
            Err(e) => {
                report.failed += 1;
                warn!(error = %e, token = %hit.token, kind = ?hit.kind, "Trigger send failed");
            }
        }
        if hit.delete_original {
            if let Err(e) = room.redact(event_id, None, None).await {
                report.failed += 1;
                warn!(error = %e, token = %hit.token, "Failed to redact origin message");
            }
        }
    }
    report
}

/// Annotate the origin event with the configured reaction key.
pub async fn react(room: &Room, event_id: &EventId, key: &str) -> Result<()> {
    let content = ReactionEventContent::new(Annotation::new(event_id.to_owned(), key.to_owned()));
    room.send(content)
        .await
        .with_context(|| format!("sending reaction '{key}'"))?;
    Ok(())
}

/// Fetch the configured gif URL and post it into the room as an image
/// attachment.
pub async fn send_gif(room: &Room, token: &str, url: &str) -> Result<()> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("fetching gif for '{token}' from {url}"))?
        .error_for_status()
        .with_context(|| format!("fetching gif for '{token}' from {url}"))?;
    let data = response
        .bytes()
        .await
        .with_context(|| format!("reading gif body for '{token}'"))?
        .to_vec();

    let body = gif_filename(url, token);
    let mime = guess_mime(&body);
    room.send_attachment(&body, &mime, data, AttachmentConfig::new())
        .await
        .with_context(|| format!("sending gif attachment '{body}'"))?;
    Ok(())
}

/// Report a failed command invocation back into the originating room. The
/// reply itself is best-effort; if it cannot be sent we only log.
pub async fn report_command_failure(room: &Room, typed: &str, error: &anyhow::Error) {
    let reply = format_command_failure(typed, error);
    if let Err(e) = send_text(room, &reply).await {
        warn!(error = %e, command = %typed, "Failed to deliver command error reply");
    }
}

#[must_use]
pub fn format_command_failure(typed: &str, error: &anyhow::Error) -> String {
    format!("Failed to run command `{typed}`:\n```\n{error:#}\n```")
}

fn gif_filename(url: &str, token: &str) -> String {
    url.rsplit('/')
        .next()
        .map(|segment| segment.split(['?', '#']).next().unwrap_or(segment))
        .filter(|name| !name.is_empty() && name.contains('.'))
        .map_or_else(|| format!("{token}.gif"), str::to_owned)
}

fn guess_mime(filename: &str) -> Mime {
    match filename.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("jpg" | "jpeg") => IMAGE_JPEG,
        Some("png") => IMAGE_PNG,
        Some("gif") => IMAGE_GIF,
        Some("webp") => "image/webp".parse().unwrap_or(APPLICATION_OCTET_STREAM),
        Some(_) | None => APPLICATION_OCTET_STREAM,
    }
}
