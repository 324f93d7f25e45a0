use crate::config::TriggerTables;
use crate::registry::CommandRegistry;

/// Message kind as seen by the router. Only plain text and emotes are
/// routable; everything else (notices, media, verification requests) is
/// dropped up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Plain,
    Emote,
    Other,
}

/// Transport-neutral view of one inbound event. Exists only for the duration
/// of a single routing decision.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub event_id: String,
    pub timestamp_ms: u64,
    pub kind: MessageKind,
    pub is_direct: bool,
    pub sender_is_self: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    SelfSender,
    UnsupportedKind,
    EmptyText,
    NotEligible,
    NoMatch,
}

/// An accepted command invocation. `name` is the canonical (alias-resolved)
/// command; `typed` is the token the user actually typed, lower-cased and
/// stripped of the sign, before alias resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub name: String,
    pub typed: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Reaction,
    Gif,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    pub kind: TriggerKind,
    pub token: String,
    pub payload: String,
    pub delete_original: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    Ignored(IgnoreReason),
    Command(CommandInvocation),
    Triggers(Vec<TriggerMatch>),
}

/// Classify one inbound event.
///
/// Pure over its inputs: all state is the immutable registry plus the trigger
/// tables, so the caller can execute the returned decision however it likes.
/// A command match takes absolute precedence over the trigger scan; an
/// arity-rejected command falls through to the scan.
#[must_use]
pub fn route(
    msg: &InboundMessage,
    registry: &CommandRegistry,
    triggers: &TriggerTables,
    sign: &str,
) -> RoutingDecision {
    if msg.sender_is_self {
        return RoutingDecision::Ignored(IgnoreReason::SelfSender);
    }
    if msg.kind == MessageKind::Other {
        return RoutingDecision::Ignored(IgnoreReason::UnsupportedKind);
    }
    if msg.text.is_empty() {
        return RoutingDecision::Ignored(IgnoreReason::EmptyText);
    }
    // Messages in normal rooms without the sign are inert; direct rooms are
    // exempt from the prefix requirement.
    if !(msg.text.starts_with(sign) || msg.is_direct) {
        return RoutingDecision::Ignored(IgnoreReason::NotEligible);
    }

    // Split on single spaces, as the original did: doubled spaces produce
    // empty argument tokens and count towards arity.
    let mut parts = msg.text.split(' ');
    let first = parts.next().unwrap_or("").to_lowercase();
    let typed = first.strip_prefix(sign).unwrap_or(&first).to_owned();
    let args: Vec<String> = parts.map(str::to_owned).collect();

    let canonical = registry.resolve_alias(&typed).unwrap_or(&typed);
    if let Some(spec) = registry.spec(canonical)
        && spec.accepts_arity(args.len())
    {
        return RoutingDecision::Command(CommandInvocation {
            name: canonical.to_owned(),
            typed,
            args,
        });
    }

    let hits = scan_triggers(&msg.text, triggers, sign);
    if hits.is_empty() {
        RoutingDecision::Ignored(IgnoreReason::NoMatch)
    } else {
        RoutingDecision::Triggers(hits)
    }
}

/// Fallback scan: every sign-prefixed token of the original text is checked
/// against reacts first, then gifs. Deletion of the origin message requires
/// the whole text to equal `sign + token` exactly, not merely contain it.
fn scan_triggers(text: &str, triggers: &TriggerTables, sign: &str) -> Vec<TriggerMatch> {
    let mut hits = Vec::new();
    for part in text.split(' ') {
        let Some(stripped) = part.strip_prefix(sign) else {
            continue;
        };
        let token = stripped.to_lowercase();
        let delete_original = text == format!("{sign}{token}");

        if let Some(payload) = triggers.reacts.get(&token) {
            hits.push(TriggerMatch {
                kind: TriggerKind::Reaction,
                token,
                payload: payload.clone(),
                delete_original,
            });
            // A react hit suppresses the gif check for this token only.
            continue;
        }
        if let Some(payload) = triggers.gifs.get(&token) {
            hits.push(TriggerMatch {
                kind: TriggerKind::Gif,
                token,
                payload: payload.clone(),
                delete_original,
            });
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::CommandSpec;

    fn spec(name: &str, aliases: &[&str], args: Vec<Vec<String>>) -> CommandSpec {
        CommandSpec {
            command: name.to_owned(),
            description: format!("the {name} command"),
            aliases: aliases.iter().map(|&a| a.to_owned()).collect(),
            args,
        }
    }

    fn registry(specs: Vec<CommandSpec>) -> CommandRegistry {
        CommandRegistry::new(specs, HashMap::new())
    }

    fn tables(reacts: &[(&str, &str)], gifs: &[(&str, &str)]) -> TriggerTables {
        TriggerTables {
            reacts: reacts.iter().map(|&(k, v)| (k.to_owned(), v.to_owned())).collect(),
            gifs: gifs.iter().map(|&(k, v)| (k.to_owned(), v.to_owned())).collect(),
        }
    }

    fn msg(text: &str) -> InboundMessage {
        InboundMessage {
            text: text.to_owned(),
            channel_id: "!room:example.org".to_owned(),
            user_id: "@alice:example.org".to_owned(),
            event_id: "$evt".to_owned(),
            timestamp_ms: 1_700_000_000_000,
            kind: MessageKind::Plain,
            is_direct: false,
            sender_is_self: false,
        }
    }

    fn direct(text: &str) -> InboundMessage {
        InboundMessage {
            is_direct: true,
            ..msg(text)
        }
    }

    #[test]
    fn own_messages_are_ignored() {
        let reg = registry(vec![spec("ping", &[], vec![])]);
        let message = InboundMessage {
            sender_is_self: true,
            ..msg("!ping")
        };
        let decision = route(&message, &reg, &TriggerTables::default(), "!");
        assert_eq!(decision, RoutingDecision::Ignored(IgnoreReason::SelfSender));
    }

    #[test]
    fn unsupported_kinds_are_ignored() {
        let reg = registry(vec![spec("ping", &[], vec![])]);
        let message = InboundMessage {
            kind: MessageKind::Other,
            ..msg("!ping")
        };
        let decision = route(&message, &reg, &TriggerTables::default(), "!");
        assert_eq!(decision, RoutingDecision::Ignored(IgnoreReason::UnsupportedKind));
    }

    #[test]
    fn emotes_are_routable() {
        let reg = registry(vec![spec("ping", &[], vec![])]);
        let message = InboundMessage {
            kind: MessageKind::Emote,
            ..msg("!ping")
        };
        assert!(matches!(
            route(&message, &reg, &TriggerTables::default(), "!"),
            RoutingDecision::Command(_)
        ));
    }

    #[test]
    fn unsigned_message_in_normal_room_is_inert() {
        let reg = registry(vec![spec("ping", &[], vec![])]);
        let triggers = tables(&[("wave", "👋")], &[]);
        let decision = route(&msg("ping wave"), &reg, &triggers, "!");
        assert_eq!(decision, RoutingDecision::Ignored(IgnoreReason::NotEligible));
    }

    #[test]
    fn signed_command_in_normal_room_is_invoked() {
        let reg = registry(vec![spec("ping", &[], vec![vec![]])]);
        match route(&msg("!ping"), &reg, &TriggerTables::default(), "!") {
            RoutingDecision::Command(inv) => {
                assert_eq!(inv.name, "ping");
                assert_eq!(inv.typed, "ping");
                assert!(inv.args.is_empty());
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn direct_room_waives_the_sign_requirement() {
        let reg = registry(vec![spec("ping", &[], vec![vec![]])]);
        assert!(matches!(
            route(&direct("ping"), &reg, &TriggerTables::default(), "!"),
            RoutingDecision::Command(_)
        ));
        // Same text in a normal room stays inert.
        assert_eq!(
            route(&msg("ping"), &reg, &TriggerTables::default(), "!"),
            RoutingDecision::Ignored(IgnoreReason::NotEligible)
        );
    }

    #[test]
    fn command_word_is_lowercased() {
        let reg = registry(vec![spec("ping", &[], vec![])]);
        assert!(matches!(
            route(&msg("!PiNg"), &reg, &TriggerTables::default(), "!"),
            RoutingDecision::Command(_)
        ));
    }

    #[test]
    fn alias_resolves_but_typed_token_is_preserved() {
        let reg = registry(vec![spec("echo", &["say"], vec![])]);
        match route(&msg("!say hello"), &reg, &TriggerTables::default(), "!") {
            RoutingDecision::Command(inv) => {
                assert_eq!(inv.name, "echo");
                assert_eq!(inv.typed, "say");
                assert_eq!(inv.args, vec!["hello"]);
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn arity_membership_is_enforced() {
        let signatures = vec![vec!["a".to_owned()], vec!["a".to_owned(), "b".to_owned()]];
        let reg = registry(vec![spec("foo", &[], signatures)]);
        let triggers = TriggerTables::default();

        assert!(matches!(route(&msg("!foo x"), &reg, &triggers, "!"), RoutingDecision::Command(_)));
        assert!(matches!(route(&msg("!foo x y"), &reg, &triggers, "!"), RoutingDecision::Command(_)));
        // Three args match no signature: falls through to the (empty) scan.
        assert_eq!(
            route(&msg("!foo x y z"), &reg, &triggers, "!"),
            RoutingDecision::Ignored(IgnoreReason::NoMatch)
        );
    }

    #[test]
    fn empty_signature_list_accepts_any_arity() {
        let reg = registry(vec![spec("ai", &[], vec![])]);
        let triggers = TriggerTables::default();
        assert!(matches!(route(&msg("!ai"), &reg, &triggers, "!"), RoutingDecision::Command(_)));
        assert!(matches!(
            route(&msg("!ai a b c d e"), &reg, &triggers, "!"),
            RoutingDecision::Command(_)
        ));
    }

    #[test]
    fn arity_rejection_falls_through_to_triggers() {
        let reg = registry(vec![spec("wave", &[], vec![vec!["who".to_owned()]])]);
        let triggers = tables(&[("wave", "👋")], &[]);
        // "!wave" has zero args, the only signature wants one: the command is
        // rejected and the same token then matches the reacts table.
        match route(&msg("!wave"), &reg, &triggers, "!") {
            RoutingDecision::Triggers(hits) => {
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].kind, TriggerKind::Reaction);
                assert!(hits[0].delete_original);
            }
            other => panic!("expected triggers, got {other:?}"),
        }
    }

    #[test]
    fn command_match_suppresses_trigger_scan() {
        let reg = registry(vec![spec("wave", &[], vec![])]);
        let triggers = tables(&[("wave", "👋")], &[]);
        assert!(matches!(
            route(&msg("!wave"), &reg, &triggers, "!"),
            RoutingDecision::Command(_)
        ));
    }

    #[test]
    fn exact_match_gates_deletion() {
        let reg = registry(vec![]);
        let triggers = tables(&[("wave", "👋")], &[]);

        match route(&msg("!wave"), &reg, &triggers, "!") {
            RoutingDecision::Triggers(hits) => assert!(hits[0].delete_original),
            other => panic!("expected triggers, got {other:?}"),
        }
        match route(&direct("hey !wave now"), &reg, &triggers, "!") {
            RoutingDecision::Triggers(hits) => {
                assert_eq!(hits.len(), 1);
                assert!(!hits[0].delete_original);
            }
            other => panic!("expected triggers, got {other:?}"),
        }
    }

    #[test]
    fn reacts_shadow_gifs_per_token() {
        let reg = registry(vec![]);
        let triggers = tables(
            &[("wave", "👋")],
            &[("wave", "https://example.com/wave.gif"), ("party", "https://example.com/party.gif")],
        );
        match route(&msg("!wave !party"), &reg, &triggers, "!") {
            RoutingDecision::Triggers(hits) => {
                assert_eq!(hits.len(), 2);
                assert_eq!(hits[0].kind, TriggerKind::Reaction);
                assert_eq!(hits[1].kind, TriggerKind::Gif);
                // Multi-token message: neither token equals the whole text.
                assert!(!hits[0].delete_original);
                assert!(!hits[1].delete_original);
            }
            other => panic!("expected triggers, got {other:?}"),
        }
    }

    #[test]
    fn unsigned_tokens_are_never_trigger_candidates() {
        let reg = registry(vec![]);
        let triggers = tables(&[("wave", "👋")], &[]);
        let decision = route(&direct("wave wave wave"), &reg, &triggers, "!");
        assert_eq!(decision, RoutingDecision::Ignored(IgnoreReason::NoMatch));
    }

    #[test]
    fn doubled_spaces_produce_empty_args() {
        // Split on single spaces, as the original: "!echo  x" has args ["", "x"].
        let reg = registry(vec![spec("echo", &[], vec![vec!["a".to_owned()]])]);
        let decision = route(&msg("!echo  x"), &reg, &TriggerTables::default(), "!");
        assert_eq!(decision, RoutingDecision::Ignored(IgnoreReason::NoMatch));
    }

    #[test]
    fn multi_char_sign_is_supported() {
        let reg = registry(vec![spec("ping", &[], vec![])]);
        assert!(matches!(
            route(&msg("~~ping"), &reg, &TriggerTables::default(), "~~"),
            RoutingDecision::Command(_)
        ));
    }
}
