//! Chat command grammar.
//!
//! A message is classified by the room it arrived in (the bot's control room or a
//! managed room) and by its leading tokens. Rules are tried most-specific first
//! (longest token sequence wins), so `!markerbot mods enable` is never taken for
//! the bare `!markerbot` family and `!markerbot ...` is never taken for `!marker`.

use std::sync::OnceLock;

use crate::domain::ChannelName;

/// Both spellings of the management family.
pub const MANAGEMENT_ALIASES: [&str; 2] = ["!markerbot", "!markersbot"];

/// Commands accepted in the bot's own room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    Join { target: Option<String> },
    Leave { target: Option<String> },
    Info,
    Broadcast { text: String },
}

/// Commands accepted in a managed broadcaster room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelCommand {
    Leave,
    ModsEnable,
    ModsDisable,
    AddUser { username: Option<String> },
    RemoveUser { username: Option<String> },
    Marker { description: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Control(ControlCommand),
    Channel(ChannelCommand),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChannelVerb {
    Leave,
    ModsEnable,
    ModsDisable,
    Add,
    Remove,
    /// The family name with no recognized sub-verb; swallows the text silently.
    ManagementBare,
    Marker,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ControlVerb {
    Join,
    Leave,
    Info,
    Broadcast,
}

#[derive(Debug)]
struct Rule<V> {
    tokens: Vec<&'static str>,
    verb: V,
}

fn rule<V>(tokens: &[&'static str], verb: V) -> Rule<V> {
    Rule {
        tokens: tokens.to_vec(),
        verb,
    }
}

fn channel_rules() -> &'static [Rule<ChannelVerb>] {
    static RULES: OnceLock<Vec<Rule<ChannelVerb>>> = OnceLock::new();
    RULES.get_or_init(|| {
        let mut rules = Vec::new();
        for alias in MANAGEMENT_ALIASES {
            rules.push(rule(&[alias, "mods", "enable"], ChannelVerb::ModsEnable));
            rules.push(rule(&[alias, "mods", "disable"], ChannelVerb::ModsDisable));
            rules.push(rule(&[alias, "leave"], ChannelVerb::Leave));
            rules.push(rule(&[alias, "add"], ChannelVerb::Add));
            rules.push(rule(&[alias, "remove"], ChannelVerb::Remove));
            rules.push(rule(&[alias], ChannelVerb::ManagementBare));
        }
        rules.push(rule(&["!marker"], ChannelVerb::Marker));
        sort_by_specificity(&mut rules);
        rules
    })
}

fn control_rules() -> &'static [Rule<ControlVerb>] {
    static RULES: OnceLock<Vec<Rule<ControlVerb>>> = OnceLock::new();
    RULES.get_or_init(|| {
        let mut rules = vec![
            rule(&["!join"], ControlVerb::Join),
            rule(&["!leave"], ControlVerb::Leave),
            rule(&["!info"], ControlVerb::Info),
            rule(&["!broadcast"], ControlVerb::Broadcast),
        ];
        sort_by_specificity(&mut rules);
        rules
    })
}

fn sort_by_specificity<V>(rules: &mut [Rule<V>]) {
    rules.sort_by(|a, b| b.tokens.len().cmp(&a.tokens.len()));
}

/// Classify a chat line. `None` means "not a command" and gets no reply.
pub fn classify(control_room: &ChannelName, origin: &ChannelName, text: &str) -> Option<Route> {
    if origin == control_room {
        parse_control(text).map(Route::Control)
    } else {
        parse_channel(text).map(Route::Channel)
    }
}

pub fn parse_control(text: &str) -> Option<ControlCommand> {
    let (verb, rest) = match_rule(control_rules(), text)?;
    let first_arg = rest.split_whitespace().next().map(str::to_string);
    match verb {
        ControlVerb::Join => Some(ControlCommand::Join { target: first_arg }),
        ControlVerb::Leave => Some(ControlCommand::Leave { target: first_arg }),
        ControlVerb::Info => Some(ControlCommand::Info),
        ControlVerb::Broadcast if rest.is_empty() => None,
        ControlVerb::Broadcast => Some(ControlCommand::Broadcast {
            text: rest.to_string(),
        }),
    }
}

pub fn parse_channel(text: &str) -> Option<ChannelCommand> {
    let (verb, rest) = match_rule(channel_rules(), text)?;
    let first_arg = rest.split_whitespace().next().map(str::to_string);
    match verb {
        ChannelVerb::Leave => Some(ChannelCommand::Leave),
        ChannelVerb::ModsEnable => Some(ChannelCommand::ModsEnable),
        ChannelVerb::ModsDisable => Some(ChannelCommand::ModsDisable),
        ChannelVerb::Add => Some(ChannelCommand::AddUser { username: first_arg }),
        ChannelVerb::Remove => Some(ChannelCommand::RemoveUser { username: first_arg }),
        ChannelVerb::ManagementBare => None,
        ChannelVerb::Marker => Some(ChannelCommand::Marker {
            description: rest.to_string(),
        }),
    }
}

fn match_rule<'t, V: Copy>(rules: &[Rule<V>], text: &'t str) -> Option<(V, &'t str)> {
    rules.iter().find_map(|rule| {
        let (tokens, rest) = take_tokens(text, rule.tokens.len());
        let matched = tokens.len() == rule.tokens.len()
            && tokens
                .iter()
                .zip(&rule.tokens)
                .all(|(got, want)| got.eq_ignore_ascii_case(want));
        matched.then_some((rule.verb, rest))
    })
}

/// Split off up to `n` whitespace-separated tokens; the remainder is trimmed.
fn take_tokens(text: &str, n: usize) -> (Vec<&str>, &str) {
    let mut tokens = Vec::with_capacity(n);
    let mut rest = text.trim();
    while tokens.len() < n && !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        tokens.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    (tokens, rest)
}
