//! IRC line parsing with IRCv3 message tags.

use std::collections::HashMap;

use mkb_core::{
    domain::{ChannelName, UserId},
    messaging::types::ChatEvent,
};

/// One parsed IRC line: `[@tags] [:prefix] COMMAND params... [:trailing]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IrcMessage {
    pub tags: HashMap<String, String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    /// `None` for blank lines or lines without a command.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        let mut msg = IrcMessage::default();

        if let Some(stripped) = rest.strip_prefix('@') {
            let (tags, tail) = stripped.split_once(' ')?;
            msg.tags = parse_tags(tags);
            rest = tail.trim_start();
        }

        if let Some(stripped) = rest.strip_prefix(':') {
            let (prefix, tail) = stripped.split_once(' ')?;
            msg.prefix = Some(prefix.to_string());
            rest = tail.trim_start();
        }

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }
        msg.command = command.to_ascii_uppercase();

        while !rest.is_empty() {
            if let Some(trailing) = rest.strip_prefix(':') {
                msg.params.push(trailing.to_string());
                break;
            }
            let (param, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            if !param.is_empty() {
                msg.params.push(param.to_string());
            }
            rest = tail.trim_start();
        }

        Some(msg)
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Nick part of a `nick!user@host` prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split(['!', '@']).next().unwrap_or(prefix))
    }

    /// Convert a `PRIVMSG #room :text` into a chat event.
    ///
    /// Messages without a `user-id` tag cannot be attributed and are dropped.
    pub fn to_chat_event(&self) -> Option<ChatEvent> {
        if self.command != "PRIVMSG" || self.params.len() < 2 {
            return None;
        }
        let sender_id = self.tag("user-id").filter(|id| !id.is_empty())?;
        let display_name = self
            .tag("display-name")
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.nick())
            .unwrap_or(sender_id);
        let is_moderator = self.tag("mod") == Some("1")
            || self
                .tag("badges")
                .is_some_and(|b| b.split(',').any(|badge| badge.starts_with("broadcaster/")));

        Some(ChatEvent {
            channel: ChannelName::new(&self.params[0]),
            sender_id: UserId(sender_id.to_string()),
            sender_display_name: display_name.to_string(),
            text: self.params[1].clone(),
            is_moderator,
        })
    }
}

fn parse_tags(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter(|t| !t.is_empty())
        .map(|tag| match tag.split_once('=') {
            Some((k, v)) => (k.to_string(), unescape_tag_value(v)),
            None => (tag.to_string(), String::new()),
        })
        .collect()
}

/// Reverse IRCv3 tag value escaping.
pub fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}

/// Outbound text must stay on one line.
pub fn sanitize(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
