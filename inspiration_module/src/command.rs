//! Trailing-marker command grammar for inbound chat text.
//!
//! A message selects a command either by being exactly a marker (`/l`) or by
//! ending with a single space plus a marker (`idea #tag /s`). Everything
//! before the marker is the argument text. Parsing never fails: text that
//! matches no marker comes back as [`Command::None`].

use serde::Serialize;

use crate::tags::parse_tags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Save,
    List,
    Edit,
    Delete,
    Temp,
    Drop,
    Profile,
    Search,
    None,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Save => "save",
            Command::List => "list",
            Command::Edit => "edit",
            Command::Delete => "delete",
            Command::Temp => "temp",
            Command::Drop => "drop",
            Command::Profile => "profile",
            Command::Search => "search",
            Command::None => "none",
        }
    }
}

const MARKERS: &[(&str, Command)] = &[
    ("/s", Command::Save),
    ("/save", Command::Save),
    ("/l", Command::List),
    ("/list", Command::List),
    ("/e", Command::Edit),
    ("/edit", Command::Edit),
    ("/d", Command::Delete),
    ("/delete", Command::Delete),
    ("/t", Command::Temp),
    ("/temp", Command::Temp),
    ("/x", Command::Drop),
    ("/drop", Command::Drop),
    ("/p", Command::Profile),
    ("/profile", Command::Profile),
    ("/f", Command::Search),
    ("/find", Command::Search),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCommand {
    pub command: Command,
    pub content: String,
    pub tags: Vec<String>,
    /// Tag filter for LIST, zero-padded target id for EDIT/DELETE.
    pub params: String,
    pub auto_save: bool,
}

/// Classify one inbound text message.
pub fn parse_command(text: &str) -> ParsedCommand {
    let text = text.trim();
    let (command, args) = split_marker(text);
    let parsed = parse_tags(args);

    let mut result = ParsedCommand {
        command,
        content: parsed.clean_content,
        tags: parsed.tags,
        params: String::new(),
        auto_save: false,
    };

    match command {
        Command::List => {
            if let Some(first) = result.tags.first() {
                result.params = first.clone();
            }
        }
        Command::Edit | Command::Delete => {
            let mut tokens = result.content.split_whitespace();
            let target = tokens.next().filter(|token| is_numeric(token));
            if let Some(target) = target {
                result.params = pad_id(target);
                if command == Command::Edit {
                    result.content = tokens.collect::<Vec<_>>().join(" ");
                }
            }
        }
        Command::None => {
            result.auto_save = !result.tags.is_empty();
        }
        _ => {}
    }

    result
}

fn split_marker(text: &str) -> (Command, &str) {
    for (marker, command) in MARKERS {
        if text == *marker {
            return (*command, "");
        }
        if let Some(prefix) = text.strip_suffix(marker) {
            if let Some(args) = prefix.strip_suffix(' ') {
                return (*command, args);
            }
        }
    }
    (Command::None, text)
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|ch| ch.is_ascii_digit())
}

/// Left-pad a numeric id with zeros to width 3.
pub fn pad_id(raw: &str) -> String {
    format!("{:0>3}", raw)
}
