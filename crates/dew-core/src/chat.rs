//! Chat line extraction from raw RCON log output.
//!
//! The server prints chat as
//! `[<timestamp>] <<name>/<uid>/<ipv4>> <message>`. Everything else on the
//! control channel is ordinary log noise and yields `None`.

use std::sync::LazyLock;

use regex::Regex;

use crate::events::ChatEvent;

static CHAT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[([^\]]*)\] <(.+?)/([0-9a-f]+)/(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})> (.*)$",
    )
    .unwrap()
});

/// The five captured fields of a chat line, copied verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatLine {
    pub timestamp: String,
    pub name: String,
    pub uid: String,
    pub ip: String,
    pub message: String,
}

impl ChatLine {
    /// Attach the originating server name.
    pub fn into_event(self, server: impl Into<String>) -> ChatEvent {
        ChatEvent {
            server: server.into(),
            timestamp: self.timestamp,
            player: self.name,
            uid: self.uid,
            ip: self.ip,
            message: self.message,
        }
    }
}

/// Parse one raw line. Returns `None` for anything that is not a chat line.
pub fn parse_chat_line(line: &str) -> Option<ChatLine> {
    let caps = CHAT_LINE.captures(line)?;
    Some(ChatLine {
        timestamp: caps[1].to_string(),
        name: caps[2].to_string(),
        uid: caps[3].to_string(),
        ip: caps[4].to_string(),
        message: caps[5].to_string(),
    })
}
