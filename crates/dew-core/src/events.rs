use serde::{Deserialize, Serialize};

use crate::stats::{Player, ServerStats};

/// A chat line said on one server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub server: String,
    pub timestamp: String,
    pub player: String,
    #[serde(rename = "UID")]
    pub uid: String,
    #[serde(rename = "IP")]
    pub ip: String,
    pub message: String,
}

/// A player who was not on the previous roster of `server`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinEvent {
    pub server: String,
    pub name: String,
    pub service_tag: String,
    pub uid: String,
}

impl JoinEvent {
    pub fn from_player(server: impl Into<String>, player: &Player) -> Self {
        Self {
            server: server.into(),
            name: player.name.clone(),
            service_tag: player.service_tag.clone(),
            uid: player.uid.clone(),
        }
    }
}

/// Everything the bridge publishes to subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeEvent {
    #[serde(rename = "chat")]
    Chat(ChatEvent),

    #[serde(rename = "join")]
    Join(JoinEvent),

    /// Unparsed control-channel line. Only published when enabled.
    #[serde(rename = "rcon")]
    Rcon { server: String, line: String },

    /// Full snapshot from one poll. Only published when enabled.
    #[serde(rename = "stats")]
    Stats { server: String, stats: Box<ServerStats> },
}

impl BridgeEvent {
    pub fn server(&self) -> &str {
        match self {
            Self::Chat(e) => &e.server,
            Self::Join(e) => &e.server,
            Self::Rcon { server, .. } | Self::Stats { server, .. } => server,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chat(_) => "chat",
            Self::Join(_) => "join",
            Self::Rcon { .. } => "rcon",
            Self::Stats { .. } => "stats",
        }
    }
}

impl From<ChatEvent> for BridgeEvent {
    fn from(event: ChatEvent) -> Self {
        Self::Chat(event)
    }
}

impl From<JoinEvent> for BridgeEvent {
    fn from(event: JoinEvent) -> Self {
        Self::Join(event)
    }
}
