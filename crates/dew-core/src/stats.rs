//! Stats snapshots and join detection.
//!
//! A snapshot is whatever one poll of the server's HTTP stats endpoint
//! returned. Joins are detected by diffing the player roster of two
//! consecutive snapshots of the same server by UID.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

/// UID the server reports for entities that are not real players.
pub const SENTINEL_UID: &str = "0000000000000000";

/// One player record from the stats endpoint.
///
/// Only `name`, `serviceTag` and `uid` are guaranteed; the rest are filled in
/// by newer server builds and default to zero when absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Player {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub service_tag: String,
    #[serde(deserialize_with = "null_as_default")]
    pub uid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub team: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub primary_color: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_alive: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub score: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub kills: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub assists: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub deaths: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub betrayals: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub time_spent_alive: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub suicides: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub best_streak: i32,
}

impl Player {
    pub fn is_sentinel(&self) -> bool {
        self.uid == SENTINEL_UID
    }
}

/// Decoded body of the stats endpoint.
///
/// The feature flags are strings on the wire (`"1"`/`"0"`) and are kept that
/// way. `mods` is passed through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerStats {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub port: u16,
    #[serde(deserialize_with = "null_as_default")]
    pub host_player: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sprint_enabled: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sprint_unlimited_enabled: String,
    #[serde(deserialize_with = "null_as_default")]
    pub dual_wielding: String,
    #[serde(deserialize_with = "null_as_default")]
    pub assassination_enabled: String,
    #[serde(deserialize_with = "null_as_default")]
    pub voting_enabled: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub teams: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub map: String,
    #[serde(deserialize_with = "null_as_default")]
    pub map_file: String,
    #[serde(deserialize_with = "null_as_default")]
    pub variant: String,
    #[serde(deserialize_with = "null_as_default")]
    pub variant_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub num_players: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub max_players: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub mods: Vec<serde_json::Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub xnkid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub xnaddr: String,
    pub players: Vec<Player>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_dedicated: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub game_version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub eldewrito_version: String,
}

/// Decode `null` as the field's default. `#[serde(default)]` alone only
/// covers missing keys, and servers send `null` for unset metadata.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ServerStats {
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

/// Players in `current` whose UID is absent from `previous`, in `current`
/// order. The sentinel UID is never reported.
pub fn diff_joins(previous: &ServerStats, current: &ServerStats) -> Vec<Player> {
    let known: HashSet<&str> = previous.players.iter().map(|p| p.uid.as_str()).collect();
    current
        .players
        .iter()
        .filter(|p| !p.is_sentinel() && !known.contains(p.uid.as_str()))
        .cloned()
        .collect()
}

/// What a failed poll does to the stored snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorPolicy {
    /// Keep the last good snapshot and skip the diff for that cycle.
    #[default]
    KeepPrevious,
    /// Replace the stored snapshot with an empty one. Every player on the
    /// next good poll is then reported as joined again.
    Reset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RosterPolicy {
    /// Report everyone on the first accepted snapshot as joined.
    pub announce_initial_roster: bool,
    pub on_decode_error: DecodeErrorPolicy,
}

impl Default for RosterPolicy {
    fn default() -> Self {
        Self {
            announce_initial_roster: true,
            on_decode_error: DecodeErrorPolicy::KeepPrevious,
        }
    }
}

/// The current snapshot of one server.
///
/// Owned by that server's supervisor and lent to each session in turn, so a
/// reconnect does not look like everybody joining again.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    current: ServerStats,
    primed: bool,
    policy: RosterPolicy,
}

impl Roster {
    pub fn new(policy: RosterPolicy) -> Self {
        Self {
            current: ServerStats::default(),
            primed: false,
            policy,
        }
    }

    pub fn current(&self) -> &ServerStats {
        &self.current
    }

    /// Whether at least one snapshot has been accepted.
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Replace the current snapshot and return newly joined players.
    pub fn apply(&mut self, next: ServerStats) -> Vec<Player> {
        let joins = if self.primed || self.policy.announce_initial_roster {
            diff_joins(&self.current, &next)
        } else {
            Vec::new()
        };
        self.current = next;
        self.primed = true;
        joins
    }

    /// Record a poll whose body could not be fetched or decoded.
    pub fn apply_failure(&mut self) {
        if self.policy.on_decode_error == DecodeErrorPolicy::Reset {
            self.current = ServerStats::default();
        }
    }
}
