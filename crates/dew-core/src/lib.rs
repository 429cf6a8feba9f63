pub mod chat;
pub mod events;
pub mod ids;
pub mod stats;

pub use chat::{parse_chat_line, ChatLine};
pub use events::{BridgeEvent, ChatEvent, JoinEvent};
pub use ids::{SessionId, SubscriberId};
pub use stats::{diff_joins, DecodeErrorPolicy, Player, Roster, RosterPolicy, ServerStats, SENTINEL_UID};
