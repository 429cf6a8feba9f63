pub mod backoff;
pub mod channel;
pub mod error;
pub mod poller;
pub mod session;
pub mod sink;
pub mod stats_source;
pub mod supervisor;

pub use backoff::Backoff;
pub use error::RconError;
pub use session::{ServerSession, SessionOptions, SessionOutcome, SessionState};
pub use sink::EventSink;
pub use stats_source::{HttpStatsSource, StatsSource};
pub use supervisor::Supervisor;
