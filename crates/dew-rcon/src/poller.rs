//! Periodic stats polling for one server.
//!
//! Polls are single-flight: each request is awaited (and bounded by the poll
//! interval) before the next tick is taken, and ticks missed while a slow
//! request was outstanding are skipped rather than bunched up.

use std::sync::Arc;
use std::time::Duration;

use dew_core::{BridgeEvent, JoinEvent, Roster};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::RconError;
use crate::sink::EventSink;
use crate::stats_source::StatsSource;

pub struct Poller {
    pub server: String,
    pub source: Arc<dyn StatsSource>,
    pub sink: Arc<dyn EventSink>,
    pub interval: Duration,
    pub publish_stats: bool,
}

impl Poller {
    /// Poll until cancelled, then hand the roster back.
    ///
    /// A poll in flight when `cancel` fires is dropped and its result never
    /// reaches the roster or the sink.
    pub async fn run(self, mut roster: Roster, cancel: CancellationToken) -> Roster {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                r = tokio::time::timeout(self.interval, self.source.fetch()) => {
                    r.unwrap_or(Err(RconError::StatsTimeout(self.interval)))
                }
            };

            self.apply(&mut roster, fetched);
        }

        debug!(server = %self.server, "stats poller stopped");
        roster
    }

    /// Fold one poll result into the roster and publish what it produced.
    pub fn apply(&self, roster: &mut Roster, fetched: Result<dew_core::ServerStats, RconError>) {
        match fetched {
            Ok(stats) => {
                let snapshot = self.publish_stats.then(|| Box::new(stats.clone()));
                let joins = roster.apply(stats);
                for player in &joins {
                    debug!(server = %self.server, uid = %player.uid, name = %player.name, "player joined");
                    self.sink
                        .publish(BridgeEvent::Join(JoinEvent::from_player(&self.server, player)));
                }
                if let Some(stats) = snapshot {
                    self.sink.publish(BridgeEvent::Stats {
                        server: self.server.clone(),
                        stats,
                    });
                }
            }
            Err(e) => {
                warn!(
                    server = %self.server,
                    error = %e,
                    kind = e.error_kind(),
                    "stats poll failed"
                );
                roster.apply_failure();
            }
        }
    }
}
