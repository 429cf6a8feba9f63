use dew_core::{Roster, RosterPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backoff::Backoff;
use crate::session::ServerSession;

/// Keeps one server bridged: re-runs its session after every close, with
/// backoff, until shutdown.
///
/// The supervisor owns the server's roster between runs so joins are diffed
/// against the last snapshot seen before the disconnect.
pub struct Supervisor {
    session: ServerSession,
    backoff: Backoff,
    roster: Roster,
}

impl Supervisor {
    pub fn new(session: ServerSession, backoff: Backoff, policy: RosterPolicy) -> Self {
        Self {
            session,
            backoff,
            roster: Roster::new(policy),
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let server = self.session.name().to_owned();

        while !cancel.is_cancelled() {
            let roster = std::mem::take(&mut self.roster);
            let outcome = self.session.run(roster, &cancel).await;
            self.roster = outcome.roster;

            if cancel.is_cancelled() {
                break;
            }
            if outcome.streamed {
                self.backoff.reset();
            }

            let delay = self.backoff.next_delay();
            match &outcome.result {
                Err(e) => warn!(
                    server = %server,
                    error = %e,
                    kind = e.error_kind(),
                    attempt = self.backoff.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "reconnecting after session closed"
                ),
                Ok(()) => info!(server = %server, delay_ms = delay.as_millis() as u64, "reconnecting"),
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!(server = %server, "supervisor stopped");
    }
}
