//! One server's bridge session.
//!
//! `Disconnected → Authenticating → Streaming → Closed`
//!
//! While streaming, the session reads the control channel on its own task
//! and runs a [`Poller`] beside it. When the read side ends (error, remote
//! close, or shutdown) the poller is cancelled too: chat and join events for
//! a server stop together and resume together on reconnect.

use std::sync::Arc;
use std::time::Duration;

use dew_core::{parse_chat_line, BridgeEvent, Roster, SessionId};
use dew_settings::{ServerConfig, SessionSettings};
use futures::StreamExt;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{self, RconStream};
use crate::error::RconError;
use crate::poller::Poller;
use crate::sink::EventSink;
use crate::stats_source::{HttpStatsSource, StatsSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Authenticating,
    Streaming,
    Closed,
}

/// Session knobs shared by every server.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub poll_interval: Duration,
    pub handshake_timeout: Duration,
    pub publish_raw_lines: bool,
    pub publish_stats: bool,
}

impl From<&SessionSettings> for SessionOptions {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            handshake_timeout: settings.handshake_timeout(),
            publish_raw_lines: settings.publish_raw_lines,
            publish_stats: settings.publish_stats,
        }
    }
}

/// What a finished run hands back to its supervisor.
pub struct SessionOutcome {
    /// The roster as the poller left it.
    pub roster: Roster,
    /// Whether the session got as far as streaming.
    pub streamed: bool,
    /// `Ok` only when the run ended because of shutdown.
    pub result: Result<(), RconError>,
}

pub struct ServerSession {
    name: String,
    config: ServerConfig,
    options: SessionOptions,
    stats: Arc<dyn StatsSource>,
    sink: Arc<dyn EventSink>,
    state_tx: watch::Sender<SessionState>,
}

impl ServerSession {
    pub fn new(
        name: impl Into<String>,
        config: ServerConfig,
        options: SessionOptions,
        http: reqwest::Client,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let stats = Arc::new(HttpStatsSource::new(
            http,
            config.stats_url(),
            options.poll_interval,
        ));
        Self::with_stats_source(name, config, options, stats, sink)
    }

    pub fn with_stats_source(
        name: impl Into<String>,
        config: ServerConfig,
        options: SessionOptions,
        stats: Arc<dyn StatsSource>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            name: name.into(),
            config,
            options,
            stats,
            sink,
            state_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Connect, authenticate and stream until the channel fails or `cancel`
    /// fires. Always ends in `Closed`.
    pub async fn run(&self, roster: Roster, cancel: &CancellationToken) -> SessionOutcome {
        let session_id = SessionId::new();
        self.set_state(SessionState::Authenticating);

        let ws = tokio::select! {
            () = cancel.cancelled() => {
                self.set_state(SessionState::Closed);
                return SessionOutcome { roster, streamed: false, result: Ok(()) };
            }
            connected = self.connect() => connected,
        };
        let ws = match ws {
            Ok(ws) => ws,
            Err(e) => {
                warn!(server = %self.name, session_id = %session_id, error = %e, kind = e.error_kind(), "session failed to start");
                self.set_state(SessionState::Closed);
                return SessionOutcome { roster, streamed: false, result: Err(e) };
            }
        };

        self.set_state(SessionState::Streaming);
        info!(server = %self.name, session_id = %session_id, url = %self.config.rcon_url(), "session streaming");

        let poll_cancel = cancel.child_token();
        let poller = Poller {
            server: self.name.clone(),
            source: Arc::clone(&self.stats),
            sink: Arc::clone(&self.sink),
            interval: self.options.poll_interval,
            publish_stats: self.options.publish_stats,
        };
        let poll_task = tokio::spawn(poller.run(roster, poll_cancel.clone()));

        let result = self.read_loop(ws, cancel).await;

        poll_cancel.cancel();
        let roster = match poll_task.await {
            Ok(roster) => roster,
            Err(e) => {
                warn!(server = %self.name, error = %e, "stats poller task failed, roster lost");
                Roster::default()
            }
        };

        match &result {
            Ok(()) => info!(server = %self.name, session_id = %session_id, "session closed on shutdown"),
            Err(e) => warn!(server = %self.name, session_id = %session_id, error = %e, kind = e.error_kind(), "session closed"),
        }
        self.set_state(SessionState::Closed);

        SessionOutcome { roster, streamed: true, result }
    }

    async fn connect(&self) -> Result<RconStream, RconError> {
        let mut ws = channel::dial(&self.config.rcon_url(), self.options.handshake_timeout).await?;
        channel::authenticate(&mut ws, &self.config.rcon_password).await?;
        Ok(ws)
    }

    async fn read_loop(&self, mut ws: RconStream, cancel: &CancellationToken) -> Result<(), RconError> {
        let result = loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break Ok(()),
                next = ws.next() => next,
            };

            match next {
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.as_str().to_owned()).unwrap_or_default();
                    break Err(RconError::Closed(reason));
                }
                Some(Ok(message)) => {
                    if let Some(line) = channel::frame_text(&message) {
                        self.handle_line(&line);
                    }
                }
                Some(Err(e)) => break Err(RconError::Read(e.to_string())),
                None => break Err(RconError::Closed("stream ended".into())),
            }
        };

        if result.is_ok() {
            let _ = ws.close(None).await;
        }
        result
    }

    fn handle_line(&self, line: &str) {
        if self.options.publish_raw_lines {
            self.sink.publish(BridgeEvent::Rcon {
                server: self.name.clone(),
                line: line.to_owned(),
            });
        }
        if let Some(chat) = parse_chat_line(line) {
            debug!(server = %self.name, player = %chat.name, "chat line");
            self.sink.publish(BridgeEvent::Chat(chat.into_event(&self.name)));
        }
    }

    fn set_state(&self, state: SessionState) {
        let _ = self.state_tx.send_replace(state);
    }
}
