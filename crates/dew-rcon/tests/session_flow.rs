//! End-to-end session tests against a local fake game server that serves
//! the `dew-rcon` WebSocket and the HTTP stats endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use dew_core::{BridgeEvent, Roster, RosterPolicy};
use dew_rcon::{Backoff, RconError, ServerSession, SessionOptions, SessionState, Supervisor};
use dew_settings::ServerConfig;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(5);

enum Push {
    Line(String),
    Hangup,
}

#[derive(Clone)]
struct FakeServer {
    roster: Arc<Mutex<Vec<&'static str>>>,
    // Held by the live connection, so a reconnect picks up where it left off.
    pushes: Arc<Mutex<mpsc::UnboundedReceiver<Push>>>,
    passwords: mpsc::UnboundedSender<String>,
}

struct Handle {
    rcon_port: u16,
    stats_port: u16,
    roster: Arc<Mutex<Vec<&'static str>>>,
    push: mpsc::UnboundedSender<Push>,
    passwords: mpsc::UnboundedReceiver<String>,
}

async fn rcon_handler(ws: WebSocketUpgrade, State(fake): State<FakeServer>) -> impl IntoResponse {
    ws.protocols(["dew-rcon"])
        .on_upgrade(move |socket| serve_rcon(socket, fake))
}

async fn serve_rcon(mut socket: WebSocket, fake: FakeServer) {
    if let Some(Ok(Message::Text(password))) = socket.recv().await {
        let _ = fake.passwords.send(password.as_str().to_owned());
    }
    let mut pushes = fake.pushes.lock().await;
    while let Some(push) = pushes.recv().await {
        match push {
            Push::Line(line) => {
                if socket.send(Message::Text(line.into())).await.is_err() {
                    return;
                }
            }
            Push::Hangup => return,
        }
    }
}

async fn stats_handler(State(fake): State<FakeServer>) -> impl IntoResponse {
    let players: Vec<_> = fake
        .roster
        .lock()
        .await
        .iter()
        .map(|uid| json!({"name": format!("player-{uid}"), "serviceTag": "TAG", "uid": uid}))
        .collect();
    Json(json!({"name": "fake", "map": "Guardian", "numPlayers": players.len(), "players": players}))
}

async fn spawn_fake_server() -> Handle {
    let (push_tx, push_rx) = mpsc::unbounded_channel();
    let (pw_tx, pw_rx) = mpsc::unbounded_channel();
    let fake = FakeServer {
        roster: Arc::new(Mutex::new(Vec::new())),
        pushes: Arc::new(Mutex::new(push_rx)),
        passwords: pw_tx,
    };

    let rcon = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let stats = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rcon_port = rcon.local_addr().unwrap().port();
    let stats_port = stats.local_addr().unwrap().port();

    let rcon_router = Router::new().route("/", get(rcon_handler)).with_state(fake.clone());
    let stats_router = Router::new().route("/", get(stats_handler)).with_state(fake.clone());
    let _ = tokio::spawn(async move { axum::serve(rcon, rcon_router).await.ok() });
    let _ = tokio::spawn(async move { axum::serve(stats, stats_router).await.ok() });

    Handle {
        rcon_port,
        stats_port,
        roster: fake.roster,
        push: push_tx,
        passwords: pw_rx,
    }
}

fn session_for(handle: &Handle) -> (ServerSession, mpsc::UnboundedReceiver<BridgeEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = ServerSession::new(
        "east",
        ServerConfig {
            address: "127.0.0.1".into(),
            stats_port: handle.stats_port,
            rcon_port: handle.rcon_port,
            rcon_password: "s3cret".into(),
        },
        SessionOptions {
            poll_interval: Duration::from_millis(200),
            handshake_timeout: Duration::from_secs(2),
            publish_raw_lines: false,
            publish_stats: false,
        },
        reqwest::Client::new(),
        Arc::new(tx),
    );
    (session, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<BridgeEvent>) -> BridgeEvent {
    timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap()
}

#[tokio::test]
async fn streams_chat_and_joins_then_tears_down_both_on_read_error() {
    let mut fake = spawn_fake_server().await;
    let (session, mut events) = session_for(&fake);
    let session = Arc::new(session);

    let runner = Arc::clone(&session);
    let run = tokio::spawn(async move {
        runner
            .run(Roster::new(RosterPolicy::default()), &CancellationToken::new())
            .await
    });

    // Password is the first frame.
    let password = timeout(TIMEOUT, fake.passwords.recv()).await.unwrap().unwrap();
    assert_eq!(password, "s3cret");

    // Empty roster first, then one player appears: exactly one join.
    tokio::time::sleep(Duration::from_millis(300)).await;
    fake.roster.lock().await.push("x");
    match next_event(&mut events).await {
        BridgeEvent::Join(join) => {
            assert_eq!(join.server, "east");
            assert_eq!(join.uid, "x");
            assert_eq!(join.name, "player-x");
            assert_eq!(join.service_tag, "TAG");
        }
        other => panic!("expected join, got {other:?}"),
    }

    fake.push.send(Push::Line("Map loaded: guardian".into())).unwrap();
    fake.push
        .send(Push::Line("[12:01:00] <Alice/abc123ef/10.0.0.5> hello".into()))
        .unwrap();
    match next_event(&mut events).await {
        BridgeEvent::Chat(chat) => {
            assert_eq!(chat.server, "east");
            assert_eq!(chat.timestamp, "12:01:00");
            assert_eq!(chat.player, "Alice");
            assert_eq!(chat.uid, "abc123ef");
            assert_eq!(chat.ip, "10.0.0.5");
            assert_eq!(chat.message, "hello");
        }
        other => panic!("expected chat, got {other:?}"),
    }

    // Server hangs up: the session closes and the poller stops with it.
    fake.push.send(Push::Hangup).unwrap();
    let outcome = timeout(TIMEOUT, run).await.unwrap().unwrap();
    assert!(outcome.streamed);
    let err = outcome.result.unwrap_err();
    assert!(
        matches!(err, RconError::Read(_) | RconError::Closed(_)),
        "got: {err:?}"
    );
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(outcome.roster.current().players.len(), 1);

    fake.roster.lock().await.push("y");
    tokio::time::sleep(Duration::from_millis(600)).await;
    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(&event, BridgeEvent::Join(j) if j.uid == "y"),
            "join emitted after session closed: {event:?}"
        );
    }
}

#[tokio::test]
async fn shutdown_closes_session_cleanly() {
    let mut fake = spawn_fake_server().await;
    let (session, _events) = session_for(&fake);
    let session = Arc::new(session);
    let mut states = session.subscribe_state();

    let cancel = CancellationToken::new();
    let runner = Arc::clone(&session);
    let token = cancel.clone();
    let run = tokio::spawn(async move {
        runner
            .run(Roster::new(RosterPolicy::default()), &token)
            .await
    });

    let _ = timeout(TIMEOUT, fake.passwords.recv()).await.unwrap().unwrap();
    timeout(TIMEOUT, states.wait_for(|s| *s == SessionState::Streaming))
        .await
        .unwrap()
        .unwrap();

    cancel.cancel();
    let outcome = timeout(TIMEOUT, run).await.unwrap().unwrap();
    assert!(outcome.streamed);
    assert!(outcome.result.is_ok());
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn supervisor_reconnect_keeps_roster() {
    let mut fake = spawn_fake_server().await;
    fake.roster.lock().await.push("x");
    let (session, mut events) = session_for(&fake);
    let supervisor = Supervisor::new(
        session,
        Backoff::new(Duration::from_millis(10), Duration::from_millis(50), 0.0),
        RosterPolicy::default(),
    );
    let cancel = CancellationToken::new();
    let task = tokio::spawn(supervisor.run(cancel.clone()));

    let _ = timeout(TIMEOUT, fake.passwords.recv()).await.unwrap().unwrap();
    match next_event(&mut events).await {
        BridgeEvent::Join(join) => assert_eq!(join.uid, "x"),
        other => panic!("expected join, got {other:?}"),
    }

    fake.push.send(Push::Hangup).unwrap();
    let _ = timeout(TIMEOUT, fake.passwords.recv()).await.unwrap().unwrap();

    // Polling resumed on the new connection: a newcomer is announced, the
    // player seen before the hangup is not.
    fake.roster.lock().await.push("y");
    loop {
        match next_event(&mut events).await {
            BridgeEvent::Join(join) if join.uid == "y" => break,
            BridgeEvent::Join(join) => panic!("re-announced {} after reconnect", join.uid),
            _ => {}
        }
    }

    cancel.cancel();
    timeout(TIMEOUT, task).await.unwrap().unwrap();
}
