use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};

use crate::hub::HubHandle;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Drive one subscriber connection until either side goes away.
///
/// The writer half is owned by a single task that drains the hub-fed outbox,
/// so hub deliveries and heartbeats never interleave on the socket. The
/// reader half only watches for close; subscribers have nothing to say.
pub async fn handle_connection(socket: WebSocket, hub: HubHandle) {
    let (id, mut outbox) = hub.register().await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_id = id.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = outbox.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            // Dropped by the hub.
                            let _ = ws_tx.send(WsMessage::Close(None)).await;
                            break;
                        }
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(subscriber_id = %writer_id, "sent ping");
                }
            }
        }
    });

    let reader_id = id.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Close(_) => break,
                WsMessage::Text(_) | WsMessage::Binary(_) => {
                    tracing::trace!(subscriber_id = %reader_id, "ignoring inbound subscriber frame");
                }
                _ => {}
            }
        }
    });

    // A finished reader leaves the writer running: once unregistered, the
    // hub drops the outbox and the writer sends a close frame on its own.
    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => {}
    }

    hub.unregister(&id).await;
    tracing::info!(subscriber_id = %id, "subscriber disconnected");
}
