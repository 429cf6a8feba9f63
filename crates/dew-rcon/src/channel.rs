//! Control-channel dialing.
//!
//! The RCON endpoint is a plain WebSocket that only accepts clients offering
//! the `dew-rcon` subprotocol. The first frame a client sends is the
//! password; there is no acknowledgement, a wrong password just shows up as
//! the server closing the connection.

use std::time::Duration;

use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::RconError;

pub const SUBPROTOCOL: &str = "dew-rcon";

pub type RconStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open the control channel. Does not authenticate.
pub async fn dial(url: &str, handshake_timeout: Duration) -> Result<RconStream, RconError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| RconError::Dial(e.to_string()))?;
    let _ = request
        .headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));

    let (ws, _response) = tokio::time::timeout(handshake_timeout, connect_async(request))
        .await
        .map_err(|_| RconError::HandshakeTimeout(handshake_timeout))?
        .map_err(|e| RconError::Dial(e.to_string()))?;
    Ok(ws)
}

/// Send the password frame.
pub async fn authenticate(ws: &mut RconStream, password: &str) -> Result<(), RconError> {
    ws.send(Message::text(password.to_owned()))
        .await
        .map_err(|e| RconError::Auth(e.to_string()))
}

/// The log line carried by an inbound frame, if it carries any.
///
/// One frame is one line: embedded newlines are kept, a trailing line
/// terminator is dropped.
pub fn frame_text(message: &Message) -> Option<String> {
    let text = match message {
        Message::Text(text) => text.as_str().to_owned(),
        Message::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        _ => return None,
    };
    Some(text.trim_end_matches(['\r', '\n']).to_owned())
}
