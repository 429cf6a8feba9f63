use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use dew_settings::ListenSettings;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::error::ServerError;
use crate::hub::HubHandle;
use crate::subscriber;

/// Listener configuration.
#[derive(Clone, Debug)]
pub struct ListenConfig {
    pub address: String,
    pub port: u16,
    pub shared_secret: Option<String>,
}

impl From<&ListenSettings> for ListenConfig {
    fn from(settings: &ListenSettings) -> Self {
        Self {
            address: settings.address.clone(),
            port: settings.port,
            shared_secret: settings.shared_secret.clone(),
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub shared_secret: Option<Arc<str>>,
    pub servers: Vec<String>,
}

/// Build the Axum router with all routes.
///
/// Subscribers upgrade on `/` when no secret is configured and on
/// `/<secret>` when one is. Every other upgrade attempt, and any plain
/// request on those paths, gets `426 Upgrade Required`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_root_handler))
        .route("/health", get(health_handler))
        .route("/{token}", get(ws_token_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until `cancel` fires.
pub async fn start(
    config: ListenConfig,
    state: AppState,
    cancel: CancellationToken,
) -> Result<ServerHandle, ServerError> {
    let addr = format!("{}:{}", config.address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
    let local_addr = listener.local_addr()?;

    let router = build_router(state);
    tracing::info!(addr = %local_addr, secured = config.shared_secret.is_some(), "subscriber listener started");

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
        {
            tracing::error!(error = %e, "subscriber listener failed");
        }
    });

    Ok(ServerHandle { local_addr, task })
}

/// Handle returned by [`start`].
pub struct ServerHandle {
    pub local_addr: SocketAddr,
    pub task: tokio::task::JoinHandle<()>,
}

async fn ws_root_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if state.shared_secret.is_some() {
        tracing::debug!("rejected subscriber without secret");
        return upgrade_required();
    }
    accept(ws, state)
}

async fn ws_token_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match &state.shared_secret {
        Some(secret) if **secret == *token => accept(ws, state),
        _ => {
            tracing::debug!("rejected subscriber with wrong path");
            upgrade_required()
        }
    }
}

fn accept(ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>, state: AppState) -> Response {
    match ws {
        Ok(ws) => {
            let hub = state.hub.clone();
            ws.on_upgrade(move |socket| subscriber::handle_connection(socket, hub))
        }
        Err(rejection) => {
            tracing::debug!(reason = %rejection, "rejected non-upgrade request");
            upgrade_required()
        }
    }
}

fn upgrade_required() -> Response {
    StatusCode::UPGRADE_REQUIRED.into_response()
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let subscribers = state.hub.subscriber_count().await;
    Json(json!({
        "status": "healthy",
        "subscribers": subscribers,
        "servers": state.servers,
    }))
}
