//! Wires the hub, one supervisor per configured server, and the subscriber
//! listener together.

use std::net::SocketAddr;
use std::sync::Arc;

use dew_rcon::{Backoff, EventSink, ServerSession, SessionOptions, Supervisor};
use dew_settings::BridgeSettings;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ServerError;
use crate::hub::{BroadcastHub, HubHandle};
use crate::server::{self, AppState, ListenConfig};

pub struct BridgeOrchestrator {
    settings: BridgeSettings,
}

impl BridgeOrchestrator {
    /// Validate settings up front so a bad config never gets half-started.
    pub fn new(settings: BridgeSettings) -> Result<Self, ServerError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    /// Start everything. Returns once the listener is bound; sessions
    /// connect in the background.
    pub async fn start(self) -> Result<BridgeHandle, ServerError> {
        let settings = self.settings;
        let cancel = CancellationToken::new();
        let (hub, hub_task) = BroadcastHub::spawn(&settings.hub);

        let http = reqwest::Client::new();
        let options = SessionOptions::from(&settings.session);
        let policy = settings.session.roster_policy();
        let sink: Arc<dyn EventSink> = Arc::new(hub.clone());

        let mut supervisors = Vec::with_capacity(settings.servers.len());
        for (name, config) in &settings.servers {
            let session = ServerSession::new(
                name.clone(),
                config.clone(),
                options.clone(),
                http.clone(),
                Arc::clone(&sink),
            );
            let supervisor = Supervisor::new(session, Backoff::from_settings(&settings.reconnect), policy);
            supervisors.push(tokio::spawn(supervisor.run(cancel.child_token())));
        }

        let state = AppState {
            hub: hub.clone(),
            shared_secret: settings.listen.shared_secret.as_deref().map(Into::into),
            servers: settings.servers.keys().cloned().collect(),
        };
        let listener = match server::start(ListenConfig::from(&settings.listen), state, cancel.child_token()).await {
            Ok(listener) => listener,
            Err(e) => {
                cancel.cancel();
                hub.shutdown().await;
                return Err(e);
            }
        };

        info!(
            servers = settings.servers.len(),
            addr = %listener.local_addr,
            "bridge started"
        );

        Ok(BridgeHandle {
            local_addr: listener.local_addr,
            hub,
            cancel,
            hub_task,
            listener_task: listener.task,
            supervisors,
        })
    }
}

/// A running bridge.
pub struct BridgeHandle {
    pub local_addr: SocketAddr,
    hub: HubHandle,
    cancel: CancellationToken,
    hub_task: JoinHandle<()>,
    listener_task: JoinHandle<()>,
    supervisors: Vec<JoinHandle<()>>,
}

impl BridgeHandle {
    /// Stop sessions, close every subscriber, then stop the listener.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.supervisors {
            if let Err(e) = task.await {
                warn!(error = %e, "supervisor task failed");
            }
        }
        // Closing the hub drops every outbox, which closes the subscriber
        // sockets the listener would otherwise wait on.
        self.hub.shutdown().await;
        if let Err(e) = self.hub_task.await {
            warn!(error = %e, "hub task failed");
        }
        if let Err(e) = self.listener_task.await {
            warn!(error = %e, "listener task failed");
        }
        info!("bridge stopped");
    }
}
