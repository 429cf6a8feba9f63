//! Fan-out of bridge events to subscriber connections.
//!
//! The subscriber set lives inside a single dispatch task. Sessions and
//! connection handlers only ever talk to it through [`HubHandle`], so
//! membership changes and deliveries are applied one at a time in arrival
//! order and no two writers ever touch the same connection.
//!
//! Delivery to a subscriber is a `try_send` onto its bounded outbox. The
//! outbox is drained by that connection's writer task, the only code that
//! writes to the socket. If the outbox is closed (writer gone) or full
//! (subscriber too slow), the subscriber is dropped after that one failed
//! attempt; dropping its outbox sender closes the connection.

use std::collections::HashMap;
use std::sync::Arc;

use dew_core::{BridgeEvent, SubscriberId};
use dew_rcon::EventSink;
use dew_settings::HubSettings;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Serialized event as delivered to every subscriber.
pub type Outbound = Arc<str>;

enum HubCommand {
    Register {
        id: SubscriberId,
        outbox: mpsc::Sender<Outbound>,
    },
    Unregister(SubscriberId),
    Broadcast(BridgeEvent),
    Count(oneshot::Sender<usize>),
    Shutdown,
}

/// Cheap, cloneable front door to the hub.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
    subscriber_queue: usize,
}

impl HubHandle {
    /// Add a subscriber. The returned receiver yields every event broadcast
    /// after the hub processes the registration, and ends when the hub drops
    /// the subscriber.
    pub async fn register(&self) -> (SubscriberId, mpsc::Receiver<Outbound>) {
        let id = SubscriberId::new();
        let (outbox, rx) = mpsc::channel(self.subscriber_queue);
        if self
            .tx
            .send(HubCommand::Register {
                id: id.clone(),
                outbox,
            })
            .await
            .is_err()
        {
            warn!(subscriber_id = %id, "hub stopped, registration dropped");
        }
        (id, rx)
    }

    pub async fn unregister(&self, id: &SubscriberId) {
        let _ = self.tx.send(HubCommand::Unregister(id.clone())).await;
    }

    /// Queue an event for delivery. Never waits: if the hub's queue is full
    /// the event is dropped and logged.
    pub fn broadcast(&self, event: BridgeEvent) {
        match self.tx.try_send(HubCommand::Broadcast(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("hub queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("hub stopped, dropping event");
            }
        }
    }

    /// Number of registered subscribers, after everything queued before
    /// this call has been applied. Zero once the hub has stopped.
    pub async fn subscriber_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(HubCommand::Count(tx)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Drop every subscriber and stop the dispatch task.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(HubCommand::Shutdown).await;
    }
}

impl EventSink for HubHandle {
    fn publish(&self, event: BridgeEvent) {
        self.broadcast(event);
    }
}

/// The dispatch task's state.
pub struct BroadcastHub {
    rx: mpsc::Receiver<HubCommand>,
    subscribers: HashMap<SubscriberId, mpsc::Sender<Outbound>>,
}

impl BroadcastHub {
    /// Start the dispatch task.
    pub fn spawn(settings: &HubSettings) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(settings.queue_capacity);
        let hub = Self {
            rx,
            subscribers: HashMap::new(),
        };
        let handle = HubHandle {
            tx,
            subscriber_queue: settings.subscriber_queue,
        };
        (handle, tokio::spawn(hub.run()))
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                HubCommand::Register { id, outbox } => {
                    info!(subscriber_id = %id, "subscriber registered");
                    let _ = self.subscribers.insert(id, outbox);
                }
                HubCommand::Unregister(id) => {
                    if self.subscribers.remove(&id).is_some() {
                        info!(subscriber_id = %id, "subscriber unregistered");
                    }
                }
                HubCommand::Broadcast(event) => self.deliver(&event),
                HubCommand::Count(reply) => {
                    let _ = reply.send(self.subscribers.len());
                }
                HubCommand::Shutdown => break,
            }
        }

        info!(subscribers = self.subscribers.len(), "hub stopped");
    }

    fn deliver(&mut self, event: &BridgeEvent) {
        let json: Outbound = match serde_json::to_string(event) {
            Ok(j) => j.into(),
            Err(e) => {
                warn!(event_type = event.event_type(), error = %e, "failed to serialize event");
                return;
            }
        };

        let mut failed = Vec::new();
        for (id, outbox) in &self.subscribers {
            match outbox.try_send(Arc::clone(&json)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber_id = %id, "subscriber too slow, disconnecting");
                    failed.push(id.clone());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(subscriber_id = %id, "subscriber connection gone");
                    failed.push(id.clone());
                }
            }
        }

        for id in &failed {
            let _ = self.subscribers.remove(id);
        }
        debug!(
            event_type = event.event_type(),
            server = event.server(),
            recipients = self.subscribers.len(),
            removed = failed.len(),
            "broadcast event"
        );
    }
}
