use dew_core::BridgeEvent;
use tokio::sync::mpsc;

/// Where sessions hand their events. Must never block the caller.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: BridgeEvent);
}

impl EventSink for mpsc::UnboundedSender<BridgeEvent> {
    fn publish(&self, event: BridgeEvent) {
        let _ = self.send(event);
    }
}

impl EventSink for mpsc::Sender<BridgeEvent> {
    fn publish(&self, event: BridgeEvent) {
        if let Err(e) = self.try_send(event) {
            tracing::warn!(error = %e, "event sink rejected event");
        }
    }
}
