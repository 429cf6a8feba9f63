pub mod error;
pub mod hub;
pub mod orchestrator;
pub mod server;
pub mod subscriber;

pub use error::ServerError;
pub use hub::{BroadcastHub, HubHandle};
pub use orchestrator::{BridgeHandle, BridgeOrchestrator};
pub use server::{build_router, start, AppState, ListenConfig, ServerHandle};
