//! Application layer for parley
//!
//! This crate contains the conversation orchestration core: the session
//! store (single writer for all transcript state), the message dispatch
//! controller, the streaming consumer, the consensus poller and the
//! cancellation coordinator. It depends only on the domain layer; all
//! transport goes through the [`BackendGateway`] port.

pub mod dispatch;
pub mod ports;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use dispatch::{
    dispatcher::{DispatchError, Dispatcher, SendMode},
    generation::{GenerationCoordinator, GenerationGuard},
    poller::ChannelPoller,
};
pub use ports::backend::{BackendGateway, GatewayError, SendMessageRequest, StreamHandle};
pub use store::{event::StoreEvent, session_store::SessionStore};
