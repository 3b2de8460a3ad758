//! Chat transport boundary.
//!
//! A `Transport` opens one authenticated link at a time. Each link hands back a `Connection`
//! for sending and an ordered stream of `TransportEvent`s (credential rotation, connection state,
//! inbound messages). The session manager owns the link; nothing else touches it.

mod bridge;
mod event;
pub mod protocol;

pub use bridge::BridgeTransport;
pub use event::{
    ConnectionState, ConnectionUpdate, DisconnectReason, InboundEvent, TransportEvent,
};

use crate::credentials::Credentials;
use crate::error::TransportError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// An opened link: its send handle and its event stream. The stream ends after a close event.
pub struct TransportLink {
    pub connection: Arc<dyn Connection>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens links to the chat network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a link, resuming with `credentials` or starting the pairing flow when None.
    async fn connect(&self, credentials: Option<Credentials>)
        -> Result<TransportLink, TransportError>;
}

/// Send handle of a live link.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send a text message; the result is the transport's own verdict.
    async fn send_text(&self, address: &str, text: &str) -> Result<(), TransportError>;
    /// Tear the link down. The event stream then reports a close.
    fn close(&self);
}
