//! Transport seam.
//!
//! Connecting is transport-specific and not part of the trait: each
//! implementation joins a room by code and hands back a connected
//! [`Transport`] plus the stream of [`TransportEvent`]s for that connection.
//! The game only needs directed sends and the inbound event stream.

pub mod memory;
pub mod websocket;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::protocol::WireMessage;
use crate::types::PeerId;

/// Inbound events for one connection, delivered in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    PeerJoined(PeerId),
    PeerLeft(PeerId),
    Message { from: PeerId, message: WireMessage },
}

/// Directed, fire-and-forget message delivery within a room.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Identity this connection was assigned when it joined the room
    fn self_id(&self) -> &PeerId;

    /// Queue `message` for a single peer. Returning `Ok` means the message
    /// was handed to the transport, not that it was delivered.
    async fn send(&self, to: &PeerId, message: &WireMessage) -> Result<(), TransportError>;
}
