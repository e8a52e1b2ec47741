//! In-process transport.
//!
//! A [`MemoryHub`] plays the role of the signaling layer for participants
//! living in the same process: rooms keyed by code, presence events, and
//! directed delivery. Every message is pushed through its JSON encoding on
//! the way so the wire format is exercised exactly as over a network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Transport, TransportEvent};
use crate::error::TransportError;
use crate::protocol::WireMessage;
use crate::types::PeerId;

type Members = HashMap<PeerId, mpsc::UnboundedSender<TransportEvent>>;

#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    rooms: Arc<Mutex<HashMap<String, Members>>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<String, Members>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join `room`, announcing the new identity to everyone already there.
    /// The returned stream starts with a `PeerJoined` for each existing member.
    pub fn join(&self, room: &str) -> (MemoryTransport, mpsc::UnboundedReceiver<TransportEvent>) {
        let id = PeerId::generate();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut rooms = self.rooms();
        let members = rooms.entry(room.to_string()).or_default();
        for (peer, sender) in members.iter() {
            let _ = sender.send(TransportEvent::PeerJoined(id.clone()));
            let _ = tx.send(TransportEvent::PeerJoined(peer.clone()));
        }
        members.insert(id.clone(), tx);
        drop(rooms);

        tracing::debug!("{} joined memory room {}", id, room);
        let transport = MemoryTransport {
            hub: self.clone(),
            room: room.to_string(),
            id,
        };
        (transport, rx)
    }

    /// Current members of a room
    pub fn peers(&self, room: &str) -> Vec<PeerId> {
        self.rooms()
            .get(room)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn leave(&self, room: &str, id: &PeerId) {
        let mut rooms = self.rooms();
        let Some(members) = rooms.get_mut(room) else {
            return;
        };
        if members.remove(id).is_none() {
            return;
        }
        for sender in members.values() {
            let _ = sender.send(TransportEvent::PeerLeft(id.clone()));
        }
        if members.is_empty() {
            rooms.remove(room);
        }
        tracing::debug!("{} left memory room {}", id, room);
    }

    fn deliver(
        &self,
        room: &str,
        from: &PeerId,
        to: &PeerId,
        message: &WireMessage,
    ) -> Result<(), TransportError> {
        let json = serde_json::to_string(message)?;
        let message: WireMessage = serde_json::from_str(&json)?;

        let rooms = self.rooms();
        match rooms.get(room).and_then(|members| members.get(to)) {
            Some(sender) => {
                let _ = sender.send(TransportEvent::Message {
                    from: from.clone(),
                    message,
                });
            }
            // Fire-and-forget: a peer that already left just never sees it
            None => tracing::debug!("dropping message for {} (not in room {})", to, room),
        }
        Ok(())
    }
}

/// One participant's connection to a [`MemoryHub`] room. Dropping it leaves
/// the room.
#[derive(Debug)]
pub struct MemoryTransport {
    hub: MemoryHub,
    room: String,
    id: PeerId,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn self_id(&self) -> &PeerId {
        &self.id
    }

    async fn send(&self, to: &PeerId, message: &WireMessage) -> Result<(), TransportError> {
        self.hub.deliver(&self.room, &self.id, to, message)
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.hub.leave(&self.room, &self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_presence_events() {
        let hub = MemoryHub::new();
        let (first, mut first_events) = hub.join("ROOM");
        let (second, mut second_events) = hub.join("ROOM");

        assert_eq!(
            first_events.recv().await,
            Some(TransportEvent::PeerJoined(second.self_id().clone()))
        );
        assert_eq!(
            second_events.recv().await,
            Some(TransportEvent::PeerJoined(first.self_id().clone()))
        );

        let second_id = second.self_id().clone();
        drop(second);
        assert_eq!(
            first_events.recv().await,
            Some(TransportEvent::PeerLeft(second_id))
        );
        assert_eq!(hub.peers("ROOM"), vec![first.self_id().clone()]);
    }

    #[tokio::test]
    async fn test_directed_delivery_carries_sender() {
        let hub = MemoryHub::new();
        let (alice, _alice_events) = hub.join("ROOM");
        let (bob, mut bob_events) = hub.join("ROOM");

        let message = WireMessage::Dare {
            dare: "juggle".to_string(),
        };
        alice.send(bob.self_id(), &message).await.unwrap();

        assert_eq!(
            bob_events.recv().await,
            Some(TransportEvent::Message {
                from: alice.self_id().clone(),
                message
            })
        );
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let hub = MemoryHub::new();
        let (_a, mut a_events) = hub.join("ONE");
        let (_b, _b_events) = hub.join("TWO");

        assert!(a_events.try_recv().is_err());
        assert_eq!(hub.peers("ONE").len(), 1);
        assert_eq!(hub.peers("TWO").len(), 1);
    }

    #[tokio::test]
    async fn test_send_to_departed_peer_is_silent() {
        let hub = MemoryHub::new();
        let (alice, _events) = hub.join("ROOM");

        let result = alice
            .send(
                &PeerId::from("gone"),
                &WireMessage::Kick {
                    kicked_id: PeerId::from("gone"),
                },
            )
            .await;
        assert!(result.is_ok());
    }
}
