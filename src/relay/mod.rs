//! Room relay served by `whodares-relay`.
//!
//! The relay is the signaling layer only. It assigns each WebSocket
//! connection an identity, announces joins and leaves within a room and
//! forwards directed messages between members. It never looks inside a game
//! message and holds no game state.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

pub use crate::protocol::{RelayFrame, RelayRequest};
use crate::types::PeerId;

const MAX_ROOM_CODE_LEN: usize = 16;

type Members = HashMap<PeerId, mpsc::UnboundedSender<RelayFrame>>;

#[derive(Debug, Default)]
pub struct RelayState {
    rooms: RwLock<HashMap<String, Members>>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` in `room` and tell everyone already there.
    /// Returns the members that were present before.
    pub async fn join(
        &self,
        room: &str,
        id: &PeerId,
        outbox: mpsc::UnboundedSender<RelayFrame>,
    ) -> Vec<PeerId> {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(room.to_string()).or_default();

        let existing: Vec<PeerId> = members.keys().cloned().collect();
        for sender in members.values() {
            let _ = sender.send(RelayFrame::PeerJoined {
                peer_id: id.clone(),
            });
        }
        members.insert(id.clone(), outbox);
        existing
    }

    pub async fn leave(&self, room: &str, id: &PeerId) {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(room) else {
            return;
        };
        if members.remove(id).is_none() {
            return;
        }
        for sender in members.values() {
            let _ = sender.send(RelayFrame::PeerLeft {
                peer_id: id.clone(),
            });
        }
        if members.is_empty() {
            rooms.remove(room);
            tracing::debug!("room {} closed", room);
        }
    }

    /// Hand a message to one member. Returns false if `to` is not in the room.
    pub async fn forward(
        &self,
        room: &str,
        from: &PeerId,
        to: &PeerId,
        message: serde_json::Value,
    ) -> bool {
        let rooms = self.rooms.read().await;
        match rooms.get(room).and_then(|members| members.get(to)) {
            Some(sender) => sender
                .send(RelayFrame::Message {
                    from: from.clone(),
                    message,
                })
                .is_ok(),
            None => false,
        }
    }
}

pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: Option<String>,
}

fn valid_room_code(room: &str) -> bool {
    !room.is_empty()
        && room.len() <= MAX_ROOM_CODE_LEN
        && room.chars().all(|c| c.is_ascii_alphanumeric())
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<RelayState>>,
) -> Response {
    let Some(room) = params.room.filter(|room| valid_room_code(room)) else {
        return (StatusCode::BAD_REQUEST, "missing or invalid room code").into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, room, state))
}

async fn send_frame(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    frame: &RelayFrame,
) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("failed to encode relay frame: {}", e);
            true
        }
    }
}

/// Handle one relay connection for its whole lifetime
async fn handle_socket(socket: WebSocket, room: String, state: Arc<RelayState>) {
    let (mut sender, mut receiver) = socket.split();
    let id = PeerId::generate();

    let (outbox, mut inbox) = mpsc::unbounded_channel();
    let peers = state.join(&room, &id, outbox).await;
    tracing::info!("{} joined room {} ({} already there)", id, room, peers.len());

    let welcome = RelayFrame::Welcome {
        self_id: id.clone(),
        peers,
    };
    if send_frame(&mut sender, &welcome).await {
        loop {
            tokio::select! {
                frame = inbox.recv() => {
                    let Some(frame) = frame else { break };
                    if !send_frame(&mut sender, &frame).await {
                        break;
                    }
                }

                ws_msg = receiver.next() => {
                    match ws_msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<RelayRequest>(&text) {
                                Ok(RelayRequest::Send { to, message }) => {
                                    if !state.forward(&room, &id, &to, message).await {
                                        tracing::debug!("{} sent to {} who is not in room {}", id, to, room);
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!("undecodable request from {}: {}", id, e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) => break,
                        Some(Ok(Message::Ping(data))) => {
                            if sender.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::error!("WebSocket error for {}: {}", id, e);
                            break;
                        }
                        None => break,
                    }
                }
            }
        }
    } else {
        tracing::error!("failed to send welcome to {}", id);
    }

    state.leave(&room, &id).await;
    tracing::info!("{} left room {}", id, room);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_room_codes() {
        assert!(valid_room_code("ABCD42"));
        assert!(!valid_room_code(""));
        assert!(!valid_room_code("has space"));
        assert!(!valid_room_code("x&y=1"));
        assert!(!valid_room_code(&"A".repeat(17)));
    }

    #[tokio::test]
    async fn test_join_announces_to_existing_members() {
        let state = RelayState::new();
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, _b_rx) = mpsc::unbounded_channel();
        let a = PeerId::from("a");
        let b = PeerId::from("b");

        assert!(state.join("ROOM", &a, a_tx).await.is_empty());
        assert_eq!(state.join("ROOM", &b, b_tx).await, vec![a.clone()]);

        match a_rx.recv().await {
            Some(RelayFrame::PeerJoined { peer_id }) => assert_eq!(peer_id, b),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_forward_and_leave() {
        let state = RelayState::new();
        let (a_tx, _a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        let a = PeerId::from("a");
        let b = PeerId::from("b");
        state.join("ROOM", &a, a_tx).await;
        state.join("ROOM", &b, b_tx).await;

        let payload = json!({"channel": "dare", "payload": {"dare": "hop"}});
        assert!(state.forward("ROOM", &a, &b, payload.clone()).await);
        match b_rx.recv().await {
            Some(RelayFrame::Message { from, message }) => {
                assert_eq!(from, a);
                assert_eq!(message, payload);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        assert!(!state.forward("OTHER", &a, &b, payload).await);

        state.leave("ROOM", &a).await;
        match b_rx.recv().await {
            Some(RelayFrame::PeerLeft { peer_id }) => assert_eq!(peer_id, a),
            other => panic!("unexpected frame: {:?}", other),
        }
        state.leave("ROOM", &b).await;
        // The emptied room is gone: a newcomer finds nobody
        let (c_tx, _c_rx) = mpsc::unbounded_channel();
        assert!(state.join("ROOM", &PeerId::from("c"), c_tx).await.is_empty());
    }
}
