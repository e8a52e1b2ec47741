//! WebSocket transport talking to the room relay (`whodares-relay`).
//!
//! The relay assigns the connection an identity in its `welcome` frame and
//! forwards directed messages between members of the same room. Reading and
//! writing run on their own tasks; [`Transport::send`] only queues, so sends
//! never block the caller.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;

use super::{Transport, TransportEvent};
use crate::error::TransportError;
use crate::protocol::{RelayFrame, RelayRequest, WireMessage};
use crate::types::PeerId;

#[derive(Debug)]
pub struct WebSocketTransport {
    self_id: PeerId,
    outgoing: mpsc::UnboundedSender<String>,
}

impl WebSocketTransport {
    /// Join `room` on the relay at `url` (e.g. `ws://localhost:6574/ws`).
    ///
    /// Room codes are passed as a query parameter and must be plain
    /// alphanumerics; the relay rejects anything else.
    pub async fn connect(
        url: &str,
        room: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>), TransportError> {
        let endpoint = format!("{}?room={}", url, room);
        tracing::debug!("connecting to relay at {}", endpoint);

        let (stream, _response) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        let (mut sink, mut stream) = stream.split();

        let (self_id, peers) = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<RelayFrame>(&text)? {
                    RelayFrame::Welcome { self_id, peers } => break (self_id, peers),
                    other => {
                        return Err(TransportError::Handshake(format!(
                            "expected welcome, got {:?}",
                            other
                        )))
                    }
                },
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::Handshake(e.to_string())),
                None => return Err(TransportError::Closed),
            }
        };
        tracing::info!("joined room {} as {}", room, self_id);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        for peer in peers {
            let _ = event_tx.send(TransportEvent::PeerJoined(peer));
        }

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(text) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::error!("relay send failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::error!("relay connection error: {}", e);
                        break;
                    }
                };
                let Some(event) = decode_frame(&text) else {
                    continue;
                };
                if event_tx.send(event).is_err() {
                    break;
                }
            }
            tracing::debug!("relay reader finished");
        });

        Ok((Self { self_id, outgoing }, event_rx))
    }
}

fn decode_frame(text: &str) -> Option<TransportEvent> {
    let frame = match serde_json::from_str::<RelayFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("undecodable relay frame: {}", e);
            return None;
        }
    };

    match frame {
        RelayFrame::PeerJoined { peer_id } => Some(TransportEvent::PeerJoined(peer_id)),
        RelayFrame::PeerLeft { peer_id } => Some(TransportEvent::PeerLeft(peer_id)),
        RelayFrame::Message { from, message } => match serde_json::from_value(message) {
            Ok(message) => Some(TransportEvent::Message { from, message }),
            Err(e) => {
                tracing::warn!("undecodable message from {}: {}", from, e);
                None
            }
        },
        RelayFrame::Welcome { .. } => {
            tracing::warn!("ignoring repeated welcome frame");
            None
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn self_id(&self) -> &PeerId {
        &self.self_id
    }

    async fn send(&self, to: &PeerId, message: &WireMessage) -> Result<(), TransportError> {
        let request = RelayRequest::Send {
            to: to.clone(),
            message: serde_json::to_value(message)?,
        };
        let text = serde_json::to_string(&request)?;
        self.outgoing.send(text).map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_message_frame() {
        let text = json!({
            "t": "message",
            "from": "p1",
            "message": {"channel": "guess", "payload": {"guessed": "p2"}}
        })
        .to_string();

        assert_eq!(
            decode_frame(&text),
            Some(TransportEvent::Message {
                from: PeerId::from("p1"),
                message: WireMessage::Guess {
                    guessed: PeerId::from("p2")
                }
            })
        );
    }

    #[test]
    fn test_decode_drops_garbage() {
        assert_eq!(decode_frame("not json"), None);
        let bad_payload = json!({
            "t": "message",
            "from": "p1",
            "message": {"channel": "guess", "payload": {}}
        })
        .to_string();
        assert_eq!(decode_frame(&bad_payload), None);
    }

    #[test]
    fn test_decode_presence() {
        let text = json!({"t": "peer_joined", "peer_id": "p7"}).to_string();
        assert_eq!(
            decode_frame(&text),
            Some(TransportEvent::PeerJoined(PeerId::from("p7")))
        );
    }
}
