use crate::state::GameState;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// One message on a named game channel.
///
/// Encoded as `{"channel": "<name>", "payload": {...}}`. The first five
/// channels flow from peers to the coordinator, `state` and `kick` flow back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "channel",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum WireMessage {
    PlayerInfo { name: String },
    Dare { dare: String },
    DareVote { voted_for: PeerId },
    Guess { guessed: PeerId },
    Choose { performer_id: PeerId },
    State(Box<GameState>),
    Kick { kicked_id: PeerId },
}

impl WireMessage {
    /// Channel name, for logging
    pub fn channel(&self) -> &'static str {
        match self {
            WireMessage::PlayerInfo { .. } => "playerInfo",
            WireMessage::Dare { .. } => "dare",
            WireMessage::DareVote { .. } => "dareVote",
            WireMessage::Guess { .. } => "guess",
            WireMessage::Choose { .. } => "choose",
            WireMessage::State(_) => "state",
            WireMessage::Kick { .. } => "kick",
        }
    }

    pub fn snapshot(state: &GameState) -> Self {
        WireMessage::State(Box::new(state.clone()))
    }
}

/// A round action: everything a participant submits into a collector.
/// Membership (`playerInfo`) is handled separately by the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SubmitDare { dare: String },
    VoteDare { voted_for: PeerId },
    GuessOriginator { guessed: PeerId },
    ChoosePerformer { performer_id: PeerId },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SubmitDare { .. } => "dare",
            Action::VoteDare { .. } => "dareVote",
            Action::GuessOriginator { .. } => "guess",
            Action::ChoosePerformer { .. } => "choose",
        }
    }
}

impl From<Action> for WireMessage {
    fn from(action: Action) -> Self {
        match action {
            Action::SubmitDare { dare } => WireMessage::Dare { dare },
            Action::VoteDare { voted_for } => WireMessage::DareVote { voted_for },
            Action::GuessOriginator { guessed } => WireMessage::Guess { guessed },
            Action::ChoosePerformer { performer_id } => WireMessage::Choose { performer_id },
        }
    }
}

/// Client -> relay requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum RelayRequest {
    /// Deliver `message` to a single peer in the same room
    Send {
        to: PeerId,
        message: serde_json::Value,
    },
}

/// Relay -> client frames
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum RelayFrame {
    /// First frame on every connection: the identity the relay assigned to
    /// this connection and everyone already in the room
    Welcome {
        self_id: PeerId,
        peers: Vec<PeerId>,
    },
    PeerJoined {
        peer_id: PeerId,
    },
    PeerLeft {
        peer_id: PeerId,
    },
    Message {
        from: PeerId,
        message: serde_json::Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_channels_use_camel_case() {
        let msg = WireMessage::DareVote {
            voted_for: PeerId::from("p1"),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"channel": "dareVote", "payload": {"votedFor": "p1"}})
        );

        let msg = WireMessage::Choose {
            performer_id: PeerId::from("p2"),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"channel": "choose", "payload": {"performerId": "p2"}})
        );
    }

    #[test]
    fn test_decode_player_info() {
        let msg: WireMessage =
            serde_json::from_value(json!({"channel": "playerInfo", "payload": {"name": "Ada"}}))
                .unwrap();
        assert_eq!(
            msg,
            WireMessage::PlayerInfo {
                name: "Ada".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_channel_is_rejected() {
        let result = serde_json::from_value::<WireMessage>(
            json!({"channel": "cheat", "payload": {"score": 9000}}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_state_payload_shape() {
        let state = GameState::new("Host");
        let value = serde_json::to_value(WireMessage::snapshot(&state)).unwrap();

        assert_eq!(value["channel"], "state");
        assert_eq!(value["payload"]["round"]["phase"], "SUGGESTION");
        assert_eq!(value["payload"]["round"]["roundNumber"], 1);
        assert_eq!(value["payload"]["roster"][0]["displayName"], "Host");
        assert_eq!(value["payload"]["roster"][0]["isCoordinator"], true);
    }

    #[test]
    fn test_relay_frame_tagging() {
        let frame = RelayFrame::PeerLeft {
            peer_id: PeerId::from("p9"),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, json!({"t": "peer_left", "peer_id": "p9"}));
    }
}
