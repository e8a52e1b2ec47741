//! Replica side of a session.
//!
//! A replica never owns state. It announces itself, forwards actions to the
//! coordinator, echoes them locally so the player sees their own input at
//! once, and replaces everything wholesale when the next `state` arrives.

use std::collections::BTreeSet;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{ActionError, CommandError};
use crate::protocol::{Action, WireMessage};
use crate::state::GameState;
use crate::transport::{Transport, TransportEvent};
use crate::types::{Participant, PeerId, Phase};

/// What an inbound message did to the replica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaUpdate {
    Snapshot,
    Kicked,
    Ignored,
}

/// Why a replica session finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The coordinator removed this participant
    Kicked,
    /// The coordinator's transport identity left the room
    CoordinatorLost,
    /// The transport or the local handle went away
    Closed,
}

#[derive(Debug)]
pub struct Replica {
    self_id: PeerId,
    name: String,
    state: Option<GameState>,
    coordinator: Option<PeerId>,
}

impl Replica {
    pub fn new(self_id: PeerId, name: impl Into<String>) -> Self {
        Self {
            self_id,
            name: name.into(),
            state: None,
            coordinator: None,
        }
    }

    pub fn self_id(&self) -> &PeerId {
        &self.self_id
    }

    /// Latest snapshot, with any local echo applied on top
    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    /// Transport identity of the coordinator, once a snapshot has arrived
    pub fn coordinator(&self) -> Option<&PeerId> {
        self.coordinator.as_ref()
    }

    /// This participant's roster entry in the latest snapshot
    pub fn me(&self) -> Option<&Participant> {
        self.state.as_ref()?.roster.get(&self.self_id)
    }

    pub fn announcement(&self) -> WireMessage {
        WireMessage::PlayerInfo {
            name: self.name.clone(),
        }
    }

    pub fn apply(&mut self, from: &PeerId, message: WireMessage) -> ReplicaUpdate {
        if let Some(coordinator) = &self.coordinator {
            if coordinator != from {
                tracing::debug!("ignoring {} from non-coordinator {}", message.channel(), from);
                return ReplicaUpdate::Ignored;
            }
        }

        match message {
            WireMessage::State(state) => {
                if self.coordinator.is_none() {
                    tracing::info!("coordinator is {}", from);
                    self.coordinator = Some(from.clone());
                }
                self.state = Some(*state);
                ReplicaUpdate::Snapshot
            }
            WireMessage::Kick { kicked_id } if kicked_id == self.self_id => ReplicaUpdate::Kicked,
            // Another participant's kick, or a peer channel meant for the
            // coordinator
            _ => ReplicaUpdate::Ignored,
        }
    }

    /// Patch the local snapshot with an action just sent, using the same
    /// validation the coordinator will run
    pub fn echo(&mut self, action: &Action) -> Result<(), ActionError> {
        let Some(state) = self.state.as_mut() else {
            return Err(ActionError::NotRostered(self.self_id.clone()));
        };
        state.apply_action(&self.self_id, action)
    }

    /// Whether this participant should be offered the performer choice: the
    /// reveal showed them as the originator and nobody performs yet
    pub fn can_choose_performer(&self) -> bool {
        let Some(state) = &self.state else {
            return false;
        };
        let round = &state.round;
        round.phase == Phase::Reveal
            && round.performer.is_none()
            && round
                .winning_dare
                .as_ref()
                .is_some_and(|winning| winning.submitter_id == self.self_id)
    }
}

/// Control surface for a running [`ReplicaService`]
#[derive(Debug, Clone)]
pub struct ReplicaHandle {
    self_id: PeerId,
    actions: mpsc::UnboundedSender<Action>,
    snapshots: watch::Receiver<Option<GameState>>,
}

impl ReplicaHandle {
    pub fn self_id(&self) -> &PeerId {
        &self.self_id
    }

    /// Send a round action. Fire-and-forget: the outcome shows up in a later
    /// snapshot, or never if the coordinator refused it.
    pub fn submit(&self, action: Action) -> Result<(), CommandError> {
        self.actions.send(action).map_err(|_| CommandError::Ended)
    }

    pub fn state(&self) -> Option<GameState> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<GameState>> {
        self.snapshots.clone()
    }
}

pub struct ReplicaService<T: Transport> {
    replica: Replica,
    transport: T,
    peers: BTreeSet<PeerId>,
    snapshots: watch::Sender<Option<GameState>>,
}

impl<T: Transport> ReplicaService<T> {
    /// Join the session as `name`. The join handle resolves when the session
    /// ends.
    pub fn spawn(
        transport: T,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        name: impl Into<String>,
    ) -> (ReplicaHandle, JoinHandle<SessionEnd>) {
        let self_id = transport.self_id().clone();
        let (actions, actions_rx) = mpsc::unbounded_channel();
        let (snapshots, snapshots_rx) = watch::channel(None);

        let service = Self {
            replica: Replica::new(self_id.clone(), name),
            transport,
            peers: BTreeSet::new(),
            snapshots,
        };
        let task = tokio::spawn(service.run(events, actions_rx));

        let handle = ReplicaHandle {
            self_id,
            actions,
            snapshots: snapshots_rx,
        };
        (handle, task)
    }

    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut actions: mpsc::UnboundedReceiver<Action>,
    ) -> SessionEnd {
        let end = loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        break SessionEnd::Closed;
                    };
                    if let Some(end) = self.on_transport_event(event).await {
                        break end;
                    }
                }

                action = actions.recv() => {
                    let Some(action) = action else {
                        break SessionEnd::Closed;
                    };
                    self.on_action(action).await;
                }
            }
        };

        tracing::info!("{} session ended: {:?}", self.replica.self_id(), end);
        end
    }

    async fn on_transport_event(&mut self, event: TransportEvent) -> Option<SessionEnd> {
        match event {
            TransportEvent::PeerJoined(peer) => {
                self.peers.insert(peer.clone());
                // Until a snapshot reveals who the coordinator is, introduce
                // ourselves to everyone; other replicas ignore it
                if self.replica.coordinator().is_none() {
                    self.send_to(&peer, &self.replica.announcement()).await;
                }
                None
            }
            TransportEvent::PeerLeft(peer) => {
                self.peers.remove(&peer);
                if self.replica.coordinator() == Some(&peer) {
                    tracing::warn!("coordinator {} left", peer);
                    return Some(SessionEnd::CoordinatorLost);
                }
                None
            }
            TransportEvent::Message { from, message } => match self.replica.apply(&from, message) {
                ReplicaUpdate::Snapshot => {
                    self.publish();
                    None
                }
                ReplicaUpdate::Kicked => {
                    tracing::info!("kicked by the coordinator");
                    Some(SessionEnd::Kicked)
                }
                ReplicaUpdate::Ignored => None,
            },
        }
    }

    async fn on_action(&mut self, action: Action) {
        let message = WireMessage::from(action.clone());
        match self.replica.coordinator().cloned() {
            Some(coordinator) => self.send_to(&coordinator, &message).await,
            None => {
                for peer in &self.peers {
                    self.send_to(peer, &message).await;
                }
            }
        }

        match self.replica.echo(&action) {
            Ok(()) => self.publish(),
            Err(e) => tracing::debug!("not echoing {}: {}", action.name(), e),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.replica.state().cloned());
    }

    async fn send_to(&self, to: &PeerId, message: &WireMessage) {
        if let Err(e) = self.transport.send(to, message).await {
            tracing::error!("failed to send {} to {}: {}", message.channel(), to, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WinningDare;

    fn id(s: &str) -> PeerId {
        PeerId::from(s)
    }

    fn snapshot(state: &GameState) -> WireMessage {
        WireMessage::snapshot(state)
    }

    fn game_with(me: &str) -> GameState {
        let mut state = GameState::new("Host");
        state.roster.join(id(me), "Ada");
        state
    }

    #[test]
    fn test_first_snapshot_fixes_coordinator() {
        let mut replica = Replica::new(id("me"), "Ada");
        let state = game_with("me");

        assert_eq!(replica.apply(&id("c"), snapshot(&state)), ReplicaUpdate::Snapshot);
        assert_eq!(replica.coordinator(), Some(&id("c")));
        assert_eq!(replica.me().map(|p| p.display_name.as_str()), Some("Ada"));

        let forged = GameState::new("Impostor");
        assert_eq!(replica.apply(&id("x"), snapshot(&forged)), ReplicaUpdate::Ignored);
        assert_eq!(replica.state(), Some(&state));
    }

    #[test]
    fn test_only_own_kick_ends_session() {
        let mut replica = Replica::new(id("me"), "Ada");
        replica.apply(&id("c"), snapshot(&game_with("me")));

        assert_eq!(
            replica.apply(&id("c"), WireMessage::Kick { kicked_id: id("other") }),
            ReplicaUpdate::Ignored
        );
        assert_eq!(
            replica.apply(&id("x"), WireMessage::Kick { kicked_id: id("me") }),
            ReplicaUpdate::Ignored
        );
        assert_eq!(
            replica.apply(&id("c"), WireMessage::Kick { kicked_id: id("me") }),
            ReplicaUpdate::Kicked
        );
    }

    #[test]
    fn test_echo_uses_coordinator_validation() {
        let mut replica = Replica::new(id("me"), "Ada");
        let dare = Action::SubmitDare {
            dare: "  wear a hat ".to_string(),
        };
        assert_eq!(replica.echo(&dare), Err(ActionError::NotRostered(id("me"))));

        replica.apply(&id("c"), snapshot(&game_with("me")));
        replica.echo(&dare).unwrap();
        let submissions = &replica.state().unwrap().round.dare_submissions;
        assert_eq!(submissions[&id("me")].dare, "wear a hat");

        let vote = Action::VoteDare { voted_for: id("me") };
        assert!(matches!(
            replica.echo(&vote),
            Err(ActionError::WrongPhase { .. })
        ));
    }

    #[test]
    fn test_snapshot_replaces_echo() {
        let mut replica = Replica::new(id("me"), "Ada");
        let state = game_with("me");
        replica.apply(&id("c"), snapshot(&state));
        replica
            .echo(&Action::SubmitDare {
                dare: "refused later".to_string(),
            })
            .unwrap();

        replica.apply(&id("c"), snapshot(&state));
        assert!(replica.state().unwrap().round.dare_submissions.is_empty());
    }

    #[test]
    fn test_can_choose_performer() {
        let mut replica = Replica::new(id("me"), "Ada");
        let mut state = game_with("me");
        state.round.phase = Phase::Reveal;
        state.round.winning_dare = Some(WinningDare {
            submitter_id: id("me"),
            dare: "sing".to_string(),
        });
        replica.apply(&id("c"), snapshot(&state));
        assert!(replica.can_choose_performer());

        state.round.performer = Some(PeerId::coordinator());
        replica.apply(&id("c"), snapshot(&state));
        assert!(!replica.can_choose_performer());
    }
}
