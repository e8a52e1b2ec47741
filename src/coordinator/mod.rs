//! The coordinator: sole writer of the canonical game state.
//!
//! [`Coordinator`] is the synchronous context (state, timer, tie-break rng)
//! and is what the tests drive directly. [`CoordinatorService`] wraps it in a
//! single task that multiplexes transport events, admin commands, delayed
//! welcomes and timer ticks, and pushes a full snapshot to every peer after
//! each accepted mutation.

pub mod handlers;

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::GameConfig;
use crate::error::{ActionError, CommandError, RosterError};
use crate::protocol::{Action, WireMessage};
use crate::state::{GameState, PhaseChange};
use crate::timer::{RoundTimer, TimerTick};
use crate::transport::{Transport, TransportEvent};
use crate::types::{Participant, PeerId, Phase, Settings};

#[derive(Debug)]
pub struct Coordinator {
    state: GameState,
    timer: RoundTimer,
    config: GameConfig,
    rng: StdRng,
}

impl Coordinator {
    pub fn new(name: impl Into<String>, config: GameConfig) -> Self {
        Self::with_rng(name, config, StdRng::from_os_rng())
    }

    /// Deterministic tie-breaks, for tests and replays
    pub fn with_seed(name: impl Into<String>, config: GameConfig, seed: u64) -> Self {
        Self::with_rng(name, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(name: impl Into<String>, config: GameConfig, rng: StdRng) -> Self {
        let state = GameState::with_settings(name, config.initial_settings());
        let mut coordinator = Self {
            state,
            timer: RoundTimer::new(),
            config,
            rng,
        };
        coordinator.restart_timer();
        coordinator
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn timer(&self) -> &RoundTimer {
        &self.timer
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The `state` message for the current canonical state
    pub fn snapshot(&self) -> WireMessage {
        WireMessage::snapshot(&self.state)
    }

    fn restart_timer(&mut self) {
        self.timer.start(self.state.round.settings.round_timer);
        self.state.round.time_remaining = self.timer.remaining();
    }

    /// Cancel the timer, cross the phase boundary, then restart the timer for
    /// the new phase
    fn transition(&mut self) -> PhaseChange {
        self.timer.cancel();
        let change = self.state.advance(&mut self.rng);
        self.restart_timer();

        tracing::info!(
            "round {}: {:?} -> {:?}",
            change.round_number,
            change.from,
            change.to
        );
        if change.to == Phase::OriginatorGuessing {
            if let Some(winning) = &self.state.round.winning_dare {
                tracing::info!("winning dare by {}: {}", winning.submitter_id, winning.dare);
            }
        }
        change
    }

    pub(crate) fn advance_if_complete(&mut self) -> Option<PhaseChange> {
        if self.state.is_phase_complete() {
            Some(self.transition())
        } else {
            None
        }
    }

    /// Admin override: advance regardless of completion
    pub fn force_advance(&mut self) -> PhaseChange {
        self.transition()
    }

    /// Remove a participant. The roster shrank, so the phase may now be
    /// complete.
    pub fn kick(&mut self, id: &PeerId) -> Result<Participant, RosterError> {
        let kicked = self.state.roster.kick(id)?;
        tracing::info!("kicked {} ({})", kicked.display_name, kicked.id);
        self.advance_if_complete();
        Ok(kicked)
    }

    /// A transport peer went away. Returns the roster entry it held, if any.
    pub fn handle_peer_left(&mut self, id: &PeerId) -> Option<Participant> {
        let left = self.state.roster.leave(id)?;
        tracing::info!("{} ({}) left", left.display_name, left.id);
        self.advance_if_complete();
        Some(left)
    }

    pub fn update_settings(&mut self, settings: Settings) {
        let timer_changed = settings.round_timer != self.state.round.settings.round_timer;
        self.state.round.settings = settings;
        if timer_changed {
            self.restart_timer();
        }
        tracing::debug!("settings updated: {:?}", self.state.round.settings);
    }

    /// Consume one due tick. `Expired` means the phase was force-advanced.
    pub fn on_timer_tick(&mut self) -> TimerTick {
        let tick = self.timer.tick();
        match tick {
            TimerTick::Idle => {}
            TimerTick::Running(remaining) => self.state.round.time_remaining = Some(remaining),
            TimerTick::Expired => {
                tracing::info!("round timer expired in {:?}", self.state.round.phase);
                self.state.round.time_remaining = None;
                self.transition();
            }
        }
        tick
    }
}

#[derive(Debug)]
enum Command {
    Act(Action, oneshot::Sender<Result<(), ActionError>>),
    ForceAdvance(oneshot::Sender<PhaseChange>),
    Kick(PeerId, oneshot::Sender<Result<Participant, RosterError>>),
    UpdateSettings(Settings, oneshot::Sender<()>),
    Shutdown,
}

/// Control surface for a running [`CoordinatorService`]
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<GameState>,
}

impl CoordinatorHandle {
    /// Submit a round action as the coordinator's own participant
    pub async fn act(&self, action: Action) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Act(action, reply))?;
        rx.await.map_err(|_| CommandError::Ended)??;
        Ok(())
    }

    pub async fn force_advance(&self) -> Result<PhaseChange, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ForceAdvance(reply))?;
        rx.await.map_err(|_| CommandError::Ended)
    }

    pub async fn kick(&self, id: PeerId) -> Result<Participant, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Kick(id, reply))?;
        Ok(rx.await.map_err(|_| CommandError::Ended)??)
    }

    pub async fn update_settings(&self, settings: Settings) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::UpdateSettings(settings, reply))?;
        rx.await.map_err(|_| CommandError::Ended)
    }

    /// Stop the service. The transport is dropped with it.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Latest canonical state
    pub fn state(&self) -> GameState {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.snapshots.clone()
    }

    fn send(&self, command: Command) -> Result<(), CommandError> {
        self.commands.send(command).map_err(|_| CommandError::Ended)
    }
}

pub struct CoordinatorService<T: Transport> {
    coordinator: Coordinator,
    transport: T,
    peers: BTreeSet<PeerId>,
    snapshots: watch::Sender<GameState>,
}

impl<T: Transport> CoordinatorService<T> {
    /// Run `coordinator` over `transport` on a new task
    pub fn spawn(
        coordinator: Coordinator,
        transport: T,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> CoordinatorHandle {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (snapshots, snapshots_rx) = watch::channel(coordinator.state().clone());

        tracing::info!("coordinator running as {}", transport.self_id());
        let service = Self {
            coordinator,
            transport,
            peers: BTreeSet::new(),
            snapshots,
        };
        tokio::spawn(service.run(events, commands_rx));

        CoordinatorHandle {
            commands,
            snapshots: snapshots_rx,
        }
    }

    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let (welcome_tx, mut welcome_rx) = mpsc::unbounded_channel::<PeerId>();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.on_transport_event(event, &welcome_tx).await,
                    None => {
                        tracing::warn!("transport closed, stopping coordinator");
                        break;
                    }
                },

                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command).await,
                },

                Some(peer) = welcome_rx.recv() => self.welcome(&peer).await,

                _ = self.coordinator.timer().wait() => {
                    if self.coordinator.on_timer_tick() != TimerTick::Idle {
                        self.broadcast().await;
                    }
                }
            }
        }

        tracing::info!("coordinator stopped");
    }

    async fn on_transport_event(
        &mut self,
        event: TransportEvent,
        welcome_tx: &mpsc::UnboundedSender<PeerId>,
    ) {
        match event {
            TransportEvent::PeerJoined(peer) => {
                tracing::debug!("peer {} detected", peer);
                self.peers.insert(peer.clone());

                let delay = self.coordinator.config().welcome_delay;
                let welcome_tx = welcome_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = welcome_tx.send(peer);
                });
            }
            TransportEvent::PeerLeft(peer) => {
                tracing::debug!("peer {} gone", peer);
                self.peers.remove(&peer);
                if self.coordinator.handle_peer_left(&peer).is_some() {
                    self.broadcast().await;
                }
            }
            TransportEvent::Message { from, message } => {
                let channel = message.channel();
                if !self.peers.contains(&from) {
                    tracing::debug!("ignoring {} from kicked or unknown peer {}", channel, from);
                    return;
                }
                match self.coordinator.handle_message(&from, message) {
                    Ok(()) => self.broadcast().await,
                    Err(e) => tracing::debug!("ignoring {} from {}: {}", channel, from, e),
                }
            }
        }
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Act(action, reply) => {
                let result = self
                    .coordinator
                    .handle_action(&PeerId::coordinator(), action);
                if result.is_ok() {
                    self.broadcast().await;
                }
                let _ = reply.send(result);
            }
            Command::ForceAdvance(reply) => {
                let change = self.coordinator.force_advance();
                self.broadcast().await;
                let _ = reply.send(change);
            }
            Command::Kick(id, reply) => {
                let result = self.coordinator.kick(&id);
                if result.is_ok() {
                    self.send_to(&id, &WireMessage::Kick { kicked_id: id.clone() })
                        .await;
                    self.peers.remove(&id);
                    self.broadcast().await;
                }
                let _ = reply.send(result);
            }
            Command::UpdateSettings(settings, reply) => {
                self.coordinator.update_settings(settings);
                self.broadcast().await;
                let _ = reply.send(());
            }
            Command::Shutdown => {}
        }
    }

    /// First snapshot for a newly detected peer, independent of mutations
    async fn welcome(&self, peer: &PeerId) {
        if !self.peers.contains(peer) {
            return;
        }
        self.send_to(peer, &self.coordinator.snapshot()).await;
    }

    async fn broadcast(&self) {
        let snapshot = self.coordinator.snapshot();
        for peer in &self.peers {
            self.send_to(peer, &snapshot).await;
        }
        self.snapshots.send_replace(self.coordinator.state().clone());
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

    fn id(s: &str) -> PeerId {
        PeerId::from(s)
    }

    fn seeded(config: GameConfig) -> Coordinator {
        Coordinator::with_seed("Host", config, 3)
    }

    fn join(c: &mut Coordinator, peer: &str, name: &str) {
        c.handle_player_info(&id(peer), name).unwrap();
    }

    #[test]
    fn test_kick_reruns_completion() {
        let mut c = seeded(GameConfig::default());
        join(&mut c, "p1", "Ada");
        join(&mut c, "p2", "Bo");
        for peer in [PeerId::coordinator(), id("p1")] {
            c.handle_action(
                &peer,
                Action::SubmitDare {
                    dare: format!("dare from {}", peer),
                },
            )
            .unwrap();
        }
        assert_eq!(c.state().round.phase, Phase::Suggestion);

        let kicked = c.kick(&id("p2")).unwrap();
        assert_eq!(kicked.display_name, "Bo");
        assert_eq!(c.state().round.phase, Phase::DareVoting);
        assert!(!c.state().roster.contains(&id("p2")));
    }

    #[test]
    fn test_kick_refusals() {
        let mut c = seeded(GameConfig::default());

        assert_eq!(
            c.kick(&PeerId::coordinator()),
            Err(RosterError::CoordinatorProtected)
        );
        assert_eq!(c.kick(&id("ghost")), Err(RosterError::NotFound(id("ghost"))));
    }

    #[test]
    fn test_unknown_peer_leaving_changes_nothing() {
        let mut c = seeded(GameConfig::default());
        assert!(c.handle_peer_left(&id("ghost")).is_none());
        assert_eq!(c.state().roster.len(), 1);
    }

    #[test]
    fn test_timer_tracks_phases() {
        let config = GameConfig {
            round_timer_seconds: 2,
            ..GameConfig::default()
        };
        let mut c = seeded(config);
        assert_eq!(c.state().round.time_remaining, Some(2));

        assert_eq!(c.on_timer_tick(), TimerTick::Running(1));
        assert_eq!(c.state().round.time_remaining, Some(1));

        assert_eq!(c.on_timer_tick(), TimerTick::Expired);
        assert_eq!(c.state().round.phase, Phase::DareVoting);
        assert_eq!(c.state().round.time_remaining, Some(2));
    }

    #[test]
    fn test_settings_change_restarts_timer() {
        let mut c = seeded(GameConfig::default());
        assert!(!c.timer().is_active());

        let mut settings = c.state().round.settings.clone();
        settings.round_timer = 30;
        c.update_settings(settings.clone());
        assert_eq!(c.state().round.time_remaining, Some(30));

        c.on_timer_tick();
        settings.dare_voting_anonymous = false;
        c.update_settings(settings.clone());
        assert_eq!(c.state().round.time_remaining, Some(29));

        settings.round_timer = 0;
        c.update_settings(settings);
        assert!(!c.timer().is_active());
        assert_eq!(c.state().round.time_remaining, None);
    }

    #[test]
    fn test_force_advance_cycles_rounds() {
        let mut c = seeded(GameConfig::default());
        for _ in 0..4 {
            c.force_advance();
        }

        let round = &c.state().round;
        assert_eq!(round.phase, Phase::Suggestion);
        assert_eq!(round.round_number, 2);
        assert!(round.winning_dare.is_none());
    }
}
