mod game;
mod roster;
mod round;
pub mod tally;

pub use game::PhaseChange;
pub use roster::{JoinOutcome, Roster};

use crate::types::*;
use serde::{Deserialize, Serialize};

/// The canonical game state: the current round plus the roster.
///
/// The coordinator owns the only mutable copy. A serialized `GameState` is
/// the snapshot pushed on the `state` channel; replicas replace theirs
/// wholesale on receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    pub round: RoundState,
    pub roster: Roster,
}

impl GameState {
    /// New game whose roster holds only the coordinator
    pub fn new(coordinator_name: impl Into<String>) -> Self {
        Self::with_settings(coordinator_name, Settings::default())
    }

    pub fn with_settings(coordinator_name: impl Into<String>, settings: Settings) -> Self {
        Self {
            round: RoundState::new(settings),
            roster: Roster::with_coordinator(coordinator_name),
        }
    }
}
