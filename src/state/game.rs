use super::{tally, GameState};
use crate::types::*;
use rand::Rng;

/// Record of one phase transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
    pub round_number: u32,
}

impl GameState {
    /// A phase is complete once its collector holds at least as many
    /// identities as the roster. Entries left behind by departed participants
    /// still count. Reveal never completes on its own.
    pub fn is_phase_complete(&self) -> bool {
        match self.acted_count() {
            Some(acted) => !self.roster.is_empty() && acted >= self.roster.len(),
            None => false,
        }
    }

    /// Move to the next phase, running the tally that belongs to the boundary
    /// being crossed. Unconditional: callers decide when to advance.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> PhaseChange {
        let from = self.round.phase;

        match from {
            Phase::Suggestion => {
                self.round.dare_votes.clear();
            }
            Phase::DareVoting => {
                self.round.winning_dare = tally::dare_winner(&self.round, rng);
            }
            Phase::OriginatorGuessing => {
                self.round.performer = self.round.winning_dare.as_ref().and_then(|winning| {
                    let guessed = tally::most_guessed(&self.round, rng)?;
                    // A correct guess means the originator performs
                    (guessed == winning.submitter_id).then_some(guessed)
                });
            }
            Phase::Reveal => {
                self.start_next_round();
            }
        }

        self.round.phase = from.next();
        PhaseChange {
            from,
            to: self.round.phase,
            round_number: self.round.round_number,
        }
    }

    fn start_next_round(&mut self) {
        let round = &mut self.round;
        round.round_number += 1;
        round.dare_submissions.clear();
        round.dare_votes.clear();
        round.originator_guesses.clear();
        round.winning_dare = None;
        round.performer = None;
    }
}
