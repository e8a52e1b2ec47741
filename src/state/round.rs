use super::GameState;
use crate::error::ActionError;
use crate::protocol::Action;
use crate::types::*;
use std::collections::BTreeMap;

impl GameState {
    /// Validate an action and fold it into the current phase's collector.
    ///
    /// This is the only path by which round actions mutate state. The
    /// coordinator runs it on inbound actions; replicas run the same code for
    /// their optimistic echo, so an echoed entry is exactly what the
    /// coordinator will write.
    pub fn apply_action(&mut self, from: &PeerId, action: &Action) -> Result<(), ActionError> {
        if !self.roster.contains(from) {
            return Err(ActionError::NotRostered(from.clone()));
        }

        match action {
            Action::SubmitDare { dare } => self.submit_dare(from, dare),
            Action::VoteDare { voted_for } => self.vote_dare(from, voted_for),
            Action::GuessOriginator { guessed } => self.guess_originator(from, guessed),
            Action::ChoosePerformer { performer_id } => self.choose_performer(from, performer_id),
        }
    }

    fn require_phase(&self, phase: Phase, action: &'static str) -> Result<(), ActionError> {
        if self.round.phase != phase {
            return Err(ActionError::WrongPhase {
                action,
                phase: self.round.phase,
            });
        }
        Ok(())
    }

    fn submit_dare(&mut self, from: &PeerId, dare: &str) -> Result<(), ActionError> {
        self.require_phase(Phase::Suggestion, "dare")?;

        let dare = dare.trim();
        if dare.is_empty() {
            return Err(ActionError::EmptyDare);
        }
        let max = self.round.settings.max_dare_chars;
        if dare.chars().count() > max {
            return Err(ActionError::DareTooLong { max });
        }

        self.round.dare_submissions.insert(
            from.clone(),
            DareSubmission {
                dare: dare.to_string(),
            },
        );
        Ok(())
    }

    fn vote_dare(&mut self, from: &PeerId, voted_for: &PeerId) -> Result<(), ActionError> {
        self.require_phase(Phase::DareVoting, "dareVote")?;

        if !self.round.dare_submissions.contains_key(voted_for) {
            return Err(ActionError::UnknownDare(voted_for.clone()));
        }
        if voted_for == from && !self.round.settings.allow_vote_for_own_dare {
            return Err(ActionError::OwnDareVote);
        }

        self.round.dare_votes.insert(
            from.clone(),
            DareVote {
                voted_for: voted_for.clone(),
            },
        );
        Ok(())
    }

    fn guess_originator(&mut self, from: &PeerId, guessed: &PeerId) -> Result<(), ActionError> {
        self.require_phase(Phase::OriginatorGuessing, "guess")?;

        if !self.roster.contains(guessed) {
            return Err(ActionError::UnknownTarget(guessed.clone()));
        }
        if guessed == from && !self.round.settings.allow_vote_for_self_originator {
            return Err(ActionError::SelfGuess);
        }

        self.round.originator_guesses.insert(
            from.clone(),
            OriginatorGuess {
                guessed: guessed.clone(),
            },
        );
        Ok(())
    }

    fn choose_performer(&mut self, from: &PeerId, performer_id: &PeerId) -> Result<(), ActionError> {
        self.require_phase(Phase::Reveal, "choose")?;

        let is_originator = self
            .round
            .winning_dare
            .as_ref()
            .is_some_and(|w| &w.submitter_id == from);
        if !is_originator {
            return Err(ActionError::NotOriginator);
        }
        if self.round.performer.is_some() {
            return Err(ActionError::PerformerAssigned);
        }
        if performer_id == from {
            return Err(ActionError::SelfChoice);
        }
        if !self.roster.contains(performer_id) {
            return Err(ActionError::UnknownTarget(performer_id.clone()));
        }

        self.round.performer = Some(performer_id.clone());
        Ok(())
    }

    /// Count of distinct identities in the current phase's collector,
    /// including participants who acted and then left. Reveal has no
    /// collector.
    pub fn acted_count(&self) -> Option<usize> {
        let count = match self.round.phase {
            Phase::Suggestion => self.round.dare_submissions.len(),
            Phase::DareVoting => self.round.dare_votes.len(),
            Phase::OriginatorGuessing => self.round.originator_guesses.len(),
            Phase::Reveal => return None,
        };
        Some(count)
    }

    /// Move round data keyed by `previous` over to `current`, used when a
    /// display name passes to a new transport identity.
    ///
    /// Entries `current` already holds are kept; `previous`'s entry then
    /// stays where it is. References to `previous` follow only if its dare
    /// moved, so a dare that stayed behind keeps its votes and attribution.
    pub(crate) fn reassign(&mut self, previous: &PeerId, current: &PeerId) {
        let round = &mut self.round;

        move_entry(&mut round.dare_submissions, previous, current);
        move_entry(&mut round.dare_votes, previous, current);
        move_entry(&mut round.originator_guesses, previous, current);

        if round.dare_submissions.contains_key(previous) {
            return;
        }

        for vote in round.dare_votes.values_mut() {
            if &vote.voted_for == previous {
                vote.voted_for = current.clone();
            }
        }
        for guess in round.originator_guesses.values_mut() {
            if &guess.guessed == previous {
                guess.guessed = current.clone();
            }
        }
        if let Some(winning) = round.winning_dare.as_mut() {
            if &winning.submitter_id == previous {
                winning.submitter_id = current.clone();
            }
        }
        if round.performer.as_ref() == Some(previous) {
            round.performer = Some(current.clone());
        }
    }
}

fn move_entry<V>(collector: &mut BTreeMap<PeerId, V>, previous: &PeerId, current: &PeerId) {
    if collector.contains_key(current) {
        return;
    }
    if let Some(entry) = collector.remove(previous) {
        collector.insert(current.clone(), entry);
    }
}
