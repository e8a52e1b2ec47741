//! Inbound message dispatch for the coordinator
//!
//! Every handler either mutates the canonical state and returns `Ok`, after
//! which the service broadcasts a snapshot, or refuses with an error that the
//! service logs and drops. Nothing here ever answers the sender directly.

use super::Coordinator;
use crate::error::ActionError;
use crate::protocol::{Action, WireMessage};
use crate::state::JoinOutcome;
use crate::types::PeerId;

impl Coordinator {
    /// Handle one message received from `from`
    pub fn handle_message(
        &mut self,
        from: &PeerId,
        message: WireMessage,
    ) -> Result<(), ActionError> {
        match message {
            WireMessage::PlayerInfo { name } => {
                self.handle_player_info(from, &name)?;
                Ok(())
            }
            WireMessage::Dare { dare } => self.handle_action(from, Action::SubmitDare { dare }),
            WireMessage::DareVote { voted_for } => {
                self.handle_action(from, Action::VoteDare { voted_for })
            }
            WireMessage::Guess { guessed } => {
                self.handle_action(from, Action::GuessOriginator { guessed })
            }
            WireMessage::Choose { performer_id } => {
                self.handle_action(from, Action::ChoosePerformer { performer_id })
            }
            WireMessage::State(_) => Err(ActionError::CoordinatorOnly("state")),
            WireMessage::Kick { .. } => Err(ActionError::CoordinatorOnly("kick")),
        }
    }

    /// Fold an accepted action into its collector, then advance if that
    /// completed the phase
    pub fn handle_action(&mut self, from: &PeerId, action: Action) -> Result<(), ActionError> {
        self.state.apply_action(from, &action)?;
        tracing::debug!("accepted {} from {}", action.name(), from);
        self.advance_if_complete();
        Ok(())
    }

    /// Join or reconnect a peer by display name
    pub fn handle_player_info(
        &mut self,
        from: &PeerId,
        name: &str,
    ) -> Result<JoinOutcome, ActionError> {
        if from.is_coordinator() {
            return Err(ActionError::CoordinatorJoin);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(ActionError::EmptyName);
        }
        let max = self.config.max_name_chars;
        if name.chars().count() > max {
            return Err(ActionError::NameTooLong { max });
        }

        let roster_size = self.state.roster.len();
        let outcome = self.state.roster.join(from.clone(), name);
        match &outcome {
            JoinOutcome::Added => tracing::info!("{} joined as {}", from, name),
            JoinOutcome::Reconnected { previous } => {
                tracing::info!("{} reconnected as {} (was {})", name, from, previous);
                self.state.reassign(previous, from);
            }
            JoinOutcome::Renamed { previous_name } => {
                tracing::info!("{} renamed from {} to {}", from, previous_name, name)
            }
            JoinOutcome::Unchanged => tracing::debug!("{} re-announced as {}", from, name),
        }
        // Taking over another participant's name drops the old entry
        if self.state.roster.len() < roster_size {
            self.advance_if_complete();
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::types::Phase;

    fn id(s: &str) -> PeerId {
        PeerId::from(s)
    }

    fn coordinator() -> Coordinator {
        Coordinator::with_seed("Host", GameConfig::default(), 9)
    }

    fn join(c: &mut Coordinator, peer: &str, name: &str) {
        c.handle_message(
            &id(peer),
            WireMessage::PlayerInfo {
                name: name.to_string(),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_player_info_twice_keeps_one_entry() {
        let mut c = coordinator();
        join(&mut c, "p1", "Ada");
        join(&mut c, "p1", "Ada");

        assert_eq!(c.state().roster.len(), 2);
    }

    #[test]
    fn test_player_info_validation() {
        let mut c = coordinator();

        assert_eq!(
            c.handle_player_info(&id("p1"), "   "),
            Err(ActionError::EmptyName)
        );
        let long_name = "x".repeat(33);
        assert_eq!(
            c.handle_player_info(&id("p1"), &long_name),
            Err(ActionError::NameTooLong { max: 32 })
        );
        assert_eq!(
            c.handle_player_info(&PeerId::coordinator(), "Sneaky"),
            Err(ActionError::CoordinatorJoin)
        );
        assert_eq!(c.state().roster.len(), 1);
    }

    #[test]
    fn test_reconnect_carries_submission_over() {
        let mut c = coordinator();
        join(&mut c, "p1", "Ada");
        c.handle_message(
            &id("p1"),
            WireMessage::Dare {
                dare: "sing".to_string(),
            },
        )
        .unwrap();

        join(&mut c, "p2", "Ada");

        let state = c.state();
        assert_eq!(state.roster.len(), 2);
        assert_eq!(state.round.dare_submissions[&id("p2")].dare, "sing");
        assert!(!state.round.dare_submissions.contains_key(&id("p1")));
    }

    #[test]
    fn test_coordinator_channels_are_refused_from_peers() {
        let mut c = coordinator();
        join(&mut c, "p1", "Ada");

        assert_eq!(
            c.handle_message(
                &id("p1"),
                WireMessage::Kick {
                    kicked_id: PeerId::coordinator()
                }
            ),
            Err(ActionError::CoordinatorOnly("kick"))
        );
        let forged = c.state().clone();
        assert_eq!(
            c.handle_message(&id("p1"), WireMessage::snapshot(&forged)),
            Err(ActionError::CoordinatorOnly("state"))
        );
        assert_eq!(c.state().roster.len(), 2);
    }

    #[test]
    fn test_last_dare_advances_phase() {
        let mut c = coordinator();
        join(&mut c, "p1", "Ada");

        c.handle_action(
            &PeerId::coordinator(),
            Action::SubmitDare {
                dare: "A".to_string(),
            },
        )
        .unwrap();
        assert_eq!(c.state().round.phase, Phase::Suggestion);

        c.handle_message(
            &id("p1"),
            WireMessage::Dare {
                dare: "B".to_string(),
            },
        )
        .unwrap();
        assert_eq!(c.state().round.phase, Phase::DareVoting);
    }

    #[test]
    fn test_name_takeover_keeps_both_dares() {
        let mut c = coordinator();
        join(&mut c, "p1", "Ada");
        join(&mut c, "p2", "Bo");
        for (peer, text) in [("p1", "ada's"), ("p2", "bo's")] {
            c.handle_message(
                &id(peer),
                WireMessage::Dare {
                    dare: text.to_string(),
                },
            )
            .unwrap();
        }
        assert_eq!(c.state().round.phase, Phase::Suggestion);

        join(&mut c, "p2", "Ada");

        let state = c.state();
        assert_eq!(state.roster.len(), 2);
        assert_eq!(state.roster.get(&id("p2")).unwrap().display_name, "Ada");
        assert_eq!(state.round.dare_submissions[&id("p1")].dare, "ada's");
        assert_eq!(state.round.dare_submissions[&id("p2")].dare, "bo's");
        // Two dares for a roster of two: the shrink completed the phase
        assert_eq!(state.round.phase, Phase::DareVoting);
    }
}
