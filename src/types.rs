use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Textual form of the coordinator's identity. Transports mint ULIDs, which
/// never contain `@`, so this can't collide with a peer-assigned identity.
const COORDINATOR_SENTINEL: &str = "@coordinator";

/// Identity of a participant.
///
/// Coordinator and peers share this one type; the coordinator's entry uses
/// [`PeerId::coordinator`] while peers are known by their transport identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh identity for a new connection
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn coordinator() -> Self {
        Self(COORDINATOR_SENTINEL.to_string())
    }

    pub fn is_coordinator(&self) -> bool {
        self.0 == COORDINATOR_SENTINEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: PeerId,
    pub display_name: String,
    pub is_coordinator: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Suggestion,
    DareVoting,
    OriginatorGuessing,
    Reveal,
}

impl Phase {
    /// Phases form a strict cycle; Reveal wraps around to the next round
    pub fn next(self) -> Phase {
        match self {
            Phase::Suggestion => Phase::DareVoting,
            Phase::DareVoting => Phase::OriginatorGuessing,
            Phase::OriginatorGuessing => Phase::Reveal,
            Phase::Reveal => Phase::Suggestion,
        }
    }
}

/// Coordinator-controlled settings, replicated as part of the round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub dare_voting_anonymous: bool,
    pub allow_vote_for_own_dare: bool,
    pub originator_guessing_anonymous: bool,
    pub allow_vote_for_self_originator: bool,
    /// Seconds per phase, 0 disables the timer
    pub round_timer: u32,
    /// Longest accepted dare, in characters. Replicated so that replicas
    /// validate their optimistic echo exactly like the coordinator does.
    pub max_dare_chars: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dare_voting_anonymous: true,
            allow_vote_for_own_dare: true,
            originator_guessing_anonymous: true,
            allow_vote_for_self_originator: false,
            round_timer: 0,
            max_dare_chars: 280,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DareSubmission {
    pub dare: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DareVote {
    pub voted_for: PeerId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OriginatorGuess {
    pub guessed: PeerId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WinningDare {
    pub submitter_id: PeerId,
    pub dare: String,
}

/// Per-round state. Collectors are keyed by the acting participant, so a
/// resubmission overwrites the earlier entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundState {
    pub phase: Phase,
    pub round_number: u32,
    pub dare_submissions: BTreeMap<PeerId, DareSubmission>,
    pub dare_votes: BTreeMap<PeerId, DareVote>,
    pub originator_guesses: BTreeMap<PeerId, OriginatorGuess>,
    pub winning_dare: Option<WinningDare>,
    pub performer: Option<PeerId>,
    pub time_remaining: Option<u32>,
    pub settings: Settings,
}

impl RoundState {
    pub fn new(settings: Settings) -> Self {
        Self {
            phase: Phase::Suggestion,
            round_number: 1,
            dare_submissions: BTreeMap::new(),
            dare_votes: BTreeMap::new(),
            originator_guesses: BTreeMap::new(),
            winning_dare: None,
            performer: None,
            time_remaining: None,
            settings,
        }
    }
}

impl Default for RoundState {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
