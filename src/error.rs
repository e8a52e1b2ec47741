//! Error types
//!
//! None of these cross the network: refused actions are logged by the
//! coordinator and dropped, never reported back to the sender.

use crate::types::{Phase, PeerId};
use thiserror::Error;

/// Why the coordinator (or a replica's local echo) refused an action
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("{action} is not accepted during {phase:?}")]
    WrongPhase { action: &'static str, phase: Phase },

    #[error("sender {0} is not on the roster")]
    NotRostered(PeerId),

    #[error("dare text is empty")]
    EmptyDare,

    #[error("dare exceeds {max} characters")]
    DareTooLong { max: usize },

    #[error("no dare was submitted by {0}")]
    UnknownDare(PeerId),

    #[error("voting for your own dare is disabled")]
    OwnDareVote,

    #[error("{0} is not on the roster")]
    UnknownTarget(PeerId),

    #[error("guessing yourself as the originator is disabled")]
    SelfGuess,

    #[error("only the originator of the winning dare may choose the performer")]
    NotOriginator,

    #[error("a performer is already assigned")]
    PerformerAssigned,

    #[error("the originator cannot choose themselves")]
    SelfChoice,

    #[error("display name is empty")]
    EmptyName,

    #[error("display name exceeds {max} characters")]
    NameTooLong { max: usize },

    #[error("{0} is only sent by the coordinator")]
    CoordinatorOnly(&'static str),

    #[error("the coordinator does not join its own session")]
    CoordinatorJoin,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("participant {0} is not on the roster")]
    NotFound(PeerId),

    #[error("the coordinator cannot be removed from its own session")]
    CoordinatorProtected,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport send error: {0}")]
    Send(String),

    #[error("transport connection closed")]
    Closed,

    #[error("relay handshake failed: {0}")]
    Handshake(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: String, value: String },
}

/// Why a command sent to a running coordinator or replica service failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("the session has ended")]
    Ended,
}
