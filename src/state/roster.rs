use crate::error::RosterError;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Canonical participant list.
///
/// Invariants: no two entries share an identity, and exactly one entry (the
/// first) is the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Roster(Vec<Participant>);

/// What a `playerInfo` did to the roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Added,
    /// A participant with the same display name came back under a new identity
    Reconnected { previous: PeerId },
    /// A known identity announced a different name
    Renamed { previous_name: String },
    /// Same identity, same name
    Unchanged,
}

impl Roster {
    pub fn with_coordinator(name: impl Into<String>) -> Self {
        Self(vec![Participant {
            id: PeerId::coordinator(),
            display_name: name.into(),
            is_coordinator: true,
        }])
    }

    /// Apply a join request.
    ///
    /// Names are matched against every non-coordinator entry; a match takes
    /// over the incoming identity. Two peers choosing the same name are
    /// therefore merged into one entry.
    pub fn join(&mut self, id: PeerId, name: &str) -> JoinOutcome {
        // A known identity taking over somebody else's name leaves its old entry
        let name_held_elsewhere = self
            .0
            .iter()
            .any(|p| !p.is_coordinator && p.display_name == name && p.id != id);
        if name_held_elsewhere {
            self.0.retain(|p| p.is_coordinator || p.id != id);
        }

        if let Some(existing) = self
            .0
            .iter_mut()
            .find(|p| !p.is_coordinator && p.display_name == name)
        {
            if existing.id == id {
                return JoinOutcome::Unchanged;
            }
            let previous = std::mem::replace(&mut existing.id, id);
            return JoinOutcome::Reconnected { previous };
        }

        if let Some(existing) = self.0.iter_mut().find(|p| p.id == id) {
            let previous_name = std::mem::replace(&mut existing.display_name, name.to_string());
            return JoinOutcome::Renamed { previous_name };
        }

        self.0.push(Participant {
            id,
            display_name: name.to_string(),
            is_coordinator: false,
        });
        JoinOutcome::Added
    }

    /// Remove a departed peer. Returns `None` if the identity wasn't rostered.
    pub fn leave(&mut self, id: &PeerId) -> Option<Participant> {
        if id.is_coordinator() {
            return None;
        }
        let index = self.0.iter().position(|p| &p.id == id)?;
        Some(self.0.remove(index))
    }

    /// Remove a participant on the coordinator's behalf
    pub fn kick(&mut self, id: &PeerId) -> Result<Participant, RosterError> {
        if id.is_coordinator() {
            return Err(RosterError::CoordinatorProtected);
        }
        self.leave(id)
            .ok_or_else(|| RosterError::NotFound(id.clone()))
    }

    pub fn get(&self, id: &PeerId) -> Option<&Participant> {
        self.0.iter().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.0.iter()
    }
}
