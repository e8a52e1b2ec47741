//! Vote reduction
//!
//! Both the dare vote and the originator guess reduce the same way: count
//! how often each identity was named, keep everyone sharing the highest
//! count, and draw uniformly among them. The draw is random on purpose so
//! that no ordering of players wins ties systematically.

use crate::types::*;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Count how often each identity was named
pub fn frequencies<'a>(targets: impl IntoIterator<Item = &'a PeerId>) -> BTreeMap<PeerId, u32> {
    let mut counts = BTreeMap::new();
    for target in targets {
        *counts.entry(target.clone()).or_insert(0) += 1;
    }
    counts
}

/// Every identity sharing the highest count, in identity order
pub fn leaders(counts: &BTreeMap<PeerId, u32>) -> Vec<PeerId> {
    let Some(max) = counts.values().copied().max() else {
        return Vec::new();
    };
    counts
        .iter()
        .filter(|(_, count)| **count == max)
        .map(|(id, _)| id.clone())
        .collect()
}

pub fn break_tie<R: Rng + ?Sized>(candidates: &[PeerId], rng: &mut R) -> Option<PeerId> {
    candidates.choose(rng).cloned()
}

/// Winner of the dare vote. With no votes cast every submitted dare is a
/// candidate; with no submissions there is no winner.
pub fn dare_winner<R: Rng + ?Sized>(round: &RoundState, rng: &mut R) -> Option<WinningDare> {
    let counts = frequencies(round.dare_votes.values().map(|v| &v.voted_for));
    let mut candidates = leaders(&counts);
    if candidates.is_empty() {
        candidates = round.dare_submissions.keys().cloned().collect();
    }

    let submitter_id = break_tie(&candidates, rng)?;
    let dare = round.dare_submissions.get(&submitter_id)?.dare.clone();
    Some(WinningDare { submitter_id, dare })
}

/// Identity most often guessed as the originator; no fallback
pub fn most_guessed<R: Rng + ?Sized>(round: &RoundState, rng: &mut R) -> Option<PeerId> {
    let counts = frequencies(round.originator_guesses.values().map(|g| &g.guessed));
    break_tie(&leaders(&counts), rng)
}
