//! Vote ledger: one current vote per voter, latest vote wins.
//!
//! Mirrors the per-voter bookkeeping of an election: a voter that votes again
//! replaces their entry in place, it never appends a second one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use selection_actions::ActionRegistry;
use selection_types::{Timestamp, VoteCode, VoteCounts, VoterId};

/// The result of offering a vote to the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CastResult {
    /// Code unknown or disabled; nothing changed.
    Rejected,
    /// Vote recorded. `previous` is the voter's prior code, if any.
    Accepted { previous: Option<VoteCode> },
}

impl CastResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CastResult::Accepted { .. })
    }
}

/// A voter's current vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: VoterId,
    pub code: VoteCode,
    /// When this vote was last cast.
    pub cast_at: Timestamp,
    /// Ledger-wide order of the last cast; breaks `cast_at` ties.
    pub sequence: u64,
}

impl Vote {
    /// Order of the last cast: earlier votes sort first.
    pub fn cast_key(&self) -> (Timestamp, u64) {
        (self.cast_at, self.sequence)
    }
}

/// Mapping voter → current vote.
#[derive(Clone, Debug)]
pub struct VoteLedger {
    registry: Arc<ActionRegistry>,
    votes: HashMap<VoterId, Vote>,
    next_sequence: u64,
}

impl VoteLedger {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            votes: HashMap::new(),
            next_sequence: 1,
        }
    }

    /// Record or replace `voter`'s vote.
    ///
    /// Rejects codes that are unknown or disabled without touching state.
    pub fn cast_vote(&mut self, voter: &VoterId, code: VoteCode, now: Timestamp) -> CastResult {
        if !self.registry.is_valid(code) {
            return CastResult::Rejected;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if let Some(existing) = self.votes.get_mut(voter) {
            let previous = existing.code;
            existing.code = code;
            existing.cast_at = now;
            existing.sequence = sequence;
            return CastResult::Accepted {
                previous: Some(previous),
            };
        }

        self.votes.insert(
            voter.clone(),
            Vote {
                voter: voter.clone(),
                code,
                cast_at: now,
                sequence,
            },
        );
        CastResult::Accepted { previous: None }
    }

    /// Remove the most recently cast vote for `code` (admin removal).
    pub fn remove_latest(&mut self, code: VoteCode) -> Option<Vote> {
        let voter = self
            .votes
            .values()
            .filter(|v| v.code == code)
            .max_by_key(|v| v.cast_key())
            .map(|v| v.voter.clone())?;
        self.votes.remove(&voter)
    }

    pub fn get(&self, voter: &VoterId) -> Option<&Vote> {
        self.votes.get(voter)
    }

    /// Current votes for `code`, in no particular order.
    pub fn voters_for(&self, code: VoteCode) -> impl Iterator<Item = &Vote> + '_ {
        self.votes.values().filter(move |v| v.code == code)
    }

    /// Count per code. Every registry code is present, zero or not, so the
    /// total always equals [`len`](Self::len).
    pub fn counts(&self) -> VoteCounts {
        let mut counts = VoteCounts::zeroed(self.registry.all().iter().map(|a| a.code));
        for vote in self.votes.values() {
            counts.increment(vote.code);
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn reset(&mut self) {
        self.votes.clear();
    }
}
