//! Priority claim on the claim code.
//!
//! The first voter to hold the claim code owns the claim. Later arrivals never
//! displace them, and the claimant re-casting the code keeps it. When the
//! claimant leaves the code the claim passes to the remaining holder with the
//! earliest latest cast, or lapses if none remain.

use serde::{Deserialize, Serialize};

use selection_types::{Timestamp, VoteCode, VoterId};

use crate::ledger::VoteLedger;

/// Who holds the claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimState {
    NoClaim,
    Claimed { voter: VoterId, since: Timestamp },
}

/// How a vote change affected the claim, for logging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimTransition {
    Unchanged,
    /// The claim was vacant and `voter` took it.
    Claimed(VoterId),
    /// The claimant left; the claim moved to the next holder.
    Transferred { from: VoterId, to: VoterId },
    /// The claimant left and nobody else holds the code.
    Released(VoterId),
}

#[derive(Clone, Debug)]
pub struct ClaimTracker {
    claim_code: Option<VoteCode>,
    state: ClaimState,
}

impl ClaimTracker {
    /// A tracker for `claim_code`. With `None` the tracker never claims.
    pub fn new(claim_code: Option<VoteCode>) -> Self {
        Self {
            claim_code,
            state: ClaimState::NoClaim,
        }
    }

    pub fn state(&self) -> &ClaimState {
        &self.state
    }

    pub fn claimant(&self) -> Option<&VoterId> {
        match &self.state {
            ClaimState::Claimed { voter, .. } => Some(voter),
            ClaimState::NoClaim => None,
        }
    }

    /// React to `voter` moving from `previous` to `new_code`.
    ///
    /// Must be called after the ledger has recorded the vote: the claim
    /// timestamp is the voter's `cast_at`.
    pub fn on_vote_change(
        &mut self,
        voter: &VoterId,
        new_code: VoteCode,
        previous: Option<VoteCode>,
        ledger: &VoteLedger,
    ) -> ClaimTransition {
        let Some(claim_code) = self.claim_code else {
            return ClaimTransition::Unchanged;
        };

        if new_code == claim_code && previous != Some(claim_code) {
            if self.state != ClaimState::NoClaim {
                return ClaimTransition::Unchanged;
            }
            let Some(vote) = ledger.get(voter) else {
                return ClaimTransition::Unchanged;
            };
            self.state = ClaimState::Claimed {
                voter: voter.clone(),
                since: vote.cast_at,
            };
            return ClaimTransition::Claimed(voter.clone());
        }

        if previous == Some(claim_code) && new_code != claim_code {
            return self.on_holder_left(voter, ledger);
        }

        ClaimTransition::Unchanged
    }

    /// React to an admin removing `voter`'s vote for `removed_code`.
    pub fn on_vote_removed(
        &mut self,
        voter: &VoterId,
        removed_code: VoteCode,
        ledger: &VoteLedger,
    ) -> ClaimTransition {
        if self.claim_code != Some(removed_code) {
            return ClaimTransition::Unchanged;
        }
        self.on_holder_left(voter, ledger)
    }

    fn on_holder_left(&mut self, voter: &VoterId, ledger: &VoteLedger) -> ClaimTransition {
        if self.claimant() != Some(voter) {
            return ClaimTransition::Unchanged;
        }
        let from = voter.clone();
        match self.elect(ledger) {
            Some(to) => ClaimTransition::Transferred { from, to },
            None => ClaimTransition::Released(from),
        }
    }

    /// Re-elect the current holder of the claim code with the earliest cast.
    fn elect(&mut self, ledger: &VoteLedger) -> Option<VoterId> {
        let claim_code = self.claim_code?;
        let earliest = ledger.voters_for(claim_code).min_by_key(|v| v.cast_key());

        match earliest {
            Some(vote) => {
                self.state = ClaimState::Claimed {
                    voter: vote.voter.clone(),
                    since: vote.cast_at,
                };
                Some(vote.voter.clone())
            }
            None => {
                self.state = ClaimState::NoClaim;
                None
            }
        }
    }

    /// Whether the claim agrees with the ledger: a claimant must currently hold
    /// the claim code, and a vacant claim means nobody holds it.
    pub fn check_invariant(&self, ledger: &VoteLedger) -> bool {
        let Some(claim_code) = self.claim_code else {
            return self.state == ClaimState::NoClaim;
        };
        match &self.state {
            ClaimState::NoClaim => ledger.voters_for(claim_code).next().is_none(),
            ClaimState::Claimed { voter, .. } => {
                ledger.get(voter).is_some_and(|v| v.code == claim_code)
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = ClaimState::NoClaim;
    }
}
