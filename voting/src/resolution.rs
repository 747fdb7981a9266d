//! Winner determination and resolution records.
//!
//! A decisive code wins only if it clears a fixed 33% floor *and* strictly
//! beats the other decisive code. Anything else (a tie, or nobody clearing the
//! floor) falls to the neutral code, even when the neutral code has fewer
//! votes than the leader. This is deliberately not plain plurality.

use serde::{Deserialize, Serialize};

use selection_actions::{Action, ActionRegistry, DispatchReport};
use selection_types::{Timestamp, VoteCode, VoteCounts, VoterId};

/// Share of all votes a decisive code must exceed, in percent.
pub const WIN_THRESHOLD_PCT: u32 = 33;

/// Where the round is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// No decisive vote yet; the countdown has not started.
    Idle,
    /// Countdown running, votes still accepted.
    Counting,
}

/// A resolved round. Produced together with the round reset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub round: u64,
    pub winner: VoteCode,
    /// Admin override rather than countdown expiry.
    pub forced: bool,
    /// Votes at the moment of resolution.
    pub tally: VoteCounts,
    pub claimant: Option<VoterId>,
    /// Action to hand to the dispatcher; `None` for the neutral code.
    pub dispatch: Option<Action>,
    pub resolved_at: Timestamp,
}

/// A resolution together with the outcome of its dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub resolution: Resolution,
    pub dispatch: Option<DispatchReport>,
}

#[derive(Clone, Debug)]
pub struct ResolutionEngine {
    decisive: (VoteCode, VoteCode),
    neutral: VoteCode,
    threshold_pct: u32,
}

impl ResolutionEngine {
    pub fn new(registry: &ActionRegistry) -> Self {
        Self {
            decisive: registry.decisive(),
            neutral: registry.neutral(),
            threshold_pct: WIN_THRESHOLD_PCT,
        }
    }

    /// Winning code for a tally.
    pub fn determine_winner(&self, counts: &VoteCounts) -> VoteCode {
        let total = u64::from(counts.total());
        if total == 0 {
            return self.neutral;
        }

        let (d1, d2) = self.decisive;
        let n1 = u64::from(counts.get(d1));
        let n2 = u64::from(counts.get(d2));
        // n / total * 100 > threshold, kept in integers
        let floor = u64::from(self.threshold_pct) * total;

        if n1 * 100 > floor && n1 > n2 {
            d1
        } else if n2 * 100 > floor && n2 > n1 {
            d2
        } else {
            self.neutral
        }
    }
}
