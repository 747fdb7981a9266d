//! The round: single owner of ledger, claim, timer and resolution state.
//!
//! Every mutation goes through a `&mut self` method here, so whoever holds the
//! round (a mutex, an event loop) serializes votes and ticks for free. The
//! ledger and the claim are only ever reset together.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use selection_actions::ActionRegistry;
use selection_types::{Timestamp, VoteCode, VoteCounts, VoterId};

use crate::claim::{ClaimTracker, ClaimTransition};
use crate::ledger::{CastResult, Vote, VoteLedger};
use crate::resolution::{Resolution, ResolutionEngine, RoundPhase};
use crate::timer::{TimerEngine, TimerPolicy};
use crate::VotingError;

/// Whether the overlay is showing a live voting cycle. Independent of the
/// countdown, which only runs inside a round that has decisive votes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub active: bool,
    pub started_at: Option<Timestamp>,
}

/// What an accepted vote did to the countdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerChange {
    Unchanged,
    Started(u32),
    Recomputed(u32),
}

/// The result of casting a vote into the round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CastOutcome {
    Rejected,
    Accepted {
        previous: Option<VoteCode>,
        claim: ClaimTransition,
        timer: TimerChange,
    },
}

impl CastOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CastOutcome::Accepted { .. })
    }
}

/// The result of one tick.
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// No countdown running.
    Idle,
    Paused { remaining: u32 },
    Counting { remaining: u32 },
    /// The countdown ran out; the round has been resolved and reset.
    Expired(Resolution),
}

/// State pushed to viewers after every mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub counts: VoteCounts,
    pub total_voters: usize,
    pub claimant: Option<VoterId>,
    pub active: bool,
    pub phase: RoundPhase,
    pub remaining: Option<u32>,
    pub limit: Option<u32>,
    pub paused: bool,
    pub round: u64,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug)]
pub struct Round {
    registry: Arc<ActionRegistry>,
    ledger: VoteLedger,
    claims: ClaimTracker,
    timer: TimerEngine,
    resolver: ResolutionEngine,
    cycle: Cycle,
    round: u64,
    synthetic_votes: u64,
}

impl Round {
    pub fn new(registry: Arc<ActionRegistry>, policy: TimerPolicy) -> Result<Self, VotingError> {
        let timer = TimerEngine::new(policy, &registry)?;
        Ok(Self {
            ledger: VoteLedger::new(Arc::clone(&registry)),
            claims: ClaimTracker::new(registry.claim_code()),
            resolver: ResolutionEngine::new(&registry),
            timer,
            cycle: Cycle::default(),
            round: 1,
            synthetic_votes: 0,
            registry,
        })
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    pub fn counts(&self) -> VoteCounts {
        self.ledger.counts()
    }

    pub fn claimant(&self) -> Option<&VoterId> {
        self.claims.claimant()
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    /// Number of the round currently accumulating votes.
    pub fn number(&self) -> u64 {
        self.round
    }

    pub fn phase(&self) -> RoundPhase {
        if self.timer.is_started() {
            RoundPhase::Counting
        } else {
            RoundPhase::Idle
        }
    }

    /// Cast a vote. Unknown or disabled codes are rejected with no effect.
    pub fn cast_vote(&mut self, voter: &VoterId, code: VoteCode, now: Timestamp) -> CastOutcome {
        let previous = match self.ledger.cast_vote(voter, code, now) {
            CastResult::Rejected => return CastOutcome::Rejected,
            CastResult::Accepted { previous } => previous,
        };

        let claim = self
            .claims
            .on_vote_change(voter, code, previous, &self.ledger);

        let timer = if previous == Some(code) {
            // Same code again: the distribution did not move.
            TimerChange::Unchanged
        } else {
            let counts = self.ledger.counts();
            if let Some(limit) = self.timer.recompute_limit(&counts) {
                TimerChange::Recomputed(limit)
            } else if let Some(limit) = self.timer.maybe_start(&counts) {
                TimerChange::Started(limit)
            } else {
                TimerChange::Unchanged
            }
        };

        self.debug_check();
        tracing::debug!(%voter, %code, ?previous, ?claim, ?timer, "vote applied");
        CastOutcome::Accepted {
            previous,
            claim,
            timer,
        }
    }

    /// Cast a vote from untrusted input. Malformed voter ids or codes are
    /// rejected like unknown codes; this never fails.
    pub fn cast_vote_input(&mut self, voter: &str, code: &str, now: Timestamp) -> CastOutcome {
        match (VoterId::parse(voter), VoteCode::parse(code)) {
            (Ok(voter), Ok(code)) => self.cast_vote(&voter, code, now),
            _ => CastOutcome::Rejected,
        }
    }

    /// Admin: inject a vote from a fresh synthetic voter.
    pub fn add_synthetic_vote(
        &mut self,
        code: VoteCode,
        now: Timestamp,
    ) -> Result<(VoterId, CastOutcome), VotingError> {
        let action = self
            .registry
            .get(code)
            .ok_or(VotingError::UnknownCode(code))?;
        if !action.enabled {
            return Err(VotingError::DisabledCode(code));
        }
        self.synthetic_votes += 1;
        let voter = VoterId::synthetic(self.synthetic_votes);
        let outcome = self.cast_vote(&voter, code, now);
        Ok((voter, outcome))
    }

    /// Admin: remove the most recently cast vote for `code`.
    pub fn remove_latest_vote(
        &mut self,
        code: VoteCode,
    ) -> Result<(Vote, ClaimTransition), VotingError> {
        if self.registry.get(code).is_none() {
            return Err(VotingError::UnknownCode(code));
        }
        let removed = self
            .ledger
            .remove_latest(code)
            .ok_or(VotingError::NoVoteToRemove(code))?;
        let claim = self
            .claims
            .on_vote_removed(&removed.voter, removed.code, &self.ledger);
        self.timer.recompute_limit(&self.ledger.counts());

        self.debug_check();
        tracing::debug!(voter = %removed.voter, %code, ?claim, "vote removed");
        Ok((removed, claim))
    }

    /// Advance the countdown by one tick, resolving the round if it runs out.
    pub fn tick(&mut self, now: Timestamp) -> TickOutcome {
        let Some(remaining) = self.timer.remaining() else {
            return TickOutcome::Idle;
        };
        if self.timer.is_paused() {
            return TickOutcome::Paused { remaining };
        }
        if self.timer.tick() {
            return TickOutcome::Expired(self.resolve(now));
        }
        TickOutcome::Counting {
            remaining: self.timer.remaining().unwrap_or(0),
        }
    }

    /// Resolve now under the normal winner rule, then reset.
    pub fn resolve(&mut self, now: Timestamp) -> Resolution {
        let winner = self.resolver.determine_winner(&self.ledger.counts());
        self.conclude(winner, false, now)
    }

    /// Admin override: resolve to `code` regardless of the votes, then reset.
    pub fn force_resolve(&mut self, code: VoteCode, now: Timestamp) -> Result<Resolution, VotingError> {
        if self.registry.get(code).is_none() {
            return Err(VotingError::UnknownCode(code));
        }
        Ok(self.conclude(code, true, now))
    }

    fn conclude(&mut self, winner: VoteCode, forced: bool, now: Timestamp) -> Resolution {
        let dispatch = self
            .registry
            .get(winner)
            .filter(|a| a.role.is_decisive())
            .cloned();
        let resolution = Resolution {
            round: self.round,
            winner,
            forced,
            tally: self.ledger.counts(),
            claimant: self.claims.claimant().cloned(),
            dispatch,
            resolved_at: now,
        };
        self.reset();
        self.round += 1;
        tracing::debug!(round = resolution.round, %winner, forced, "round resolved");
        resolution
    }

    /// Round boundary: ledger, claim and countdown are cleared together.
    pub fn reset(&mut self) {
        self.ledger.reset();
        self.claims.reset();
        self.timer.reset();
        self.debug_check();
    }

    /// Admin: begin a fresh voting cycle.
    pub fn start_cycle(&mut self, now: Timestamp) {
        self.cycle = Cycle {
            active: true,
            started_at: Some(now),
        };
        self.reset();
    }

    /// Admin: mark the cycle inactive. Votes are kept for resolution.
    pub fn end_cycle(&mut self) {
        self.cycle.active = false;
    }

    pub fn pause_timer(&mut self) {
        self.timer.pause();
    }

    pub fn resume_timer(&mut self) {
        self.timer.resume();
    }

    pub fn snapshot(&self, now: Timestamp) -> RoundSnapshot {
        RoundSnapshot {
            counts: self.ledger.counts(),
            total_voters: self.ledger.len(),
            claimant: self.claims.claimant().cloned(),
            active: self.cycle.active,
            phase: self.phase(),
            remaining: self.timer.remaining(),
            limit: self.timer.limit(),
            paused: self.timer.is_paused(),
            round: self.round,
            timestamp: now,
        }
    }

    fn debug_check(&self) {
        debug_assert!(
            self.claims.check_invariant(&self.ledger),
            "claim state out of sync with ledger"
        );
        debug_assert_eq!(self.ledger.counts().total() as usize, self.ledger.len());
    }
}
