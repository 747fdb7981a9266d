//! Round countdown with an entropy-driven duration.
//!
//! The round length is derived from how uncertain the current vote is. A
//! unanimous vote resolves after the base duration; a split vote, or one that
//! leans towards the neutral code, gets up to the ceiling to deliberate.
//!
//! Every change in the distribution snaps `remaining` back to the freshly
//! computed limit. A steady trickle of votes can therefore hold a round open
//! indefinitely; that is the observed behaviour and is kept.

use serde::{Deserialize, Serialize};

use selection_actions::ActionRegistry;
use selection_types::{VoteCode, VoteCounts};

use crate::VotingError;

/// Normalizer for the entropy: log2(3), a perfectly even three-way split.
const MAX_ENTROPY_BITS: f64 = 1.585;

/// Constants of the duration formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimerPolicy {
    /// Shortest round, in ticks (seconds).
    #[serde(default = "default_base_secs")]
    pub base_secs: u32,
    /// Longest round, in ticks (seconds).
    #[serde(default = "default_max_secs")]
    pub max_secs: u32,
    /// Seconds added at maximum uncertainty.
    #[serde(default = "default_weight")]
    pub uncertainty_weight: f64,
    /// Seconds added when every vote is neutral.
    #[serde(default = "default_weight")]
    pub neutral_weight: f64,
}

fn default_base_secs() -> u32 {
    60
}

fn default_max_secs() -> u32 {
    120
}

fn default_weight() -> f64 {
    60.0
}

impl TimerPolicy {
    pub fn validate(&self) -> Result<(), VotingError> {
        if self.base_secs == 0 {
            return Err(VotingError::InvalidPolicy("base_secs must be positive".into()));
        }
        if self.base_secs > self.max_secs {
            return Err(VotingError::InvalidPolicy(format!(
                "base_secs {} exceeds max_secs {}",
                self.base_secs, self.max_secs
            )));
        }
        for (name, w) in [
            ("uncertainty_weight", self.uncertainty_weight),
            ("neutral_weight", self.neutral_weight),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(VotingError::InvalidPolicy(format!(
                    "{name} must be a non-negative number, got {w}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for TimerPolicy {
    fn default() -> Self {
        Self {
            base_secs: default_base_secs(),
            max_secs: default_max_secs(),
            uncertainty_weight: default_weight(),
            neutral_weight: default_weight(),
        }
    }
}

/// Countdown state. `limit` and `remaining` exist only while running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerState {
    Idle,
    Running { limit: u32, remaining: u32 },
}

#[derive(Clone, Debug)]
pub struct TimerEngine {
    policy: TimerPolicy,
    decisive: (VoteCode, VoteCode),
    neutral: VoteCode,
    state: TimerState,
    paused: bool,
}

impl TimerEngine {
    pub fn new(policy: TimerPolicy, registry: &ActionRegistry) -> Result<Self, VotingError> {
        policy.validate()?;
        Ok(Self {
            policy,
            decisive: registry.decisive(),
            neutral: registry.neutral(),
            state: TimerState::Idle,
            paused: false,
        })
    }

    pub fn policy(&self) -> &TimerPolicy {
        &self.policy
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn limit(&self) -> Option<u32> {
        match self.state {
            TimerState::Running { limit, .. } => Some(limit),
            TimerState::Idle => None,
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        match self.state {
            TimerState::Running { remaining, .. } => Some(remaining),
            TimerState::Idle => None,
        }
    }

    /// Start the countdown if idle and at least one decisive vote exists.
    /// Returns the new limit when it started.
    pub fn maybe_start(&mut self, counts: &VoteCounts) -> Option<u32> {
        if self.is_started() {
            return None;
        }
        if counts.get(self.decisive.0) == 0 && counts.get(self.decisive.1) == 0 {
            return None;
        }
        let limit = self.compute_limit(counts);
        self.state = TimerState::Running {
            limit,
            remaining: limit,
        };
        Some(limit)
    }

    /// While running, recompute the limit and snap `remaining` to it.
    pub fn recompute_limit(&mut self, counts: &VoteCounts) -> Option<u32> {
        if !self.is_started() {
            return None;
        }
        let limit = self.compute_limit(counts);
        self.state = TimerState::Running {
            limit,
            remaining: limit,
        };
        Some(limit)
    }

    /// Round duration for a vote distribution, in whole ticks.
    pub fn compute_limit(&self, counts: &VoteCounts) -> u32 {
        let base = self.policy.base_secs;
        let total = counts.total();
        // Unanimity carries no uncertainty, whichever code it is.
        if total == 0 || counts.nonzero_codes() == 1 {
            return base;
        }

        let total = f64::from(total);
        let entropy: f64 = counts
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(_, n)| {
                let p = f64::from(n) / total;
                -p * p.log2()
            })
            .sum();
        let uncertainty = (entropy / MAX_ENTROPY_BITS).min(1.0);
        let p_neutral = f64::from(counts.get(self.neutral)) / total;

        let raw = f64::from(base)
            + uncertainty * self.policy.uncertainty_weight
            + p_neutral * self.policy.neutral_weight;
        let clamped = raw.max(f64::from(base)).min(f64::from(self.policy.max_secs));
        clamped as u32
    }

    /// Advance one tick. Returns `true` when the countdown has run out.
    ///
    /// Idle or paused timers do not move.
    pub fn tick(&mut self) -> bool {
        if self.paused {
            return false;
        }
        match &mut self.state {
            TimerState::Running { remaining, .. } => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            TimerState::Idle => false,
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Back to idle until the next decisive vote. The pause flag is an admin
    /// setting and survives resets.
    pub fn reset(&mut self) {
        self.state = TimerState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(base: u32) -> TimerEngine {
        let policy = TimerPolicy {
            base_secs: base,
            ..TimerPolicy::default()
        };
        TimerEngine::new(policy, &ActionRegistry::with_defaults()).unwrap()
    }

    fn counts(k: u32, l: u32, x: u32) -> VoteCounts {
        [
            (VoteCode::new('k'), k),
            (VoteCode::new('l'), l),
            (VoteCode::new('x'), x),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn empty_counts_give_base() {
        assert_eq!(engine(60).compute_limit(&counts(0, 0, 0)), 60);
    }

    #[test]
    fn unanimous_counts_give_base() {
        let t = engine(60);
        assert_eq!(t.compute_limit(&counts(7, 0, 0)), 60);
        assert_eq!(t.compute_limit(&counts(0, 7, 0)), 60);
        assert_eq!(t.compute_limit(&counts(0, 0, 7)), 60);
    }

    #[test]
    fn even_split_hits_ceiling() {
        assert_eq!(engine(60).compute_limit(&counts(5, 5, 5)), 120);
    }

    #[test]
    fn skewed_split_sits_between() {
        // p = .95/.05: H ≈ 0.2864 bits → 60 + 10.84
        assert_eq!(engine(60).compute_limit(&counts(19, 1, 0)), 70);
        // p = .6/.2/.2: H ≈ 1.371 bits → 30 + 51.90 + 12
        assert_eq!(engine(30).compute_limit(&counts(3, 1, 1)), 93);
    }

    #[test]
    fn neutral_only_round_does_not_start() {
        let mut t = engine(60);
        assert_eq!(t.maybe_start(&counts(0, 0, 4)), None);
        assert!(!t.is_started());
        assert_eq!(t.remaining(), None);
        assert_eq!(t.limit(), None);
    }

    #[test]
    fn decisive_vote_starts_countdown() {
        let mut t = engine(60);
        assert_eq!(t.maybe_start(&counts(1, 0, 0)), Some(60));
        assert_eq!(t.state(), TimerState::Running { limit: 60, remaining: 60 });
        // already running: no restart
        assert_eq!(t.maybe_start(&counts(1, 1, 0)), None);
    }

    #[test]
    fn recompute_snaps_remaining_to_new_limit() {
        let mut t = engine(60);
        t.maybe_start(&counts(1, 0, 0));
        for _ in 0..50 {
            assert!(!t.tick());
        }
        assert_eq!(t.remaining(), Some(10));

        assert_eq!(t.recompute_limit(&counts(19, 1, 0)), Some(70));
        assert_eq!(t.remaining(), Some(70));
    }

    #[test]
    fn recompute_is_noop_when_idle() {
        let mut t = engine(60);
        assert_eq!(t.recompute_limit(&counts(1, 1, 1)), None);
        assert_eq!(t.state(), TimerState::Idle);
    }

    #[test]
    fn tick_expires_at_zero() {
        let mut t = engine(2);
        t.maybe_start(&counts(1, 0, 0));
        assert!(!t.tick());
        assert!(t.tick());
        assert_eq!(t.remaining(), Some(0));
    }

    #[test]
    fn idle_and_paused_timers_do_not_tick() {
        let mut t = engine(3);
        assert!(!t.tick());

        t.maybe_start(&counts(1, 0, 0));
        t.pause();
        assert!(!t.tick());
        assert_eq!(t.remaining(), Some(3));
        t.resume();
        assert!(!t.tick());
        assert_eq!(t.remaining(), Some(2));
    }

    #[test]
    fn reset_twice_is_idle() {
        let mut t = engine(60);
        t.maybe_start(&counts(1, 0, 0));
        t.reset();
        let first = t.state();
        t.reset();
        assert_eq!(first, TimerState::Idle);
        assert_eq!(t.state(), first);
    }

    #[test]
    fn invalid_policies_are_rejected() {
        let registry = ActionRegistry::with_defaults();
        let zero = TimerPolicy {
            base_secs: 0,
            ..TimerPolicy::default()
        };
        assert!(TimerEngine::new(zero, &registry).is_err());

        let inverted = TimerPolicy {
            base_secs: 200,
            max_secs: 120,
            ..TimerPolicy::default()
        };
        assert!(TimerEngine::new(inverted, &registry).is_err());

        let negative = TimerPolicy {
            neutral_weight: -1.0,
            ..TimerPolicy::default()
        };
        assert!(TimerEngine::new(negative, &registry).is_err());
    }
}
