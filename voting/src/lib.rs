//! Vote engine: the part of the Selection Protocol with real invariants.
//!
//! A round accumulates single-character votes, derives its own deadline from
//! how contested the vote is, and resolves to a winning code when the deadline
//! passes (or an admin forces it).
//!
//! ## Module overview
//!
//! - [`ledger`]: One vote per voter, latest vote wins.
//! - [`claim`]: First-come-first-served priority claim on the claim code.
//! - [`timer`]: Entropy-driven round duration and the per-second countdown.
//! - [`resolution`]: Winner determination (33% floor + strict lead) and resolution records.
//! - [`round`]: The single owned state object tying the above together.
//! - [`broadcast`]: Broadcaster collaborator trait and its payloads.
//! - [`error`]: Voting error types.

pub mod broadcast;
pub mod claim;
pub mod error;
pub mod ledger;
pub mod resolution;
pub mod round;
pub mod timer;

pub use broadcast::{Broadcaster, LogEntry};
pub use claim::{ClaimState, ClaimTracker, ClaimTransition};
pub use error::VotingError;
pub use ledger::{CastResult, Vote, VoteLedger};
pub use resolution::{Resolution, ResolutionEngine, ResolutionReport, RoundPhase};
pub use round::{CastOutcome, Cycle, Round, RoundSnapshot, TickOutcome, TimerChange};
pub use timer::{TimerEngine, TimerPolicy, TimerState};
