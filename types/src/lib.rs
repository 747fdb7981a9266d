//! Fundamental types for the Selection Protocol.
//!
//! This crate defines the value types shared across every other crate in the
//! workspace: voter identities, vote codes, per-code tallies and timestamps.

pub mod code;
pub mod counts;
pub mod error;
pub mod time;
pub mod voter;

pub use code::VoteCode;
pub use counts::VoteCounts;
pub use error::TypesError;
pub use time::{Clock, SystemClock, Timestamp};
pub use voter::VoterId;
