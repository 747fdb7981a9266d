//! Nullable infrastructure for deterministic testing.
//!
//! Everything the vote engine reaches outside itself for (time, the action
//! dispatcher, the broadcaster) sits behind a trait. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Record what they were asked to do, for assertions
//!
//! Usage: swap real implementations for nullables in tests.

pub mod broadcaster;
pub mod clock;
pub mod dispatcher;

pub use broadcaster::NullBroadcaster;
pub use clock::NullClock;
pub use dispatcher::NullDispatcher;
