//! Pre-built [`tracing::Span`] constructors for the node's operations.
//!
//! Using consistent span names and field sets makes it easy to filter and
//! correlate a round's votes, ticks and dispatch in the logs.

use tracing::{info_span, Span};

/// Span covering one inbound vote.
pub fn vote_span(voter: &str, code: &str) -> Span {
    info_span!("vote", voter = %voter, code = %code)
}

/// Span covering one countdown tick.
pub fn tick_span(round: u64) -> Span {
    info_span!("tick", round = round)
}

/// Span covering the resolution of a round.
pub fn resolve_span(round: u64, forced: bool) -> Span {
    info_span!("resolve", round = round, forced = forced)
}

/// Span covering a single action dispatch.
pub fn dispatch_span(code: &str, dispatcher: &str) -> Span {
    info_span!("dispatch", code = %code, dispatcher = %dispatcher)
}

/// Span covering an admin command.
pub fn admin_span(command: &str) -> Span {
    info_span!("admin", command = %command)
}
