//! Broadcaster collaborator: pushes state to viewers and the admin surface.

use serde::{Deserialize, Serialize};

use selection_types::Timestamp;

use crate::resolution::ResolutionReport;
use crate::round::RoundSnapshot;

/// Sink for everything the engine publishes.
///
/// Called after the state lock has been released; implementations must not
/// block for long (fan out to channels, don't do network I/O inline).
pub trait Broadcaster: Send + Sync {
    /// The round state after a mutation.
    fn publish_state(&self, snapshot: &RoundSnapshot);

    /// A finished round and what its dispatch did.
    fn publish_resolution(&self, report: &ResolutionReport);

    /// An operator-facing action log line.
    fn publish_log(&self, entry: &LogEntry);
}

/// One line of the operator action log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: Timestamp,
    pub action: String,
    pub details: String,
}

impl LogEntry {
    pub fn new(at: Timestamp, action: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            at,
            action: action.into(),
            details: details.into(),
        }
    }

    /// `HH:MM:SS - action: details`, or without the details when empty.
    pub fn line(&self) -> String {
        if self.details.is_empty() {
            format!("{} - {}", self.at.clock_hms(), self.action)
        } else {
            format!("{} - {}: {}", self.at.clock_hms(), self.action, self.details)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_formats_with_and_without_details() {
        let at = Timestamp::from_secs(3_600 + 61);
        assert_eq!(
            LogEntry::new(at, "Vote: alice", "K").line(),
            "01:01:01 - Vote: alice: K"
        );
        assert_eq!(LogEntry::new(at, "Votes reset", "").line(), "01:01:01 - Votes reset");
    }
}
