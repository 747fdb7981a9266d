//! Nullable broadcaster: record published payloads without a network.

use std::sync::Mutex;

use selection_voting::{Broadcaster, LogEntry, ResolutionReport, RoundSnapshot};

/// A test broadcaster that keeps everything it was asked to publish.
#[derive(Debug, Default)]
pub struct NullBroadcaster {
    states: Mutex<Vec<RoundSnapshot>>,
    resolutions: Mutex<Vec<ResolutionReport>>,
    logs: Mutex<Vec<LogEntry>>,
}

impl NullBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every snapshot published, oldest first.
    pub fn states(&self) -> Vec<RoundSnapshot> {
        self.states.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last_state(&self) -> Option<RoundSnapshot> {
        self.states.lock().ok().and_then(|s| s.last().cloned())
    }

    pub fn resolutions(&self) -> Vec<ResolutionReport> {
        self.resolutions
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Clear all state.
    pub fn reset(&self) {
        if let Ok(mut s) = self.states.lock() {
            s.clear();
        }
        if let Ok(mut r) = self.resolutions.lock() {
            r.clear();
        }
        if let Ok(mut l) = self.logs.lock() {
            l.clear();
        }
    }
}

impl Broadcaster for NullBroadcaster {
    fn publish_state(&self, snapshot: &RoundSnapshot) {
        if let Ok(mut s) = self.states.lock() {
            s.push(snapshot.clone());
        }
    }

    fn publish_resolution(&self, report: &ResolutionReport) {
        if let Ok(mut r) = self.resolutions.lock() {
            r.push(report.clone());
        }
    }

    fn publish_log(&self, entry: &LogEntry) {
        if let Ok(mut l) = self.logs.lock() {
            l.push(entry.clone());
        }
    }
}
