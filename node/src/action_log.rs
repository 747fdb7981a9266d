//! Operator action log: the last few admin-relevant events.
//!
//! A bounded FIFO; when full, the oldest entry is evicted. Read back
//! newest first, the way the admin panel shows it.

use std::collections::VecDeque;

use selection_voting::LogEntry;

/// Entries kept by default.
pub const ACTION_LOG_CAPACITY: usize = 10;

#[derive(Clone, Debug)]
pub struct ActionLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl ActionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record an entry, evicting the oldest if at capacity.
    pub fn push(&mut self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().rev()
    }

    /// Formatted lines, newest first.
    pub fn lines(&self) -> Vec<String> {
        self.entries().map(LogEntry::line).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(ACTION_LOG_CAPACITY)
    }
}
