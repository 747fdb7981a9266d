//! Nullable dispatcher: record actions instead of pressing keys.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use selection_actions::{Action, ActionDispatcher, DispatchError};
use selection_types::VoteCode;

/// A test dispatcher that records every action it is handed.
///
/// Codes registered with [`fail_on`](Self::fail_on) return an error instead,
/// after still being recorded. [`set_delay`](Self::set_delay) makes every
/// dispatch block the calling thread first, like a slow external program.
#[derive(Debug, Default)]
pub struct NullDispatcher {
    dispatched: Mutex<Vec<Action>>,
    failing: Mutex<HashSet<VoteCode>>,
    delay: Mutex<Option<Duration>>,
}

impl NullDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later dispatch of `code` fail.
    pub fn fail_on(&self, code: VoteCode) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(code);
        }
    }

    /// Block each later dispatch for `delay` before recording it.
    pub fn set_delay(&self, delay: Duration) {
        if let Ok(mut d) = self.delay.lock() {
            *d = Some(delay);
        }
    }

    /// All actions dispatched so far (for assertions).
    pub fn dispatched(&self) -> Vec<Action> {
        self.dispatched
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    pub fn dispatched_codes(&self) -> Vec<VoteCode> {
        self.dispatched().iter().map(|a| a.code).collect()
    }

    /// Clear all state.
    pub fn reset(&self) {
        if let Ok(mut d) = self.dispatched.lock() {
            d.clear();
        }
        if let Ok(mut f) = self.failing.lock() {
            f.clear();
        }
        if let Ok(mut d) = self.delay.lock() {
            *d = None;
        }
    }
}

impl ActionDispatcher for NullDispatcher {
    fn name(&self) -> &str {
        "null"
    }

    fn dispatch(&self, action: &Action) -> Result<(), DispatchError> {
        let delay = self.delay.lock().map(|d| *d).unwrap_or(None);
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if let Ok(mut d) = self.dispatched.lock() {
            d.push(action.clone());
        }
        let fails = self
            .failing
            .lock()
            .map(|f| f.contains(&action.code))
            .unwrap_or(false);
        if fails {
            return Err(DispatchError::Other(format!(
                "scripted failure for {}",
                action.code
            )));
        }
        Ok(())
    }
}
