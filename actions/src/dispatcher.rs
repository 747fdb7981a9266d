//! Action dispatch: turning a resolved action into an effect outside the engine.
//!
//! The engine never retries a dispatch and never lets a failure block the next
//! round; it only logs and reports the outcome. Implementations may block (a
//! subprocess, a focus delay), so callers run them off the async executor.

use serde::{Deserialize, Serialize};
use std::process::Command;

use selection_types::VoteCode;

use crate::{Action, DispatchError};

/// A pluggable executor for resolved actions.
///
/// Implementations might include:
/// - a dry-run logger ([`LogDispatcher`])
/// - an external command such as `xdotool key` ([`CommandDispatcher`])
/// - a recording double for tests
pub trait ActionDispatcher: Send + Sync {
    /// Human-readable name of this dispatcher.
    fn name(&self) -> &str;

    /// Execute the action. May block.
    fn dispatch(&self, action: &Action) -> Result<(), DispatchError>;
}

/// Outcome of one dispatch, as reported to the admin surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub code: VoteCode,
    pub action: String,
    pub success: bool,
    pub error: Option<String>,
}

impl DispatchReport {
    pub fn from_result(action: &Action, result: &Result<(), DispatchError>) -> Self {
        Self {
            code: action.code,
            action: action.name.clone(),
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
        }
    }
}

/// Dispatcher that only logs what it would have done.
#[derive(Clone, Debug, Default)]
pub struct LogDispatcher;

impl ActionDispatcher for LogDispatcher {
    fn name(&self) -> &str {
        "log"
    }

    fn dispatch(&self, action: &Action) -> Result<(), DispatchError> {
        tracing::info!(
            code = %action.code,
            action = %action.name,
            keypress = action.keypress.as_deref().unwrap_or("-"),
            "dry-run dispatch"
        );
        Ok(())
    }
}

/// Dispatcher that runs an external program once per action.
///
/// Each argument may contain `{key}` (replaced by the action's keypress) and
/// `{code}` (replaced by the vote code). Actions without a keypress fail with
/// [`DispatchError::NoKeypress`].
#[derive(Clone, Debug)]
pub struct CommandDispatcher {
    program: String,
    args: Vec<String>,
}

impl CommandDispatcher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Arguments with placeholders substituted for `action`.
    pub fn render_args(&self, action: &Action, key: &str) -> Vec<String> {
        let code = action.code.to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{key}", key).replace("{code}", &code))
            .collect()
    }
}

impl ActionDispatcher for CommandDispatcher {
    fn name(&self) -> &str {
        "command"
    }

    fn dispatch(&self, action: &Action) -> Result<(), DispatchError> {
        let key = action
            .keypress
            .as_deref()
            .ok_or(DispatchError::NoKeypress(action.code))?;
        let args = self.render_args(action, key);

        tracing::debug!(program = %self.program, ?args, "running dispatch command");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| DispatchError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(DispatchError::NonZeroExit {
                program: self.program.clone(),
                status: output.status.to_string(),
            })
        }
    }
}
