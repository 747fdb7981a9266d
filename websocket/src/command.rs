//! Commands the transport hands to the engine, each with a reply channel.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use selection_actions::Action;

/// Administrative controls from the operator panel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Inject a vote from a synthetic voter.
    AddVote { code: String },
    /// Remove the most recently cast vote for a code.
    RemoveVote { code: String },
    /// Resolve immediately. With a code, that code wins regardless of votes;
    /// without one, the normal winner rule applies.
    ForceResolve {
        #[serde(default)]
        code: Option<String>,
    },
    Reset,
    StartCycle,
    EndCycle,
    PauseTimer,
    ResumeTimer,
    GetLog,
}

impl AdminCommand {
    /// Short name used in replies and logs.
    pub fn name(&self) -> &'static str {
        match self {
            AdminCommand::AddVote { .. } => "add_vote",
            AdminCommand::RemoveVote { .. } => "remove_vote",
            AdminCommand::ForceResolve { .. } => "force_resolve",
            AdminCommand::Reset => "reset",
            AdminCommand::StartCycle => "start_cycle",
            AdminCommand::EndCycle => "end_cycle",
            AdminCommand::PauseTimer => "pause_timer",
            AdminCommand::ResumeTimer => "resume_timer",
            AdminCommand::GetLog => "get_log",
        }
    }
}

/// Outcome of an admin command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminReply {
    pub ok: bool,
    pub message: String,
    /// Action log lines, newest first. Only set for `get_log`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<String>>,
}

impl AdminReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            log: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            log: None,
        }
    }

    pub fn with_log(mut self, lines: Vec<String>) -> Self {
        self.log = Some(lines);
        self
    }
}

/// A request from a connected client to the engine.
#[derive(Debug)]
pub enum InboundCommand {
    CastVote {
        voter: String,
        code: String,
        /// Client-supplied time in epoch millis; the engine clock otherwise.
        timestamp: Option<u64>,
        reply: oneshot::Sender<bool>,
    },
    GetActions {
        reply: oneshot::Sender<Vec<Action>>,
    },
    Admin {
        command: AdminCommand,
        reply: oneshot::Sender<AdminReply>,
    },
}
