use thiserror::Error;

use selection_types::VoteCode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("action code {0} is defined twice")]
    DuplicateCode(VoteCode),

    #[error("registry needs exactly one neutral action, found {0}")]
    NeutralCount(usize),

    #[error("registry needs exactly two decisive actions, found {0}")]
    DecisiveCount(usize),

    #[error("at most one action may carry the claim, found {0}")]
    ClaimCount(usize),

    #[error("unknown action code {0}")]
    UnknownCode(VoteCode),
}

/// Failure reported by an [`crate::ActionDispatcher`]. Never fatal to the round.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("action {0} has no keypress bound")]
    NoKeypress(VoteCode),

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    NonZeroExit { program: String, status: String },

    #[error("dispatch task failed: {0}")]
    Join(String),

    #[error("{0}")]
    Other(String),
}
