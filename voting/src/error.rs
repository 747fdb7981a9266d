use thiserror::Error;

use selection_types::VoteCode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VotingError {
    #[error("unknown vote code {0}")]
    UnknownCode(VoteCode),

    #[error("vote code {0} is disabled")]
    DisabledCode(VoteCode),

    #[error("no current vote for {0} to remove")]
    NoVoteToRemove(VoteCode),

    #[error("invalid timer policy: {0}")]
    InvalidPolicy(String),

    #[error("action registry error: {0}")]
    Registry(#[from] selection_actions::ActionError),
}
