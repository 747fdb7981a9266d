//! Errors raised while parsing the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("vote code must be exactly one character, got {0:?}")]
    InvalidVoteCode(String),

    #[error("voter identity must not be empty")]
    EmptyVoter,
}
