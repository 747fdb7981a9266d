//! Single-character vote codes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A vote/action code such as `k`, `l` or `x`.
///
/// Codes are case-insensitive on input and always stored lower-case. Whether a
/// code is actually accepted is decided by the action registry, not here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoteCode(char);

impl VoteCode {
    pub fn new(c: char) -> Self {
        Self(c.to_ascii_lowercase())
    }

    pub fn as_char(&self) -> char {
        self.0
    }

    /// Parse a code from chat-style input: surrounding whitespace is ignored
    /// and exactly one character must remain.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let trimmed = raw.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Self::new(c)),
            _ => Err(TypesError::InvalidVoteCode(raw.to_string())),
        }
    }
}

impl FromStr for VoteCode {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VoteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<char> for VoteCode {
    fn from(c: char) -> Self {
        Self::new(c)
    }
}

// Serialized as a one-character string so it can key JSON objects.
impl Serialize for VoteCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VoteCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
