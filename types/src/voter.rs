//! Voter identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// The identity of a viewer casting votes (a chat username, or a synthetic
/// id for admin-injected votes). Unique key of the vote ledger.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterId(String);

impl VoterId {
    /// Prefix used for votes injected from the admin surface.
    pub const SYNTHETIC_PREFIX: &'static str = "admin_";

    /// Create a voter id from a raw string, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TypesError::EmptyVoter);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// A synthetic voter for the `n`-th admin-injected vote.
    pub fn synthetic(n: u64) -> Self {
        Self(format!("{}{n}", Self::SYNTHETIC_PREFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_synthetic(&self) -> bool {
        self.0.starts_with(Self::SYNTHETIC_PREFIX)
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VoterId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_rejects_blank() {
        assert_eq!(VoterId::parse("  alice ").unwrap().as_str(), "alice");
        assert_eq!(VoterId::parse("   "), Err(TypesError::EmptyVoter));
    }

    #[test]
    fn synthetic_ids_are_flagged() {
        let v = VoterId::synthetic(7);
        assert_eq!(v.as_str(), "admin_7");
        assert!(v.is_synthetic());
        assert!(!VoterId::from("bob").is_synthetic());
    }
}
