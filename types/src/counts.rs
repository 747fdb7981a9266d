//! Per-code vote tallies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::VoteCode;

/// Number of current votes for each code.
///
/// Codes with no votes may be present with a zero count; `get` returns zero
/// for absent codes either way.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteCounts(BTreeMap<VoteCode, u32>);

impl VoteCounts {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// A tally with every given code present at zero.
    pub fn zeroed(codes: impl IntoIterator<Item = VoteCode>) -> Self {
        Self(codes.into_iter().map(|c| (c, 0)).collect())
    }

    pub fn get(&self, code: VoteCode) -> u32 {
        self.0.get(&code).copied().unwrap_or(0)
    }

    pub fn set(&mut self, code: VoteCode, count: u32) {
        self.0.insert(code, count);
    }

    pub fn increment(&mut self, code: VoteCode) {
        *self.0.entry(code).or_insert(0) += 1;
    }

    /// Sum over all codes.
    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    /// Number of codes holding at least one vote.
    pub fn nonzero_codes(&self) -> usize {
        self.0.values().filter(|&&n| n > 0).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VoteCode, u32)> + '_ {
        self.0.iter().map(|(c, n)| (*c, *n))
    }
}

impl FromIterator<(VoteCode, u32)> for VoteCounts {
    fn from_iter<I: IntoIterator<Item = (VoteCode, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(c: char) -> VoteCode {
        VoteCode::new(c)
    }

    #[test]
    fn zeroed_counts_report_zero_total() {
        let counts = VoteCounts::zeroed([code('k'), code('l'), code('x')]);
        assert_eq!(counts.total(), 0);
        assert_eq!(counts.nonzero_codes(), 0);
        assert_eq!(counts.iter().count(), 3);
    }

    #[test]
    fn increment_and_get() {
        let mut counts = VoteCounts::new();
        counts.increment(code('k'));
        counts.increment(code('k'));
        counts.increment(code('x'));
        assert_eq!(counts.get(code('k')), 2);
        assert_eq!(counts.get(code('l')), 0);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.nonzero_codes(), 2);
    }

    #[test]
    fn json_keys_are_codes() {
        let counts: VoteCounts = [(code('k'), 3), (code('l'), 1)].into_iter().collect();
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"k":3,"l":1}"#);
    }
}
