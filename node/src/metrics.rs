//! Prometheus metrics for the selection node.
//!
//! The [`NodeMetrics`] struct owns a dedicated [`Registry`] that the
//! WebSocket server's `/metrics` route encodes into the Prometheus text
//! exposition format.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};

use selection_voting::RoundSnapshot;

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub votes_accepted: IntCounter,
    /// Votes refused for an unknown or disabled code, or malformed input.
    pub votes_rejected: IntCounter,
    pub rounds_resolved: IntCounter,
    pub dispatch_failures: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Voters holding a vote in the current round.
    pub voters: IntGauge,
    /// Seconds left on the countdown, 0 when idle.
    pub countdown_remaining: IntGauge,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let votes_accepted = register_int_counter_with_registry!(
            Opts::new("selection_votes_accepted_total", "Total votes accepted"),
            registry
        )?;
        let votes_rejected = register_int_counter_with_registry!(
            Opts::new("selection_votes_rejected_total", "Total votes rejected"),
            registry
        )?;
        let rounds_resolved = register_int_counter_with_registry!(
            Opts::new("selection_rounds_resolved_total", "Total rounds resolved"),
            registry
        )?;
        let dispatch_failures = register_int_counter_with_registry!(
            Opts::new(
                "selection_dispatch_failures_total",
                "Total action dispatches that failed"
            ),
            registry
        )?;

        let voters = register_int_gauge_with_registry!(
            Opts::new("selection_voters", "Voters in the current round"),
            registry
        )?;
        let countdown_remaining = register_int_gauge_with_registry!(
            Opts::new(
                "selection_countdown_remaining",
                "Seconds left before the current round resolves"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            votes_accepted,
            votes_rejected,
            rounds_resolved,
            dispatch_failures,
            voters,
            countdown_remaining,
        })
    }

    /// Refresh the gauges from a round snapshot.
    pub fn observe(&self, snapshot: &RoundSnapshot) {
        self.voters.set(snapshot.total_voters as i64);
        self.countdown_remaining
            .set(i64::from(snapshot.remaining.unwrap_or(0)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selection_types::{Timestamp, VoteCounts};
    use selection_voting::RoundPhase;

    #[test]
    fn registers_every_metric() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.votes_accepted.inc();
        let names: Vec<String> = metrics
            .registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"selection_votes_accepted_total".to_string()));
        assert!(names.contains(&"selection_countdown_remaining".to_string()));
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn observe_sets_gauges() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.observe(&RoundSnapshot {
            counts: VoteCounts::new(),
            total_voters: 4,
            claimant: None,
            active: true,
            phase: RoundPhase::Counting,
            remaining: Some(33),
            limit: Some(70),
            paused: false,
            round: 1,
            timestamp: Timestamp::EPOCH,
        });
        assert_eq!(metrics.voters.get(), 4);
        assert_eq!(metrics.countdown_remaining.get(), 33);
    }
}
