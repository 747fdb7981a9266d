//! Round service: serialized access to the round plus everything that
//! happens around a mutation (metrics, broadcast, action log, dispatch).
//!
//! Votes, ticks and admin commands all take the round lock for the state
//! change only. Broadcasting runs after it is released. Dispatch is handed
//! to a background task, one at a time and in resolution order, so a slow
//! adapter never holds up the command or tick loop.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::Instrument;

use selection_actions::{Action, ActionDispatcher, ActionRegistry, DispatchError, DispatchReport};
use selection_types::{Clock, Timestamp, VoteCode};
use selection_voting::{
    Broadcaster, CastOutcome, ClaimTransition, LogEntry, Resolution, ResolutionReport, Round,
    RoundSnapshot, TickOutcome, TimerChange, TimerPolicy,
};
use selection_websocket::{AdminCommand, AdminReply, InboundCommand};

use crate::action_log::ActionLog;
use crate::metrics::NodeMetrics;
use crate::tracing_spans;
use crate::NodeError;

/// Cheap to clone; every clone shares the same round.
#[derive(Clone)]
pub struct RoundService {
    round: Arc<Mutex<Round>>,
    registry: Arc<ActionRegistry>,
    log: Arc<Mutex<ActionLog>>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn ActionDispatcher>,
    broadcaster: Arc<dyn Broadcaster>,
    metrics: Arc<NodeMetrics>,
    /// Resolutions still dispatching.
    in_flight: Arc<Mutex<JoinSet<ResolutionReport>>>,
    /// Serializes dispatches across rounds.
    dispatch_order: Arc<Mutex<()>>,
}

impl RoundService {
    pub fn new(
        registry: Arc<ActionRegistry>,
        policy: TimerPolicy,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn ActionDispatcher>,
        broadcaster: Arc<dyn Broadcaster>,
        metrics: Arc<NodeMetrics>,
    ) -> Result<Self, NodeError> {
        let round = Round::new(Arc::clone(&registry), policy)?;
        Ok(Self {
            round: Arc::new(Mutex::new(round)),
            registry,
            log: Arc::new(Mutex::new(ActionLog::default())),
            clock,
            dispatcher,
            broadcaster,
            metrics,
            in_flight: Arc::new(Mutex::new(JoinSet::new())),
            dispatch_order: Arc::new(Mutex::new(())),
        })
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Enabled actions, in catalog order.
    pub fn actions(&self) -> Vec<Action> {
        self.registry
            .all()
            .iter()
            .filter(|a| a.enabled)
            .cloned()
            .collect()
    }

    pub async fn snapshot(&self) -> RoundSnapshot {
        let now = self.clock.now();
        self.round.lock().await.snapshot(now)
    }

    /// Action log lines, newest first.
    pub async fn log_lines(&self) -> Vec<String> {
        self.log.lock().await.lines()
    }

    /// Cast a vote. `at` defaults to the service clock. Never fails; returns
    /// whether the vote was accepted.
    pub async fn cast_vote(&self, voter: &str, code: &str, at: Option<Timestamp>) -> bool {
        let span = tracing_spans::vote_span(voter, code);
        async move {
            let now = self.clock.now();
            let at = at.unwrap_or(now);
            let (outcome, snapshot) = {
                let mut round = self.round.lock().await;
                let outcome = round.cast_vote_input(voter, code, at);
                (outcome, round.snapshot(now))
            };

            let CastOutcome::Accepted {
                previous,
                claim,
                timer,
            } = outcome
            else {
                self.metrics.votes_rejected.inc();
                tracing::debug!("vote rejected");
                return false;
            };

            self.metrics.votes_accepted.inc();
            tracing::info!(previous = ?previous, voters = snapshot.total_voters, "vote recorded");
            match timer {
                TimerChange::Started(limit) => tracing::info!(limit, "countdown started"),
                TimerChange::Recomputed(limit) => tracing::debug!(limit, "countdown reset"),
                TimerChange::Unchanged => {}
            }
            self.record_claim(&claim).await;
            self.publish(&snapshot);
            true
        }
        .instrument(span)
        .await
    }

    /// Advance the countdown by one tick. Returns the resolution when the
    /// round expired on this tick; its dispatch continues in the background.
    pub async fn tick(&self) -> Option<Resolution> {
        let now = self.clock.now();
        let (outcome, snapshot) = {
            let mut round = self.round.lock().await;
            let span = tracing_spans::tick_span(round.number());
            let _enter = span.enter();
            let outcome = round.tick(now);
            (outcome, round.snapshot(now))
        };

        match outcome {
            TickOutcome::Idle | TickOutcome::Paused { .. } => None,
            TickOutcome::Counting { .. } => {
                self.publish(&snapshot);
                None
            }
            TickOutcome::Expired(resolution) => {
                self.publish(&snapshot);
                self.conclude(resolution.clone()).await;
                Some(resolution)
            }
        }
    }

    /// Run an admin command. Failures are reported in the reply, never raised.
    pub async fn admin(&self, command: AdminCommand) -> AdminReply {
        let span = tracing_spans::admin_span(command.name());
        async move {
            match self.run_admin(command).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(error = %e, "admin command failed");
                    AdminReply::err(e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_admin(&self, command: AdminCommand) -> Result<AdminReply, NodeError> {
        let now = self.clock.now();
        let reply = match command {
            AdminCommand::AddVote { code } => {
                let code = VoteCode::parse(&code)?;
                let (voter, outcome) = self.round.lock().await.add_synthetic_vote(code, now)?;
                if let CastOutcome::Accepted { claim, .. } = &outcome {
                    self.record_claim(claim).await;
                }
                self.metrics.votes_accepted.inc();
                self.log_action("Admin vote added", format!("{voter}: {code}"))
                    .await;
                AdminReply::ok(format!("Added vote {code} as {voter}"))
            }
            AdminCommand::RemoveVote { code } => {
                let code = VoteCode::parse(&code)?;
                let (removed, claim) = self.round.lock().await.remove_latest_vote(code)?;
                self.record_claim(&claim).await;
                self.log_action("Admin vote removed", format!("{}: {code}", removed.voter))
                    .await;
                AdminReply::ok(format!("Removed {}'s vote for {code}", removed.voter))
            }
            AdminCommand::ForceResolve { code } => {
                let resolution = {
                    let mut round = self.round.lock().await;
                    match code {
                        Some(raw) => round.force_resolve(VoteCode::parse(&raw)?, now)?,
                        None => round.resolve(now),
                    }
                };
                self.publish(&self.snapshot().await);
                let message = format!(
                    "Round {} resolved to {}",
                    resolution.round, resolution.winner
                );
                self.conclude(resolution).await;
                return Ok(AdminReply::ok(message));
            }
            AdminCommand::Reset => {
                self.round.lock().await.reset();
                self.log_action("Votes reset", "").await;
                AdminReply::ok("Votes reset")
            }
            AdminCommand::StartCycle => {
                self.round.lock().await.start_cycle(now);
                self.log_action("Cycle started", "").await;
                AdminReply::ok("Cycle started")
            }
            AdminCommand::EndCycle => {
                self.round.lock().await.end_cycle();
                self.log_action("Cycle ended", "").await;
                AdminReply::ok("Cycle ended")
            }
            AdminCommand::PauseTimer => {
                self.round.lock().await.pause_timer();
                self.log_action("Timer", "paused").await;
                AdminReply::ok("Timer paused")
            }
            AdminCommand::ResumeTimer => {
                self.round.lock().await.resume_timer();
                self.log_action("Timer", "resumed").await;
                AdminReply::ok("Timer resumed")
            }
            AdminCommand::GetLog => {
                return Ok(AdminReply::ok("Action log").with_log(self.log_lines().await));
            }
        };
        self.publish(&self.snapshot().await);
        Ok(reply)
    }

    /// Answer one command from the transport.
    pub async fn handle(&self, command: InboundCommand) {
        match command {
            InboundCommand::CastVote {
                voter,
                code,
                timestamp,
                reply,
            } => {
                let accepted = self
                    .cast_vote(&voter, &code, timestamp.map(Timestamp::from_millis))
                    .await;
                let _ = reply.send(accepted);
            }
            InboundCommand::GetActions { reply } => {
                let _ = reply.send(self.actions());
            }
            InboundCommand::Admin { command, reply } => {
                let _ = reply.send(self.admin(command).await);
            }
        }
    }

    /// Wait for every handed-off resolution to finish dispatching. Returns
    /// their reports in completion order.
    pub async fn settle(&self) -> Vec<ResolutionReport> {
        let mut tasks = self.in_flight.lock().await;
        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!(error = %e, "resolution task failed"),
            }
        }
        reports
    }

    /// Post-resolution work, outside the round lock. The log line is written
    /// now; dispatch and the resolution broadcast run on a background task.
    async fn conclude(&self, resolution: Resolution) {
        self.metrics.rounds_resolved.inc();
        let winner = self
            .registry
            .get(resolution.winner)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| resolution.winner.to_string());
        tracing::info!(
            round = resolution.round,
            winner = %resolution.winner,
            votes = resolution.tally.total(),
            claimant = ?resolution.claimant,
            forced = resolution.forced,
            "round resolved"
        );
        let how = if resolution.forced { "forced" } else { "timer" };
        self.log_action(
            format!("Round {} resolved", resolution.round),
            format!("{winner} ({how})"),
        )
        .await;

        let service = self.clone();
        let span = tracing_spans::resolve_span(resolution.round, resolution.forced);
        let mut tasks = self.in_flight.lock().await;
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move { service.finish(resolution).await }.instrument(span));
    }

    async fn finish(&self, resolution: Resolution) -> ResolutionReport {
        let _order = self.dispatch_order.lock().await;
        let dispatch = match resolution.dispatch.clone() {
            Some(action) => Some(self.dispatch(action).await),
            None => None,
        };
        let report = ResolutionReport {
            resolution,
            dispatch,
        };
        self.broadcaster.publish_resolution(&report);
        report
    }

    async fn dispatch(&self, action: Action) -> DispatchReport {
        let code = action.code.to_string();
        let span = tracing_spans::dispatch_span(&code, self.dispatcher.name());
        async move {
            let dispatcher = Arc::clone(&self.dispatcher);
            let job = action.clone();
            let result = tokio::task::spawn_blocking(move || dispatcher.dispatch(&job))
                .await
                .unwrap_or_else(|e| Err(DispatchError::Join(e.to_string())));

            let report = DispatchReport::from_result(&action, &result);
            match &result {
                Ok(()) => {
                    tracing::info!(action = %action.name, "action dispatched");
                    self.log_action("Executed", action.name.clone()).await;
                }
                Err(e) => {
                    self.metrics.dispatch_failures.inc();
                    tracing::warn!(action = %action.name, error = %e, "dispatch failed");
                    self.log_action("Execution failed", format!("{}: {e}", action.name))
                        .await;
                }
            }
            report
        }
        .instrument(span)
        .await
    }

    async fn record_claim(&self, claim: &ClaimTransition) {
        match claim {
            ClaimTransition::Unchanged => {}
            ClaimTransition::Claimed(voter) => {
                tracing::info!(%voter, "claim taken");
                self.log_action("Claim", format!("{voter} holds the claim")).await;
            }
            ClaimTransition::Transferred { from, to } => {
                tracing::info!(%from, %to, "claim transferred");
                self.log_action("Claim", format!("{from} -> {to}")).await;
            }
            ClaimTransition::Released(voter) => {
                tracing::info!(%voter, "claim released");
                self.log_action("Claim", format!("{voter} released the claim"))
                    .await;
            }
        }
    }

    async fn log_action(&self, action: impl Into<String>, details: impl Into<String>) {
        let entry = LogEntry::new(self.clock.now(), action, details);
        self.log.lock().await.push(entry.clone());
        self.broadcaster.publish_log(&entry);
    }

    fn publish(&self, snapshot: &RoundSnapshot) {
        self.metrics.observe(snapshot);
        self.broadcaster.publish_state(snapshot);
    }
}
