//! Schema agreement detection.
//!
//! After a schema change every node applies the new schema asynchronously. A
//! check polls the UP nodes of a roster snapshot until they all report the
//! same schema version in one round, or until the budget runs out.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AgreementSettings;
use crate::database::ControlChannel;
use crate::errors::DriverError;
use crate::metrics;
use crate::types::NodeView;

/// Outcome of one agreement check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgreementResult {
    pub agreed: bool,
    /// Versions seen in the last completed round.
    pub observed_versions: BTreeSet<Uuid>,
    /// UP nodes that did not answer in the last completed round.
    pub non_responding: Vec<SocketAddr>,
    pub rounds: u32,
    pub elapsed: Duration,
}

impl AgreementResult {
    fn disabled() -> Self {
        Self {
            agreed: false,
            observed_versions: BTreeSet::new(),
            non_responding: Vec::new(),
            rounds: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// The common version, when the check converged.
    pub fn agreed_version(&self) -> Option<Uuid> {
        if self.agreed {
            self.observed_versions.iter().next().copied()
        } else {
            None
        }
    }
}

/// What a single node said during one polling round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Reported(Uuid),
    NonResponding,
}

#[derive(Debug, Default)]
struct Round {
    versions: BTreeSet<Uuid>,
    non_responding: Vec<SocketAddr>,
}

impl Round {
    fn converged(&self) -> bool {
        self.non_responding.is_empty() && self.versions.len() == 1
    }
}

pub struct SchemaAgreementChecker {
    channel: Arc<dyn ControlChannel>,
    interval: Duration,
}

impl SchemaAgreementChecker {
    pub fn new(channel: Arc<dyn ControlChannel>, interval: Duration) -> Self {
        Self { channel, interval }
    }

    pub fn from_settings(channel: Arc<dyn ControlChannel>, settings: &AgreementSettings) -> Self {
        Self::new(channel, settings.interval)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until the UP nodes agree or `budget` elapses.
    ///
    /// A zero budget returns `agreed = false` without touching the channel.
    /// Running out of time is not an error. An unreachable control channel is.
    pub async fn check_agreement(&self, budget: Duration) -> Result<AgreementResult, DriverError> {
        if budget.is_zero() {
            debug!("Schema agreement checks are disabled (timeout is zero)");
            metrics::record_agreement("disabled", 0.0);
            return Ok(AgreementResult::disabled());
        }

        let start = Instant::now();
        let deadline = start + budget;

        let result = self.poll_until(start, deadline).await;
        let elapsed = start.elapsed().as_secs_f64();
        match &result {
            Ok(outcome) if outcome.agreed => metrics::record_agreement("agreed", elapsed),
            Ok(_) => metrics::record_agreement("timeout", elapsed),
            Err(_) => metrics::record_agreement("error", elapsed),
        }
        result
    }

    async fn poll_until(&self, start: Instant, deadline: Instant) -> Result<AgreementResult, DriverError> {
        // The roster is read once; topology events during the check do not apply to it.
        let up = self.channel.list_up_nodes().await?;
        if up.is_empty() {
            return Err(DriverError::NoLiveNodes);
        }

        debug!("Checking schema agreement across {} UP nodes", up.len());

        let mut rounds = 0;
        loop {
            let round = self.poll_round(&up, deadline).await?;
            rounds += 1;

            if round.converged() {
                info!(
                    "Schema agreement reached after {} round(s) in {:?}",
                    rounds,
                    start.elapsed()
                );
                return Ok(AgreementResult {
                    agreed: true,
                    observed_versions: round.versions,
                    non_responding: round.non_responding,
                    rounds,
                    elapsed: start.elapsed(),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "Schema agreement not reached in {:?}: {} version(s), {} non-responding node(s)",
                    start.elapsed(),
                    round.versions.len(),
                    round.non_responding.len()
                );
                return Ok(AgreementResult {
                    agreed: false,
                    observed_versions: round.versions,
                    non_responding: round.non_responding,
                    rounds,
                    elapsed: start.elapsed(),
                });
            }

            debug!(
                "Schema versions not in agreement yet ({} version(s), {} non-responding), retrying",
                round.versions.len(),
                round.non_responding.len()
            );
            sleep(self.interval.min(deadline - now)).await;
        }
    }

    /// Ask every node once; the round is complete only when each poll finished or timed out.
    async fn poll_round(&self, nodes: &[NodeView], deadline: Instant) -> Result<Round, DriverError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let polls = nodes.iter().map(|node| self.poll_node(node, remaining));
        let outcomes = join_all(polls).await;

        let mut round = Round::default();
        for (node, outcome) in nodes.iter().zip(outcomes) {
            match outcome? {
                PollOutcome::Reported(version) => {
                    round.versions.insert(version);
                }
                PollOutcome::NonResponding => round.non_responding.push(node.address),
            }
        }
        Ok(round)
    }

    async fn poll_node(&self, node: &NodeView, remaining: Duration) -> Result<PollOutcome, DriverError> {
        match timeout(remaining, self.channel.query_schema_version(node)).await {
            Ok(Ok(version)) => Ok(PollOutcome::Reported(version)),
            Ok(Err(DriverError::ControlChannel(reason))) => Err(DriverError::ControlChannel(reason)),
            Ok(Err(e)) => {
                debug!("Node {} did not report a schema version: {}", node.address, e);
                Ok(PollOutcome::NonResponding)
            }
            Err(_) => {
                debug!("Node {} did not answer within {:?}", node.address, remaining);
                Ok(PollOutcome::NonResponding)
            }
        }
    }
}
