//! Per-batch accumulators behind a single mutex.
//!
//! Every state transition (accept, complete, time out, abort) happens inside one critical section
//! that does no I/O. A batch therefore leaves `Pending` exactly once, and exactly one caller gets
//! the finished outcome set back.

use crate::config::Settings;
use crate::error::AggregateError;
use crate::models::batch::{
    BatchId, BatchSummary, CompletionStatus, OutcomeKey, TaskOutcome,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// How long a batch may stay pending before the watchdog publishes it as partial
    pub batch_timeout: Duration,
    /// How long an outcome for an unregistered batch is held for late registration
    pub orphan_grace: Duration,
    /// Upper bound on buffered orphan outcomes across all batches
    pub orphan_capacity: usize,
    /// How long a finished batch is remembered to classify late duplicates
    pub tombstone_retention: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            batch_timeout: Duration::from_secs(300),
            orphan_grace: Duration::from_secs(30),
            orphan_capacity: 10_000,
            tombstone_retention: Duration::from_secs(3600),
        }
    }
}

impl AggregatorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            batch_timeout: settings.batch_timeout,
            orphan_grace: settings.orphan_grace,
            orphan_capacity: defaults.orphan_capacity,
            tombstone_retention: defaults.tombstone_retention.max(settings.batch_timeout * 2),
        }
    }
}

/// The symbol × strategy plan a batch was dispatched with
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub batch_id: BatchId,
    pub symbols: Vec<String>,
    pub strategies: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

impl BatchPlan {
    pub fn new(symbols: Vec<String>, strategies: Vec<String>) -> Self {
        Self {
            batch_id: BatchId::new(),
            symbols,
            strategies,
            submitted_at: Utc::now(),
        }
    }

    pub fn expected(&self) -> usize {
        self.symbols.len() * self.strategies.len()
    }

    /// Every (symbol, strategy) pair in dispatch order
    pub fn keys(&self) -> impl Iterator<Item = OutcomeKey> + '_ {
        self.symbols.iter().flat_map(move |symbol| {
            self.strategies
                .iter()
                .map(move |strategy| OutcomeKey::new(symbol, strategy))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Completed,
    TimedOut,
    Aborted,
}

/// Outcome set handed to the publisher once a batch leaves `Pending`
#[derive(Debug, Clone)]
pub struct CompletedBatch {
    pub plan: BatchPlan,
    /// Ordered by the plan: symbols in submission order, then strategies in submission order
    pub outcomes: Vec<TaskOutcome>,
    pub status: CompletionStatus,
}

impl CompletedBatch {
    pub fn batch_id(&self) -> BatchId {
        self.plan.batch_id
    }

    pub fn into_summary(self) -> BatchSummary {
        let expected = self.plan.expected();
        BatchSummary::from_outcomes(
            self.plan.batch_id,
            self.plan.submitted_at,
            self.status,
            expected,
            self.outcomes,
        )
    }
}

/// Why an outcome was dropped without being counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The batch was aborted
    Aborted,
    /// The batch already completed or timed out
    Finished,
    /// Orphan buffer is full
    OrphanOverflow,
}

/// What the aggregator did with one outcome
#[derive(Debug)]
pub enum Disposition {
    Accepted { received: usize, expected: usize },
    /// This outcome was the last one; the caller owns publication
    Completed(CompletedBatch),
    Duplicate,
    /// Batch not registered yet; held for the grace period
    Buffered,
    Discarded(DiscardReason),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub stale_orphans: usize,
    pub expired_tombstones: usize,
}

struct Accumulator {
    plan: BatchPlan,
    positions: HashMap<OutcomeKey, usize>,
    received: HashMap<OutcomeKey, TaskOutcome>,
    deadline: Instant,
}

impl Accumulator {
    fn new(plan: BatchPlan, deadline: Instant) -> Self {
        let positions = plan.keys().enumerate().map(|(i, key)| (key, i)).collect();
        Self {
            plan,
            positions,
            received: HashMap::new(),
            deadline,
        }
    }

    fn is_full(&self) -> bool {
        self.received.len() == self.positions.len()
    }

    fn finish(self, status: CompletionStatus) -> CompletedBatch {
        let positions = self.positions;
        let mut outcomes: Vec<TaskOutcome> = self.received.into_values().collect();
        outcomes.sort_by_key(|o| positions.get(&o.key()).copied().unwrap_or(usize::MAX));
        CompletedBatch {
            plan: self.plan,
            outcomes,
            status,
        }
    }
}

struct Tombstone {
    state: BatchState,
    expires_at: Instant,
}

struct Orphan {
    outcome: TaskOutcome,
    received_at: Instant,
}

#[derive(Default)]
struct AggregatorState {
    pending: HashMap<BatchId, Accumulator>,
    tombstones: HashMap<BatchId, Tombstone>,
    orphans: HashMap<BatchId, Vec<Orphan>>,
    orphan_count: usize,
}

enum Applied {
    Accepted { received: usize, expected: usize },
    Completed(CompletedBatch),
    Duplicate,
}

impl AggregatorState {
    /// Record one outcome against a pending batch. Caller guarantees the batch is pending.
    fn apply(
        &mut self,
        outcome: TaskOutcome,
        retention: Duration,
    ) -> Result<Applied, AggregateError> {
        let batch_id = outcome.batch_id;
        let Some(acc) = self.pending.get_mut(&batch_id) else {
            return Err(AggregateError::StaleBatch(batch_id));
        };

        let key = outcome.key();
        if !acc.positions.contains_key(&key) {
            return Err(AggregateError::UnknownPair {
                batch_id,
                symbol: outcome.symbol,
                strategy_id: outcome.strategy_id,
            });
        }
        if acc.received.contains_key(&key) {
            return Ok(Applied::Duplicate);
        }

        acc.received.insert(key, outcome);
        if !acc.is_full() {
            return Ok(Applied::Accepted {
                received: acc.received.len(),
                expected: acc.positions.len(),
            });
        }

        let Some(acc) = self.pending.remove(&batch_id) else {
            return Err(AggregateError::StaleBatch(batch_id));
        };
        self.tombstones.insert(
            batch_id,
            Tombstone {
                state: BatchState::Completed,
                expires_at: Instant::now() + retention,
            },
        );
        Ok(Applied::Completed(acc.finish(CompletionStatus::Complete)))
    }
}

pub struct Aggregator {
    config: AggregatorConfig,
    state: Mutex<AggregatorState>,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(AggregatorState::default()),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Declare a batch and its expected outcome set.
    ///
    /// Buffered orphans for the batch are replayed. If they already cover the whole plan the
    /// finished batch is returned and the caller owns publication.
    pub async fn register(
        &self,
        plan: BatchPlan,
    ) -> Result<Option<CompletedBatch>, AggregateError> {
        let batch_id = plan.batch_id;
        let retention = self.config.tombstone_retention;
        let mut state = self.state.lock().await;

        if state.pending.contains_key(&batch_id) || state.tombstones.contains_key(&batch_id) {
            return Err(AggregateError::AlreadyRegistered(batch_id));
        }

        let expected = plan.expected();
        let deadline = Instant::now() + self.config.batch_timeout;
        state
            .pending
            .insert(batch_id, Accumulator::new(plan, deadline));

        let orphans = state.orphans.remove(&batch_id).unwrap_or_default();
        state.orphan_count -= orphans.len();
        if !orphans.is_empty() {
            debug!(batch_id = %batch_id, count = orphans.len(), "Replaying buffered outcomes");
        }

        let mut completed = None;
        for orphan in orphans {
            match state.apply(orphan.outcome, retention) {
                Ok(Applied::Completed(batch)) => completed = Some(batch),
                Ok(Applied::Duplicate) => {
                    debug!(batch_id = %batch_id, "Dropping duplicate buffered outcome")
                }
                Ok(Applied::Accepted { .. }) => {}
                Err(e) => warn!(batch_id = %batch_id, error = %e, "Dropping buffered outcome"),
            }
        }

        info!(batch_id = %batch_id, expected, "Batch registered");
        Ok(completed)
    }

    /// Fold one outcome into its batch. Duplicates and late arrivals are classified, not counted.
    pub async fn on_outcome(&self, outcome: TaskOutcome) -> Result<Disposition, AggregateError> {
        let batch_id = outcome.batch_id;
        let retention = self.config.tombstone_retention;
        let mut state = self.state.lock().await;

        if state.pending.contains_key(&batch_id) {
            let key = outcome.key();
            return match state.apply(outcome, retention)? {
                Applied::Accepted { received, expected } => {
                    Ok(Disposition::Accepted { received, expected })
                }
                Applied::Completed(batch) => {
                    info!(
                        batch_id = %batch_id,
                        outcomes = batch.outcomes.len(),
                        "Batch complete"
                    );
                    Ok(Disposition::Completed(batch))
                }
                Applied::Duplicate => {
                    debug!(batch_id = %batch_id, key = %key, "Duplicate outcome dropped");
                    Ok(Disposition::Duplicate)
                }
            };
        }

        if let Some(tombstone) = state.tombstones.get(&batch_id) {
            return Ok(match tombstone.state {
                BatchState::Aborted => {
                    warn!(
                        batch_id = %batch_id,
                        symbol = %outcome.symbol,
                        strategy_id = %outcome.strategy_id,
                        "Outcome for aborted batch discarded"
                    );
                    Disposition::Discarded(DiscardReason::Aborted)
                }
                _ => {
                    debug!(
                        batch_id = %batch_id,
                        symbol = %outcome.symbol,
                        strategy_id = %outcome.strategy_id,
                        "Late outcome for finished batch dropped"
                    );
                    Disposition::Discarded(DiscardReason::Finished)
                }
            });
        }

        if state.orphan_count >= self.config.orphan_capacity {
            warn!(batch_id = %batch_id, "Orphan buffer full, outcome discarded");
            return Ok(Disposition::Discarded(DiscardReason::OrphanOverflow));
        }

        debug!(
            batch_id = %batch_id,
            symbol = %outcome.symbol,
            strategy_id = %outcome.strategy_id,
            "Outcome for unregistered batch buffered"
        );
        state.orphan_count += 1;
        state.orphans.entry(batch_id).or_default().push(Orphan {
            outcome,
            received_at: Instant::now(),
        });
        Ok(Disposition::Buffered)
    }

    /// Move a pending batch to `Aborted`. Returns `false` if it was not pending.
    pub async fn abort(&self, batch_id: BatchId) -> bool {
        let mut state = self.state.lock().await;
        if state.pending.remove(&batch_id).is_none() {
            return false;
        }
        let expires_at = Instant::now() + self.config.tombstone_retention;
        state.tombstones.insert(
            batch_id,
            Tombstone {
                state: BatchState::Aborted,
                expires_at,
            },
        );
        if let Some(orphans) = state.orphans.remove(&batch_id) {
            state.orphan_count -= orphans.len();
        }
        warn!(batch_id = %batch_id, "Batch aborted");
        true
    }

    /// Time out every pending batch whose deadline is at or before `now`
    pub async fn expire_overdue(&self, now: Instant) -> Vec<CompletedBatch> {
        let mut state = self.state.lock().await;
        let overdue: Vec<BatchId> = state
            .pending
            .iter()
            .filter(|(_, acc)| acc.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        let mut expired = Vec::with_capacity(overdue.len());
        for batch_id in overdue {
            let Some(acc) = state.pending.remove(&batch_id) else {
                continue;
            };
            state.tombstones.insert(
                batch_id,
                Tombstone {
                    state: BatchState::TimedOut,
                    expires_at: now + self.config.tombstone_retention,
                },
            );
            warn!(
                batch_id = %batch_id,
                received = acc.received.len(),
                expected = acc.positions.len(),
                "Batch timed out, publishing partial results"
            );
            expired.push(acc.finish(CompletionStatus::TimedOut));
        }
        expired
    }

    /// Drop orphans older than the grace period and tombstones past retention
    pub async fn sweep(&self, now: Instant) -> SweepReport {
        let grace = self.config.orphan_grace;
        let mut state = self.state.lock().await;
        let mut report = SweepReport::default();

        state.orphans.retain(|batch_id, orphans| {
            orphans.retain(|orphan| {
                let keep = now.saturating_duration_since(orphan.received_at) < grace;
                if !keep {
                    let e = AggregateError::StaleBatch(*batch_id);
                    warn!(
                        symbol = %orphan.outcome.symbol,
                        strategy_id = %orphan.outcome.strategy_id,
                        error = %e,
                        "Dropping orphan outcome"
                    );
                    report.stale_orphans += 1;
                }
                keep
            });
            !orphans.is_empty()
        });
        state.orphan_count -= report.stale_orphans;

        let before = state.tombstones.len();
        state.tombstones.retain(|_, t| t.expires_at > now);
        report.expired_tombstones = before - state.tombstones.len();

        report
    }

    pub async fn state(&self, batch_id: BatchId) -> Option<BatchState> {
        let state = self.state.lock().await;
        if state.pending.contains_key(&batch_id) {
            return Some(BatchState::Pending);
        }
        state.tombstones.get(&batch_id).map(|t| t.state)
    }

    pub async fn is_complete(&self, batch_id: BatchId) -> bool {
        self.state(batch_id).await == Some(BatchState::Completed)
    }

    /// (received, expected) for a pending batch
    pub async fn progress(&self, batch_id: BatchId) -> Option<(usize, usize)> {
        let state = self.state.lock().await;
        state
            .pending
            .get(&batch_id)
            .map(|acc| (acc.received.len(), acc.positions.len()))
    }

    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn buffered_orphans(&self) -> usize {
        self.state.lock().await.orphan_count
    }
}
