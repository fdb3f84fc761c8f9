//! Batch, task unit and outcome data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::strategy::StrategySignal;

/// Globally unique batch identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Trading signal produced by a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeStatus {
    Ok,
    Failed,
}

/// One strategy evaluated for one symbol. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUnit {
    pub batch_id: BatchId,
    pub symbol: String,
    pub strategy_id: String,
    pub submitted_at: DateTime<Utc>,
    /// 1-based position of this unit within its batch
    pub sequence: usize,
    pub total: usize,
}

impl TaskUnit {
    pub fn key(&self) -> OutcomeKey {
        OutcomeKey::new(&self.symbol, &self.strategy_id)
    }
}

/// Dedup key for outcomes within a batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutcomeKey {
    pub symbol: String,
    pub strategy_id: String,
}

impl OutcomeKey {
    pub fn new(symbol: &str, strategy_id: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            strategy_id: strategy_id.to_string(),
        }
    }
}

impl fmt::Display for OutcomeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.strategy_id)
    }
}

/// Result (or failure) of executing one task unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub batch_id: BatchId,
    pub symbol: String,
    pub strategy_id: String,
    pub signal: Signal,
    pub confidence: f64,
    pub reference_price: f64,
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
    pub completed_at: DateTime<Utc>,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default)]
    pub execution_ms: u64,
}

impl TaskOutcome {
    pub fn ok(unit: &TaskUnit, result: StrategySignal, execution_ms: u64) -> Self {
        Self {
            batch_id: unit.batch_id,
            symbol: unit.symbol.clone(),
            strategy_id: unit.strategy_id.clone(),
            signal: result.signal,
            confidence: result.confidence.clamp(0.0, 1.0),
            reference_price: result.reference_price,
            indicators: result.indicators,
            completed_at: Utc::now(),
            status: OutcomeStatus::Ok,
            error_detail: None,
            execution_ms,
        }
    }

    /// A FAILED outcome always carries a non-empty error detail
    pub fn failed(unit: &TaskUnit, detail: impl Into<String>, execution_ms: u64) -> Self {
        let mut detail = detail.into();
        if detail.trim().is_empty() {
            detail = "strategy execution failed".to_string();
        }
        Self {
            batch_id: unit.batch_id,
            symbol: unit.symbol.clone(),
            strategy_id: unit.strategy_id.clone(),
            signal: Signal::Hold,
            confidence: 0.0,
            reference_price: 0.0,
            indicators: BTreeMap::new(),
            completed_at: Utc::now(),
            status: OutcomeStatus::Failed,
            error_detail: Some(detail),
            execution_ms,
        }
    }

    pub fn key(&self) -> OutcomeKey {
        OutcomeKey::new(&self.symbol, &self.strategy_id)
    }

    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

/// Whether every expected outcome made it into the summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Complete,
    TimedOut,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Complete => "complete",
            CompletionStatus::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub total_symbols: usize,
    pub total_strategies: usize,
    pub total_tasks: usize,
    pub expected_tasks: usize,
    pub failed_tasks: usize,
}

/// Durable record of one finished batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub created_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub status: CompletionStatus,
    pub summary: SummaryCounts,
    pub results: Vec<TaskOutcome>,
    pub total_results: usize,
}

impl BatchSummary {
    /// Build the canonical summary. Distinct counts come from the outcomes actually received.
    pub fn from_outcomes(
        batch_id: BatchId,
        submitted_at: DateTime<Utc>,
        status: CompletionStatus,
        expected_tasks: usize,
        results: Vec<TaskOutcome>,
    ) -> Self {
        let symbols: BTreeSet<&str> = results.iter().map(|r| r.symbol.as_str()).collect();
        let strategies: BTreeSet<&str> = results.iter().map(|r| r.strategy_id.as_str()).collect();
        let summary = SummaryCounts {
            total_symbols: symbols.len(),
            total_strategies: strategies.len(),
            total_tasks: results.len(),
            expected_tasks,
            failed_tasks: results.iter().filter(|r| r.is_failed()).count(),
        };
        let total_results = results.len();

        Self {
            batch_id,
            created_at: Utc::now(),
            submitted_at,
            status,
            summary,
            results,
            total_results,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == CompletionStatus::Complete
    }

    /// Results grouped per symbol, symbols in first-seen order
    pub fn grouped_by_symbol(&self) -> Vec<SymbolResults> {
        let mut groups: Vec<SymbolResults> = Vec::new();
        for outcome in &self.results {
            match groups.iter_mut().find(|g| g.symbol == outcome.symbol) {
                Some(group) => group.strategies.push(outcome.clone()),
                None => groups.push(SymbolResults {
                    symbol: outcome.symbol.clone(),
                    strategies: vec![outcome.clone()],
                }),
            }
        }
        groups
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolResults {
    pub symbol: String,
    pub strategies: Vec<TaskOutcome>,
}

/// Notification envelope: `{"type": "batch_complete", "data": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BatchEvent {
    BatchComplete(BatchSummary),
}

impl BatchEvent {
    pub fn batch_id(&self) -> BatchId {
        match self {
            BatchEvent::BatchComplete(summary) => summary.batch_id,
        }
    }

    pub fn summary(&self) -> &BatchSummary {
        match self {
            BatchEvent::BatchComplete(summary) => summary,
        }
    }
}
