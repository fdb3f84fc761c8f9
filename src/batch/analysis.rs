//! Strategy ranking over one batch summary

use crate::models::batch::{BatchId, BatchSummary, Signal, TaskOutcome};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Symbols listed per strategy
pub const TOP_SYMBOLS: usize = 3;

/// Letter grade for a strategy's average confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PerformanceGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
}

impl PerformanceGrade {
    pub fn from_confidence(average_confidence: f64) -> Self {
        match average_confidence {
            c if c >= 0.9 => PerformanceGrade::APlus,
            c if c >= 0.8 => PerformanceGrade::A,
            c if c >= 0.7 => PerformanceGrade::B,
            c if c >= 0.6 => PerformanceGrade::C,
            _ => PerformanceGrade::D,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceGrade::APlus => "A+",
            PerformanceGrade::A => "A",
            PerformanceGrade::B => "B",
            PerformanceGrade::C => "C",
            PerformanceGrade::D => "D",
        }
    }
}

impl fmt::Display for PerformanceGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolScore {
    pub symbol: String,
    pub signal: Signal,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAnalysis {
    pub strategy_id: String,
    /// Mean confidence over successful executions
    pub average_confidence: f64,
    pub total_executions: usize,
    pub successful_executions: usize,
    /// Percentage, 0..=100
    pub success_rate: f64,
    pub best_symbol: Option<String>,
    pub best_confidence: f64,
    pub performance_grade: PerformanceGrade,
    /// Highest-confidence successful executions, at most [`TOP_SYMBOLS`]
    pub top_symbols: Vec<SymbolScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchAnalysis {
    pub batch_id: BatchId,
    pub best_strategy: Option<StrategyAnalysis>,
    /// Highest average confidence first
    pub strategies_by_confidence: Vec<StrategyAnalysis>,
    pub total_symbols: usize,
    pub total_strategies: usize,
    pub overall_success_rate: f64,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Successful executions ordered by confidence, highest first; ties keep plan order
pub fn top_symbols(results: &[&TaskOutcome], limit: usize) -> Vec<SymbolScore> {
    let mut successful: Vec<&TaskOutcome> =
        results.iter().copied().filter(|r| !r.is_failed()).collect();
    successful.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    successful
        .into_iter()
        .take(limit)
        .map(|r| SymbolScore {
            symbol: r.symbol.clone(),
            signal: r.signal,
            confidence: round_to(r.confidence, 3),
        })
        .collect()
}

fn analyze_strategy(strategy_id: &str, results: &[&TaskOutcome]) -> StrategyAnalysis {
    let successful: Vec<&&TaskOutcome> = results.iter().filter(|r| !r.is_failed()).collect();
    let total = results.len();
    let success_rate = if total > 0 {
        successful.len() as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    let average_confidence = if successful.is_empty() {
        0.0
    } else {
        successful.iter().map(|r| r.confidence).sum::<f64>() / successful.len() as f64
    };
    let best = successful
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

    let average_confidence = round_to(average_confidence, 3);
    StrategyAnalysis {
        strategy_id: strategy_id.to_string(),
        average_confidence,
        total_executions: total,
        successful_executions: successful.len(),
        success_rate: round_to(success_rate, 2),
        best_symbol: best.map(|r| r.symbol.clone()),
        best_confidence: round_to(best.map(|r| r.confidence).unwrap_or(0.0), 3),
        performance_grade: PerformanceGrade::from_confidence(average_confidence),
        top_symbols: top_symbols(results, TOP_SYMBOLS),
    }
}

pub fn analyze(summary: &BatchSummary) -> BatchAnalysis {
    let mut strategy_ids: Vec<&str> = Vec::new();
    for outcome in &summary.results {
        if !strategy_ids.contains(&outcome.strategy_id.as_str()) {
            strategy_ids.push(&outcome.strategy_id);
        }
    }

    let mut ranked: Vec<StrategyAnalysis> = strategy_ids
        .iter()
        .map(|id| {
            let results: Vec<&TaskOutcome> = summary
                .results
                .iter()
                .filter(|r| r.strategy_id == *id)
                .collect();
            analyze_strategy(id, &results)
        })
        .collect();
    // Stable: ties keep first-seen strategy order
    ranked.sort_by(|a, b| b.average_confidence.total_cmp(&a.average_confidence));

    let total = summary.results.len();
    let successful = summary.results.iter().filter(|r| !r.is_failed()).count();
    let symbols: BTreeSet<&str> = summary.results.iter().map(|r| r.symbol.as_str()).collect();

    BatchAnalysis {
        batch_id: summary.batch_id,
        best_strategy: ranked.first().cloned(),
        total_strategies: ranked.len(),
        strategies_by_confidence: ranked,
        total_symbols: symbols.len(),
        overall_success_rate: if total > 0 {
            round_to(successful as f64 / total as f64 * 100.0, 2)
        } else {
            0.0
        },
    }
}
