//! Unit tests for batch analysis

use chrono::Utc;
use std::collections::BTreeMap;
use stockscan::batch::{analyze, top_symbols, PerformanceGrade};
use stockscan::models::batch::{
    BatchId, BatchSummary, CompletionStatus, OutcomeStatus, Signal, TaskOutcome,
};

fn outcome(batch_id: BatchId, symbol: &str, strategy: &str, confidence: f64, ok: bool) -> TaskOutcome {
    TaskOutcome {
        batch_id,
        symbol: symbol.to_string(),
        strategy_id: strategy.to_string(),
        signal: if ok { Signal::Buy } else { Signal::Hold },
        confidence,
        reference_price: 100.0,
        indicators: BTreeMap::new(),
        completed_at: Utc::now(),
        status: if ok { OutcomeStatus::Ok } else { OutcomeStatus::Failed },
        error_detail: if ok { None } else { Some("boom".to_string()) },
        execution_ms: 1,
    }
}

#[test]
fn ranks_strategies_by_average_confidence() {
    let id = BatchId::new();
    let results = vec![
        outcome(id, "AAPL", "rsi", 0.4, true),
        outcome(id, "AAPL", "macd", 0.9, true),
        outcome(id, "MSFT", "rsi", 0.6, true),
        outcome(id, "MSFT", "macd", 0.0, false),
    ];
    let summary = BatchSummary::from_outcomes(id, Utc::now(), CompletionStatus::Complete, 4, results);

    let analysis = analyze(&summary);
    assert_eq!(analysis.total_symbols, 2);
    assert_eq!(analysis.total_strategies, 2);
    assert_eq!(analysis.overall_success_rate, 75.0);

    let best = analysis.best_strategy.unwrap();
    assert_eq!(best.strategy_id, "macd");
    assert_eq!(best.average_confidence, 0.9);
    assert_eq!(best.success_rate, 50.0);
    assert_eq!(best.best_symbol.as_deref(), Some("AAPL"));

    let rsi = &analysis.strategies_by_confidence[1];
    assert_eq!(rsi.average_confidence, 0.5);
    assert_eq!(rsi.best_symbol.as_deref(), Some("MSFT"));
    assert_eq!(rsi.total_executions, 2);
}

#[test]
fn all_failed_strategy_has_no_best_symbol() {
    let id = BatchId::new();
    let results = vec![outcome(id, "X", "rsi", 0.0, false)];
    let summary = BatchSummary::from_outcomes(id, Utc::now(), CompletionStatus::Complete, 1, results);

    let analysis = analyze(&summary);
    let rsi = analysis.best_strategy.unwrap();
    assert_eq!(rsi.best_symbol, None);
    assert_eq!(rsi.success_rate, 0.0);
    assert_eq!(analysis.overall_success_rate, 0.0);
}

#[test]
fn empty_summary_has_no_best_strategy() {
    let summary = BatchSummary::from_outcomes(
        BatchId::new(),
        Utc::now(),
        CompletionStatus::TimedOut,
        3,
        Vec::new(),
    );
    let analysis = analyze(&summary);
    assert!(analysis.best_strategy.is_none());
    assert!(analysis.strategies_by_confidence.is_empty());
}

#[test]
fn grade_follows_average_confidence() {
    assert_eq!(PerformanceGrade::from_confidence(0.95), PerformanceGrade::APlus);
    assert_eq!(PerformanceGrade::from_confidence(0.9), PerformanceGrade::APlus);
    assert_eq!(PerformanceGrade::from_confidence(0.85), PerformanceGrade::A);
    assert_eq!(PerformanceGrade::from_confidence(0.7), PerformanceGrade::B);
    assert_eq!(PerformanceGrade::from_confidence(0.65), PerformanceGrade::C);
    assert_eq!(PerformanceGrade::from_confidence(0.2), PerformanceGrade::D);
    assert_eq!(PerformanceGrade::APlus.to_string(), "A+");
}

#[test]
fn strategy_carries_grade_and_top_symbols() {
    let id = BatchId::new();
    let results = vec![
        outcome(id, "AAPL", "rsi", 0.7, true),
        outcome(id, "MSFT", "rsi", 0.95, true),
        outcome(id, "TSLA", "rsi", 0.0, false),
        outcome(id, "NVDA", "rsi", 0.8, true),
        outcome(id, "AMZN", "rsi", 0.75, true),
    ];
    let summary = BatchSummary::from_outcomes(id, Utc::now(), CompletionStatus::Complete, 5, results);

    let rsi = analyze(&summary).best_strategy.unwrap();
    assert_eq!(rsi.average_confidence, 0.8);
    assert_eq!(rsi.performance_grade, PerformanceGrade::A);
    let top: Vec<&str> = rsi.top_symbols.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(top, vec!["MSFT", "NVDA", "AMZN"]);
}

#[test]
fn top_symbols_skip_failures_and_respect_limit() {
    let id = BatchId::new();
    let results = [
        outcome(id, "AAPL", "macd", 0.0, false),
        outcome(id, "MSFT", "macd", 0.4, true),
        outcome(id, "TSLA", "macd", 0.4, true),
    ];
    let refs: Vec<&TaskOutcome> = results.iter().collect();

    let top = top_symbols(&refs, 1);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].symbol, "MSFT");
    assert_eq!(top[0].signal, Signal::Buy);
    assert!(top_symbols(&refs[..1], 3).is_empty());
}

#[test]
fn analysis_serializes_grade_label() {
    let id = BatchId::new();
    let results = vec![outcome(id, "AAPL", "ema_cross", 0.92, true)];
    let summary = BatchSummary::from_outcomes(id, Utc::now(), CompletionStatus::Complete, 1, results);

    let json = serde_json::to_value(analyze(&summary)).unwrap();
    assert_eq!(json["best_strategy"]["performance_grade"], "A+");
    assert_eq!(json["best_strategy"]["top_symbols"][0]["symbol"], "AAPL");
}
