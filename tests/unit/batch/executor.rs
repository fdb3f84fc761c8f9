//! Unit tests for task execution: every failure mode becomes a FAILED outcome

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use stockscan::batch::TaskExecutor;
use stockscan::metrics::Metrics;
use stockscan::models::batch::{BatchId, OutcomeStatus, Signal, TaskUnit};

use crate::support::{registry_of, Behaviour, ScriptedStrategy};

fn unit(symbol: &str, strategy: &str) -> TaskUnit {
    TaskUnit {
        batch_id: BatchId::new(),
        symbol: symbol.to_string(),
        strategy_id: strategy.to_string(),
        submitted_at: Utc::now(),
        sequence: 1,
        total: 1,
    }
}

fn executor(behaviour: Behaviour, timeout: Duration) -> TaskExecutor {
    let registry = registry_of(vec![ScriptedStrategy::new("scripted", behaviour)]);
    TaskExecutor::new(Arc::new(registry), timeout)
}

#[tokio::test]
async fn successful_strategy_yields_ok_outcome() {
    let metrics = Arc::new(Metrics::new().unwrap());
    let exec = executor(Behaviour::Signal(Signal::Buy, 0.8), Duration::from_secs(1))
        .with_metrics(metrics.clone());

    let task = unit("BTCUSD", "scripted");
    let outcome = exec.execute(&task).await;
    assert_eq!(outcome.status, OutcomeStatus::Ok);
    assert_eq!(outcome.signal, Signal::Buy);
    assert_eq!(outcome.confidence, 0.8);
    assert_eq!(outcome.batch_id, task.batch_id);
    assert!(outcome.error_detail.is_none());
    assert_eq!(outcome.indicators.get("rsi"), Some(&42.0));
    assert_eq!(metrics.task_duration_seconds.get_sample_count(), 1);
}

#[tokio::test]
async fn unknown_strategy_fails() {
    let exec = executor(Behaviour::Signal(Signal::Buy, 0.8), Duration::from_secs(1));
    let outcome = exec.execute(&unit("BTCUSD", "does_not_exist")).await;
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome
        .error_detail
        .as_deref()
        .unwrap()
        .contains("unknown strategy"));
}

#[tokio::test]
async fn strategy_error_fails_with_detail() {
    let exec = executor(
        Behaviour::Fail("not enough candles".into()),
        Duration::from_secs(1),
    );
    let outcome = exec.execute(&unit("X", "scripted")).await;
    assert!(outcome.is_failed());
    assert!(outcome
        .error_detail
        .as_deref()
        .unwrap()
        .contains("not enough candles"));
}

#[tokio::test]
async fn panicking_strategy_fails_without_unwinding() {
    let exec = executor(Behaviour::Panic, Duration::from_secs(1));
    let outcome = exec.execute(&unit("X", "scripted")).await;
    assert!(outcome.is_failed());
    let detail = outcome.error_detail.unwrap();
    assert!(detail.contains("panicked"));
    assert!(detail.contains("scripted panic for X"));
}

#[tokio::test]
async fn slow_strategy_times_out() {
    let exec = executor(
        Behaviour::Sleep(Duration::from_secs(30)),
        Duration::from_millis(50),
    );
    let outcome = exec.execute(&unit("X", "scripted")).await;
    assert!(outcome.is_failed());
    assert!(outcome.error_detail.unwrap().contains("timed out"));
}

#[tokio::test]
async fn nan_confidence_fails() {
    let exec = executor(Behaviour::Confidence(f64::NAN), Duration::from_secs(1));
    let outcome = exec.execute(&unit("X", "scripted")).await;
    assert!(outcome.is_failed());
    assert_eq!(outcome.confidence, 0.0);
}

#[tokio::test]
async fn out_of_range_confidence_is_clamped() {
    let exec = executor(Behaviour::Confidence(1.5), Duration::from_secs(1));
    let outcome = exec.execute(&unit("X", "scripted")).await;
    assert_eq!(outcome.status, OutcomeStatus::Ok);
    assert_eq!(outcome.confidence, 1.0);

    let exec = executor(Behaviour::Confidence(-0.2), Duration::from_secs(1));
    let outcome = exec.execute(&unit("X", "scripted")).await;
    assert_eq!(outcome.confidence, 0.0);
}
