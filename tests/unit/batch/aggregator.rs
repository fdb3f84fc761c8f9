//! Unit tests for outcome aggregation under a multi-threaded runtime

use std::collections::HashSet;
use std::sync::Arc;
use stockscan::batch::{
    Aggregator, AggregatorConfig, BatchPlan, CompletionPublisher, Coordinator, Disposition,
};
use stockscan::db::{BatchStore, MemoryBatchStore, PublicationState};
use stockscan::metrics::Metrics;
use stockscan::models::batch::{Signal, TaskOutcome, TaskUnit};
use stockscan::models::strategy::StrategySignal;

use crate::support::{strings, CountingNotifier};

const ITERATIONS: usize = 200;

fn plan(symbols: usize) -> BatchPlan {
    let symbols = (0..symbols).map(|i| format!("SYM{:02}", i)).collect();
    BatchPlan::new(symbols, strings(&["rsi", "macd"]))
}

fn outcomes(plan: &BatchPlan) -> Vec<TaskOutcome> {
    let total = plan.expected();
    plan.keys()
        .enumerate()
        .map(|(i, key)| {
            let unit = TaskUnit {
                batch_id: plan.batch_id,
                symbol: key.symbol,
                strategy_id: key.strategy_id,
                submitted_at: plan.submitted_at,
                sequence: i + 1,
                total,
            };
            TaskOutcome::ok(&unit, StrategySignal::new(Signal::Buy, 0.6, 100.0), 3)
        })
        .collect()
}

#[derive(Default)]
struct Tally {
    accepted: usize,
    completed: Vec<usize>,
    dropped: usize,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn redelivered_outcomes_complete_exactly_once() {
    for _ in 0..ITERATIONS {
        let aggregator = Arc::new(Aggregator::new(AggregatorConfig::default()));
        let plan = plan(20);
        let expected = plan.expected();
        let batch_id = plan.batch_id;
        let outcomes = outcomes(&plan);
        assert!(aggregator.register(plan).await.unwrap().is_none());

        let mut handles = Vec::new();
        for outcome in outcomes.iter().chain(outcomes.iter()) {
            let aggregator = aggregator.clone();
            let outcome = outcome.clone();
            handles.push(tokio::spawn(async move {
                aggregator.on_outcome(outcome).await
            }));
        }

        let mut tally = Tally::default();
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Disposition::Accepted { .. } => tally.accepted += 1,
                Disposition::Completed(batch) => {
                    let keys: HashSet<_> = batch.outcomes.iter().map(|o| o.key()).collect();
                    assert_eq!(keys.len(), batch.outcomes.len());
                    tally.completed.push(batch.outcomes.len());
                }
                Disposition::Duplicate | Disposition::Discarded(_) => tally.dropped += 1,
                Disposition::Buffered => panic!("registered batch buffered an outcome"),
            }
        }

        assert_eq!(tally.completed, vec![expected]);
        assert_eq!(tally.accepted, expected - 1);
        assert_eq!(tally.dropped, expected);
        assert!(aggregator.is_complete(batch_id).await);
        assert_eq!(aggregator.in_flight().await, 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn redelivered_outcomes_publish_once() {
    for _ in 0..ITERATIONS / 4 {
        let store = Arc::new(MemoryBatchStore::new());
        let notifier = Arc::new(CountingNotifier::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let coordinator = Arc::new(Coordinator::new(
            Arc::new(Aggregator::new(AggregatorConfig::default())),
            Arc::new(CompletionPublisher::new(store.clone(), notifier.clone())),
            metrics.clone(),
        ));

        let plan = plan(20);
        let expected = plan.expected();
        let batch_id = plan.batch_id;
        let outcomes = outcomes(&plan);
        coordinator.register(plan).await.unwrap();

        let mut handles = Vec::new();
        for outcome in outcomes.iter().chain(outcomes.iter()) {
            let coordinator = coordinator.clone();
            let outcome = outcome.clone();
            handles.push(tokio::spawn(async move {
                coordinator.on_outcome(outcome).await
            }));
        }
        let completed = futures_util::future::join_all(handles)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(Disposition::Completed(_)))))
            .count();

        assert_eq!(completed, 1);
        assert_eq!(notifier.count(), 1);
        assert_eq!(store.len().await, 1);
        let stored = store.get(batch_id).await.unwrap().unwrap();
        assert_eq!(stored.total_results, expected);
        assert_eq!(
            store.publication_state(batch_id).await.unwrap(),
            Some(PublicationState::Published)
        );
        assert_eq!(metrics.batches_completed_total.get(), 1);
    }
}
