//! Unit tests for batch dispatch

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use stockscan::batch::{
    Aggregator, AggregatorConfig, BatchState, CompletionPublisher, Coordinator, Dispatcher,
    RetryPolicy,
};
use stockscan::db::MemoryBatchStore;
use stockscan::error::DispatchError;
use stockscan::metrics::Metrics;
use tokio_test::{assert_err, assert_ok};

use crate::support::{strings, CountingNotifier, RecordingQueue};

fn coordinator() -> Arc<Coordinator> {
    let metrics = Arc::new(Metrics::new().unwrap());
    let publisher = CompletionPublisher::new(
        Arc::new(MemoryBatchStore::new()),
        Arc::new(CountingNotifier::new()),
    );
    Arc::new(Coordinator::new(
        Arc::new(Aggregator::new(AggregatorConfig::default())),
        Arc::new(publisher),
        metrics,
    ))
}

#[tokio::test]
async fn submit_registers_then_enqueues_every_pair() {
    let coordinator = coordinator();
    let queue = Arc::new(RecordingQueue::default());
    let dispatcher = Dispatcher::new(coordinator.clone(), queue.clone());

    let batch_id = assert_ok!(
        dispatcher
            .submit_batch(
                &strings(&["AAPL", "MSFT", "AAPL"]),
                &strings(&["rsi", "macd", "rsi"])
            )
            .await
    );

    let units = queue.units.lock().await;
    assert_eq!(units.len(), 4);
    assert!(units.iter().all(|u| u.batch_id == batch_id && u.total == 4));
    let sequences: HashSet<usize> = units.iter().map(|u| u.sequence).collect();
    assert_eq!(sequences, (1..=4).collect());
    assert_eq!(
        coordinator.aggregator().progress(batch_id).await,
        Some((0, 4))
    );
    assert_eq!(coordinator.metrics().batches_submitted_total.get(), 1);
}

#[tokio::test]
async fn each_submission_gets_a_fresh_batch_id() {
    let dispatcher = Dispatcher::new(coordinator(), Arc::new(RecordingQueue::default()));
    let symbols = strings(&["AAPL"]);
    let strategies = strings(&["rsi"]);
    let a = dispatcher.submit_batch(&symbols, &strategies).await.unwrap();
    let b = dispatcher.submit_batch(&symbols, &strategies).await.unwrap();
    assert_ne!(a, b);
}

#[tokio::test]
async fn empty_universe_is_rejected() {
    let queue = Arc::new(RecordingQueue::default());
    let dispatcher = Dispatcher::new(coordinator(), queue.clone());

    let err = assert_err!(dispatcher.submit_batch(&[], &strings(&["rsi"])).await);
    assert!(matches!(err, DispatchError::EmptyUniverse));
    let err = assert_err!(dispatcher.submit_batch(&strings(&["AAPL", " "]), &strings(&[""])).await);
    assert!(matches!(err, DispatchError::EmptyUniverse));
    assert_eq!(queue.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn exhausted_enqueue_retries_abort_the_batch() {
    let coordinator = coordinator();
    let queue = Arc::new(RecordingQueue::failing());
    let dispatcher =
        Dispatcher::new(coordinator.clone(), queue.clone()).with_retry(RetryPolicy::immediate(2));

    let err = dispatcher
        .submit_batch(&strings(&["AAPL"]), &strings(&["rsi"]))
        .await
        .unwrap_err();

    let DispatchError::Enqueue { batch_id, symbol, .. } = err else {
        panic!("expected enqueue error, got {err:?}");
    };
    assert_eq!(symbol, "AAPL");
    // first attempt plus two retries
    assert_eq!(queue.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(
        coordinator.aggregator().state(batch_id).await,
        Some(BatchState::Aborted)
    );
    assert_eq!(coordinator.metrics().batches_aborted_total.get(), 1);
}
