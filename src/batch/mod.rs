//! Batch fan-out/fan-in engine: dispatch, execution, aggregation and publication

pub mod aggregator;
pub mod analysis;
pub mod coordinator;
pub mod dispatcher;
pub mod executor;
pub mod publisher;

pub use aggregator::{
    Aggregator, AggregatorConfig, BatchPlan, BatchState, CompletedBatch, DiscardReason,
    Disposition, SweepReport,
};
pub use analysis::{
    analyze, top_symbols, BatchAnalysis, PerformanceGrade, StrategyAnalysis, SymbolScore,
};
pub use coordinator::{Coordinator, WatchdogReport};
pub use dispatcher::Dispatcher;
pub use executor::TaskExecutor;
pub use publisher::{CompletionPublisher, PublishReport};

use backon::ExponentialBuilder;
use std::time::Duration;

/// Exponential backoff used for queue, store and broadcast calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_times: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            max_times: 3,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts; for tests
    pub fn immediate(max_times: usize) -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_times,
        }
    }

    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_times)
    }
}
