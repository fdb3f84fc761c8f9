//! Runs one task unit to exactly one outcome

use crate::metrics::Metrics;
use crate::models::batch::{TaskOutcome, TaskUnit};
use crate::strategies::StrategyRegistry;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;
use tracing::{debug, warn};

/// Strategy failures of every kind (unknown id, error, panic, timeout, invalid output)
/// come back as FAILED outcomes. Nothing escapes `execute`.
#[derive(Clone)]
pub struct TaskExecutor {
    registry: Arc<StrategyRegistry>,
    timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl TaskExecutor {
    pub fn new(registry: Arc<StrategyRegistry>, timeout: Duration) -> Self {
        Self {
            registry,
            timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub async fn execute(&self, unit: &TaskUnit) -> TaskOutcome {
        let started = Instant::now();
        let outcome = self.run(unit, started).await;

        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.task_duration_seconds.observe(elapsed.as_secs_f64());
        }

        match &outcome.error_detail {
            Some(detail) => warn!(
                batch_id = %unit.batch_id,
                symbol = %unit.symbol,
                strategy_id = %unit.strategy_id,
                task = format!("{}/{}", unit.sequence, unit.total),
                error = %detail,
                "Task failed"
            ),
            None => debug!(
                batch_id = %unit.batch_id,
                symbol = %unit.symbol,
                strategy_id = %unit.strategy_id,
                task = format!("{}/{}", unit.sequence, unit.total),
                signal = ?outcome.signal,
                confidence = outcome.confidence,
                elapsed_ms = outcome.execution_ms,
                "Task complete"
            ),
        }
        outcome
    }

    async fn run(&self, unit: &TaskUnit, started: Instant) -> TaskOutcome {
        let elapsed_ms = || started.elapsed().as_millis() as u64;

        let Some(strategy) = self.registry.get(&unit.strategy_id) else {
            return TaskOutcome::failed(
                unit,
                format!("unknown strategy: {}", unit.strategy_id),
                elapsed_ms(),
            );
        };

        let symbol = unit.symbol.clone();
        let mut handle = tokio::spawn(async move { strategy.execute(&symbol).await });

        let joined = match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return TaskOutcome::failed(
                    unit,
                    format!("strategy timed out after {}s", self.timeout.as_secs_f64()),
                    elapsed_ms(),
                );
            }
        };

        match joined {
            Ok(Ok(signal)) if !signal.confidence.is_finite() => TaskOutcome::failed(
                unit,
                format!("strategy returned non-finite confidence: {}", signal.confidence),
                elapsed_ms(),
            ),
            Ok(Ok(signal)) if !signal.reference_price.is_finite() => TaskOutcome::failed(
                unit,
                format!("strategy returned non-finite price: {}", signal.reference_price),
                elapsed_ms(),
            ),
            Ok(Ok(signal)) => TaskOutcome::ok(unit, signal, elapsed_ms()),
            Ok(Err(e)) => TaskOutcome::failed(unit, e.to_string(), elapsed_ms()),
            Err(e) => TaskOutcome::failed(unit, join_failure(e), elapsed_ms()),
        }
    }
}

fn join_failure(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("strategy task cancelled: {err}");
    }
    format!("strategy panicked: {}", panic_message(err.into_panic()))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return s.to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "unknown panic payload".to_string()
}
