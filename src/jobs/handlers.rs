//! Apalis job handlers

use crate::batch::coordinator::Coordinator;
use crate::error::AggregateError;
use crate::jobs::context::WorkerContext;
use crate::models::batch::{TaskOutcome, TaskUnit};
use apalis::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Execute one task unit and report its outcome.
///
/// Strategy failures are already folded into the outcome; only a failed report is an error,
/// which lets the queue redeliver the unit.
pub async fn handle_execute_task(
    unit: TaskUnit,
    ctx: Data<Arc<WorkerContext>>,
) -> Result<(), HandlerError> {
    debug!(
        batch_id = %unit.batch_id,
        symbol = %unit.symbol,
        strategy_id = %unit.strategy_id,
        "TaskUnit: executing {}/{}",
        unit.sequence,
        unit.total
    );

    let outcome = ctx.executor.execute(&unit).await;
    ctx.outcomes
        .report(outcome)
        .await
        .map_err(|e| Box::new(e) as HandlerError)?;
    Ok(())
}

/// Fold one outcome into its batch on the coordinator side
pub async fn handle_task_outcome(
    outcome: TaskOutcome,
    coordinator: Data<Arc<Coordinator>>,
) -> Result<(), HandlerError> {
    apply_outcome(&coordinator, outcome).await;
    Ok(())
}

/// Rejected outcomes are logged and acknowledged; redelivering them cannot change the result
pub(crate) async fn apply_outcome(coordinator: &Coordinator, outcome: TaskOutcome) {
    let batch_id = outcome.batch_id;
    match coordinator.on_outcome(outcome).await {
        Ok(_) => {}
        Err(e @ AggregateError::UnknownPair { .. }) => {
            warn!(batch_id = %batch_id, error = %e, "Outcome rejected")
        }
        Err(e) => warn!(batch_id = %batch_id, error = %e, "Outcome dropped"),
    }
}
