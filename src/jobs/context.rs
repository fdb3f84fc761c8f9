//! Job context for dependency injection

use crate::batch::executor::TaskExecutor;
use crate::jobs::queue::OutcomeSink;
use std::sync::Arc;

/// Passed to task handlers via the Apalis `Data<T>` pattern.
///
/// Workers only execute strategies and report back; they never touch batch state.
pub struct WorkerContext {
    pub executor: TaskExecutor,
    pub outcomes: Arc<dyn OutcomeSink>,
}

impl WorkerContext {
    pub fn new(executor: TaskExecutor, outcomes: Arc<dyn OutcomeSink>) -> Self {
        Self { executor, outcomes }
    }
}
