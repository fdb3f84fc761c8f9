//! Task and outcome transport between the coordinator and workers

pub mod context;
pub mod handlers;
pub mod local;
pub mod queue;

pub use context::WorkerContext;
pub use local::{spawn_outcome_consumer, LocalOutcomeSink, LocalTaskQueue, LocalWorkerPool};
pub use queue::{OutcomeSink, RedisOutcomeSink, RedisTaskQueue, TaskQueue};
