//! Shared data models spanning the pipeline layers.

pub mod batch;
pub mod indicators;
pub mod strategy;

pub use batch::{
    BatchEvent, BatchId, BatchSummary, CompletionStatus, OutcomeKey, OutcomeStatus, Signal,
    SummaryCounts, SymbolResults, TaskOutcome, TaskUnit,
};
pub use indicators::Candle;
pub use strategy::StrategySignal;
