//! Stockscan: scheduled fan-out/fan-in strategy analysis.
//!
//! A batch expands a symbol × strategy universe into independent task units, workers evaluate
//! them in parallel, and the coordinator folds the outcomes back into one durable batch summary
//! that is announced exactly once.

pub mod batch;
pub mod common;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod indicators;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod services;
pub mod strategies;
