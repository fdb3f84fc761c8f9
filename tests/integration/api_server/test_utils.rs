//! Test utilities for API server integration tests

use axum_test::TestServer;
use stockscan::config::Universe;
use stockscan::core::http::{create_router, AppState};
use stockscan::models::batch::Signal;

use crate::pipeline::test_utils::LocalPipeline;
use crate::support::{registry_of, strings, Behaviour, ScriptedStrategy};

/// HTTP router over a live in-process pipeline
pub struct TestApiServer {
    pub server: TestServer,
    pub pipeline: LocalPipeline,
}

impl TestApiServer {
    pub async fn new() -> Self {
        let registry = registry_of(vec![
            ScriptedStrategy::new("rsi", Behaviour::Signal(Signal::Buy, 0.8)),
            ScriptedStrategy::new("macd", Behaviour::Signal(Signal::Sell, 0.4)),
        ]);
        let pipeline = LocalPipeline::builder(registry).start();

        let universe = Universe {
            symbols: strings(&["BTCUSD", "ETHUSD"]),
            strategies: strings(&["rsi", "macd"]),
        };
        let state = AppState::new(
            pipeline.metrics.clone(),
            pipeline.store.clone(),
            pipeline.dispatcher.clone(),
            universe,
        );

        let server = TestServer::new(create_router(state)).expect("start test server");
        Self { server, pipeline }
    }
}
