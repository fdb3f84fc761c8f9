//! Static strategy registry

use crate::services::market_data::MarketDataProvider;
use crate::strategies::{
    BollingerStrategy, EmaCrossStrategy, MacdStrategy, MotherCandleStrategy, PdhlStrategy,
    RsiStrategy, Strategy, VolumeBreakoutStrategy,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maps a strategy id to its implementation
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in strategy wired to `provider`
    pub fn with_defaults(provider: Arc<dyn MarketDataProvider>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EmaCrossStrategy::new(provider.clone())));
        registry.register(Arc::new(RsiStrategy::new(provider.clone())));
        registry.register(Arc::new(BollingerStrategy::new(provider.clone())));
        registry.register(Arc::new(MacdStrategy::new(provider.clone())));
        registry.register(Arc::new(VolumeBreakoutStrategy::new(provider.clone())));
        registry.register(Arc::new(PdhlStrategy::new(provider.clone())));
        registry.register(Arc::new(MotherCandleStrategy::new(provider)));
        registry
    }

    /// Register (or replace) a strategy under its own id
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.insert(strategy.id().to_string(), strategy);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.strategies.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
