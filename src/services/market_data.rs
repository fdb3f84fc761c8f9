//! Market data provider interface. Only strategy execution talks to it.

use crate::error::MarketDataError;
use crate::models::indicators::Candle;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Most recent `limit` candles for a symbol, oldest first
    async fn get_candles(&self, symbol: &str, limit: usize)
        -> Result<Vec<Candle>, MarketDataError>;
}

/// Fixed candle sets keyed by symbol; used by local runs and tests
#[derive(Default)]
pub struct InMemoryMarketData {
    candles: RwLock<HashMap<String, Vec<Candle>>>,
}

impl InMemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, symbol: &str, candles: Vec<Candle>) {
        self.candles
            .write()
            .await
            .insert(symbol.to_string(), candles);
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryMarketData {
    async fn get_candles(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let candles = self.candles.read().await;
        let series = candles
            .get(symbol)
            .filter(|series| !series.is_empty())
            .ok_or_else(|| MarketDataError::Empty {
                symbol: symbol.to_string(),
            })?;
        let start = series.len().saturating_sub(limit);
        Ok(series[start..].to_vec())
    }
}
