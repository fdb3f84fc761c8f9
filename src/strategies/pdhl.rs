//! Previous-day high/low breakout strategy

use crate::common::math;
use crate::error::StrategyError;
use crate::models::batch::Signal;
use crate::models::indicators::Candle;
use crate::models::strategy::StrategySignal;
use crate::services::market_data::MarketDataProvider;
use crate::strategies::{indicator_missing, load_candles, round_price, score_to_confidence, Strategy};
use async_trait::async_trait;
use std::sync::Arc;

const VOLUME_WINDOW: usize = 20;
const VOLUME_SURGE: f64 = 1.2;

pub struct PdhlStrategy {
    provider: Arc<dyn MarketDataProvider>,
}

impl PdhlStrategy {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

/// High and low of the most recent UTC day before the latest candle's day
pub fn previous_day_range(candles: &[Candle]) -> Option<(f64, f64)> {
    let today = candles.last()?.timestamp.date_naive();
    let previous = candles
        .iter()
        .rev()
        .map(|c| c.timestamp.date_naive())
        .find(|day| *day < today)?;

    candles
        .iter()
        .filter(|c| c.timestamp.date_naive() == previous)
        .fold(None, |range, c| match range {
            None => Some((c.high, c.low)),
            Some((high, low)) => Some((f64::max(high, c.high), f64::min(low, c.low))),
        })
}

#[async_trait]
impl Strategy for PdhlStrategy {
    fn id(&self) -> &str {
        "pdhl"
    }

    fn name(&self) -> &str {
        "Previous Day HL Strategy"
    }

    async fn execute(&self, symbol: &str) -> Result<StrategySignal, StrategyError> {
        let candles = load_candles(self.provider.as_ref(), symbol, 2).await?;
        let (day_high, day_low) =
            previous_day_range(&candles).ok_or_else(|| indicator_missing("previous day range"))?;

        let latest = &candles[candles.len() - 1];
        let prev_close = candles[candles.len() - 2].close;

        // reclaim of the low from below, rejection of the high from above
        let signal = if prev_close < day_low && latest.close > day_low {
            Signal::Buy
        } else if prev_close > day_high && latest.close < day_high {
            Signal::Sell
        } else {
            Signal::Hold
        };

        let score = match signal {
            Signal::Hold => 0.0,
            _ => {
                let strength = match signal {
                    Signal::Buy => (latest.close - day_low) / day_low,
                    _ => (day_high - latest.close) / day_high,
                };
                let candle_ok = (signal == Signal::Buy) == latest.is_green();
                let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
                let surge = math::sma(&volumes, VOLUME_WINDOW.min(volumes.len()))
                    .map(|avg| latest.volume > avg * VOLUME_SURGE)
                    .unwrap_or(false);
                40.0 + (strength * 5000.0).min(30.0)
                    + if candle_ok { 15.0 } else { 0.0 }
                    + if surge { 15.0 } else { 0.0 }
            }
        };

        Ok(
            StrategySignal::new(signal, score_to_confidence(score), round_price(latest.close))
                .with_indicator("prev_day_high", day_high)
                .with_indicator("prev_day_low", day_low),
        )
    }
}
