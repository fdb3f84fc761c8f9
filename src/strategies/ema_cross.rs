//! EMA 9/15 crossover strategy

use crate::common::math;
use crate::error::StrategyError;
use crate::indicators::{calculate_rsi, last_two_emas};
use crate::models::batch::Signal;
use crate::models::strategy::StrategySignal;
use crate::services::market_data::MarketDataProvider;
use crate::strategies::{indicator_missing, load_candles, round_price, score_to_confidence, Strategy};
use async_trait::async_trait;
use std::sync::Arc;

const FAST: u32 = 9;
const SLOW: u32 = 15;
const VOLUME_WINDOW: usize = 10;

pub struct EmaCrossStrategy {
    provider: Arc<dyn MarketDataProvider>,
}

impl EmaCrossStrategy {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Strategy for EmaCrossStrategy {
    fn id(&self) -> &str {
        "ema_cross"
    }

    fn name(&self) -> &str {
        "EMA Crossover Strategy"
    }

    async fn execute(&self, symbol: &str) -> Result<StrategySignal, StrategyError> {
        let candles = load_candles(self.provider.as_ref(), symbol, SLOW as usize + 2).await?;
        let (fast_prev, fast) = last_two_emas(&candles, FAST).ok_or_else(|| indicator_missing("EMA9"))?;
        let (slow_prev, slow) = last_two_emas(&candles, SLOW).ok_or_else(|| indicator_missing("EMA15"))?;
        let rsi = calculate_rsi(&candles, 14).map(|r| r.value);

        let latest = &candles[candles.len() - 1];
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
        let volume_ok = math::sma(&volumes, VOLUME_WINDOW)
            .map(|avg| latest.volume > avg)
            .unwrap_or(true);

        let golden = fast_prev <= slow_prev && fast > slow;
        let death = fast_prev >= slow_prev && fast < slow;

        let signal = if golden && latest.close > fast && volume_ok {
            Signal::Buy
        } else if death && latest.close < fast && volume_ok {
            Signal::Sell
        } else {
            Signal::Hold
        };

        let score = if signal == Signal::Hold {
            0.0
        } else {
            let separation = ((fast - slow).abs() / latest.close * 1000.0).min(40.0);
            let rsi_ok = rsi.map(|r| r > 30.0 && r < 70.0).unwrap_or(false);
            let aligned = match signal {
                Signal::Buy => latest.close > fast && fast > slow,
                _ => latest.close < fast && fast < slow,
            };
            let candle_ok = (signal == Signal::Buy) == latest.is_green();
            separation
                + if rsi_ok { 20.0 } else { 0.0 }
                + if aligned { 25.0 } else { 0.0 }
                + if candle_ok { 15.0 } else { 0.0 }
        };

        let mut result =
            StrategySignal::new(signal, score_to_confidence(score), round_price(latest.close))
                .with_indicator("ema_9", fast)
                .with_indicator("ema_15", slow);
        if let Some(rsi) = rsi {
            result = result.with_indicator("rsi", rsi);
        }
        Ok(result)
    }
}
