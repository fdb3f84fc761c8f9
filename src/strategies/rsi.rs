//! RSI oversold/overbought strategy

use crate::error::StrategyError;
use crate::indicators::{calculate_ema, calculate_rsi};
use crate::models::batch::Signal;
use crate::models::strategy::StrategySignal;
use crate::services::market_data::MarketDataProvider;
use crate::strategies::{indicator_missing, load_candles, round_price, score_to_confidence, Strategy};
use async_trait::async_trait;
use std::sync::Arc;

const RSI_PERIOD: u32 = 14;
const OVERSOLD: f64 = 30.0;
const OVERBOUGHT: f64 = 70.0;

pub struct RsiStrategy {
    provider: Arc<dyn MarketDataProvider>,
}

impl RsiStrategy {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Strategy for RsiStrategy {
    fn id(&self) -> &str {
        "rsi"
    }

    fn name(&self) -> &str {
        "RSI Oversold/Overbought Strategy"
    }

    async fn execute(&self, symbol: &str) -> Result<StrategySignal, StrategyError> {
        let candles = load_candles(self.provider.as_ref(), symbol, 20).await?;
        let rsi = calculate_rsi(&candles, RSI_PERIOD)
            .ok_or_else(|| indicator_missing("RSI"))?
            .value;
        let ema9 = calculate_ema(&candles, 9).ok_or_else(|| indicator_missing("EMA9"))?.value;
        let ema15 = calculate_ema(&candles, 15).ok_or_else(|| indicator_missing("EMA15"))?.value;

        let latest = &candles[candles.len() - 1];
        let previous = &candles[candles.len() - 2];

        let signal = if rsi < OVERSOLD && latest.close > previous.low {
            Signal::Buy
        } else if rsi > OVERBOUGHT && latest.close < previous.high {
            Signal::Sell
        } else {
            Signal::Hold
        };

        let score = match signal {
            Signal::Buy => {
                let depth = (OVERSOLD - rsi) / OVERSOLD * 60.0;
                let trend = if ema9 > ema15 { 20.0 } else { 10.0 };
                let candle = if latest.is_green() { 15.0 } else { 5.0 };
                depth + trend + candle
            }
            Signal::Sell => {
                let depth = (rsi - OVERBOUGHT) / (100.0 - OVERBOUGHT) * 60.0;
                let trend = if ema9 < ema15 { 20.0 } else { 10.0 };
                let candle = if latest.is_green() { 5.0 } else { 15.0 };
                depth + trend + candle
            }
            Signal::Hold => 0.0,
        };

        Ok(
            StrategySignal::new(signal, score_to_confidence(score), round_price(latest.close))
                .with_indicator("rsi", rsi)
                .with_indicator("ema_9", ema9)
                .with_indicator("ema_15", ema15),
        )
    }
}
