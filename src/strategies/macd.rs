//! MACD signal-line crossover strategy

use crate::error::StrategyError;
use crate::indicators::{calculate_ema, calculate_macd_series, calculate_rsi};
use crate::models::batch::Signal;
use crate::models::strategy::StrategySignal;
use crate::services::market_data::MarketDataProvider;
use crate::strategies::{indicator_missing, load_candles, round_price, score_to_confidence, Strategy};
use async_trait::async_trait;
use std::sync::Arc;

pub struct MacdStrategy {
    provider: Arc<dyn MarketDataProvider>,
}

impl MacdStrategy {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Strategy for MacdStrategy {
    fn id(&self) -> &str {
        "macd"
    }

    fn name(&self) -> &str {
        "MACD Convergence Divergence Strategy"
    }

    async fn execute(&self, symbol: &str) -> Result<StrategySignal, StrategyError> {
        let candles = load_candles(self.provider.as_ref(), symbol, 36).await?;
        let series =
            calculate_macd_series(&candles, 12, 26, 9).ok_or_else(|| indicator_missing("MACD"))?;
        let (previous, current) = match series.as_slice() {
            [.., previous, current] => (previous, current),
            _ => return Err(indicator_missing("MACD")),
        };
        let rsi = calculate_rsi(&candles, 14)
            .ok_or_else(|| indicator_missing("RSI"))?
            .value;
        let ema9 = calculate_ema(&candles, 9).ok_or_else(|| indicator_missing("EMA9"))?.value;
        let latest = &candles[candles.len() - 1];

        let bullish_cross = previous.macd <= previous.signal && current.macd > current.signal;
        let bearish_cross = previous.macd >= previous.signal && current.macd < current.signal;
        let rising = current.histogram > previous.histogram;

        let signal = if bullish_cross && current.macd < 0.0 && rising && rsi < 70.0 && latest.close > ema9 {
            Signal::Buy
        } else if bearish_cross && current.macd > 0.0 && !rising && rsi > 30.0 && latest.close < ema9 {
            Signal::Sell
        } else {
            Signal::Hold
        };

        let score = if signal == Signal::Hold {
            0.0
        } else {
            let strength = ((current.macd - current.signal).abs() / latest.close * 10_000.0).min(30.0);
            let momentum = (current.histogram - previous.histogram).abs() / latest.close * 10_000.0;
            let rsi_room = match signal {
                Signal::Buy => rsi < 60.0,
                _ => rsi > 40.0,
            };
            strength + momentum.min(20.0) + if rsi_room { 15.0 } else { 5.0 } + 15.0
        };

        Ok(
            StrategySignal::new(signal, score_to_confidence(score), round_price(latest.close))
                .with_indicator("macd", current.macd)
                .with_indicator("macd_signal", current.signal)
                .with_indicator("macd_histogram", current.histogram)
                .with_indicator("rsi", rsi),
        )
    }
}
