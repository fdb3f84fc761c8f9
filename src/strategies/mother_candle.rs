//! Mother candle (inside bar / outside bar) breakout strategy

use crate::common::math;
use crate::error::StrategyError;
use crate::indicators::calculate_ema;
use crate::models::batch::Signal;
use crate::models::indicators::Candle;
use crate::models::strategy::StrategySignal;
use crate::services::market_data::MarketDataProvider;
use crate::strategies::{indicator_missing, load_candles, round_price, score_to_confidence, Strategy};
use async_trait::async_trait;
use std::sync::Arc;

const EMA_PERIOD: u32 = 300;
/// Percent distance from the EMA an outside-bar breakout must fade
const EMA_STRETCH: f64 = 1.0;
const VOLUME_WINDOW: usize = 20;

pub struct MotherCandleStrategy {
    provider: Arc<dyn MarketDataProvider>,
}

impl MotherCandleStrategy {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

fn contains(outer: &Candle, inner: &Candle) -> bool {
    outer.high > inner.high && outer.low < inner.low
}

#[async_trait]
impl Strategy for MotherCandleStrategy {
    fn id(&self) -> &str {
        "mother_candle"
    }

    fn name(&self) -> &str {
        "Mother Candle Strategy"
    }

    async fn execute(&self, symbol: &str) -> Result<StrategySignal, StrategyError> {
        let candles = load_candles(self.provider.as_ref(), symbol, EMA_PERIOD as usize).await?;
        let ema = calculate_ema(&candles, EMA_PERIOD)
            .map(|e| e.value)
            .filter(|v| *v > 0.0)
            .ok_or_else(|| indicator_missing("EMA300"))?;

        let n = candles.len();
        let (mother, child, latest) = (&candles[n - 3], &candles[n - 2], &candles[n - 1]);
        let price_to_ema = (latest.close - ema) / ema * 100.0;

        let inside_bar = contains(mother, child);
        let outside_bar = contains(child, mother);
        let breaks_up = latest.close > mother.high;
        let breaks_down = latest.close < mother.low;

        let buy = breaks_up && (inside_bar || (outside_bar && price_to_ema <= -EMA_STRETCH));
        let sell = breaks_down && (inside_bar || (outside_bar && price_to_ema >= EMA_STRETCH));
        let signal = if buy {
            Signal::Buy
        } else if sell {
            Signal::Sell
        } else {
            Signal::Hold
        };

        let score = if signal == Signal::Hold {
            0.0
        } else {
            let ema_side = match signal {
                Signal::Buy => price_to_ema < 0.0,
                _ => price_to_ema > 0.0,
            };
            let ema_score = if ema_side {
                (price_to_ema.abs() * 5.0).min(30.0)
            } else {
                0.0
            };
            let candle_ok = (signal == Signal::Buy) == latest.is_green();
            let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
            let volume_ok = math::sma(&volumes, VOLUME_WINDOW)
                .map(|avg| latest.volume > avg)
                .unwrap_or(false);
            30.0 + ema_score
                + if candle_ok { 20.0 } else { 0.0 }
                + if volume_ok { 20.0 } else { 0.0 }
        };

        Ok(
            StrategySignal::new(signal, score_to_confidence(score), round_price(latest.close))
                .with_indicator("ema_300", ema)
                .with_indicator("price_to_ema", price_to_ema),
        )
    }
}
