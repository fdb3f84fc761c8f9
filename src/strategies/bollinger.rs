//! Bollinger band touch strategy

use crate::error::StrategyError;
use crate::indicators::{calculate_bollinger_bands_default, calculate_ema};
use crate::models::batch::Signal;
use crate::models::strategy::StrategySignal;
use crate::services::market_data::MarketDataProvider;
use crate::strategies::{indicator_missing, load_candles, round_price, score_to_confidence, Strategy};
use async_trait::async_trait;
use std::sync::Arc;

/// Maximum relative distance from a band that still counts as a touch
const TOUCH_THRESHOLD: f64 = 0.002;

pub struct BollingerStrategy {
    provider: Arc<dyn MarketDataProvider>,
}

impl BollingerStrategy {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Strategy for BollingerStrategy {
    fn id(&self) -> &str {
        "bollinger"
    }

    fn name(&self) -> &str {
        "Bollinger Bands Strategy"
    }

    async fn execute(&self, symbol: &str) -> Result<StrategySignal, StrategyError> {
        let candles = load_candles(self.provider.as_ref(), symbol, 20).await?;
        let bands = calculate_bollinger_bands_default(&candles)
            .ok_or_else(|| indicator_missing("Bollinger Bands"))?;
        let ema9 = calculate_ema(&candles, 9).ok_or_else(|| indicator_missing("EMA9"))?.value;
        let ema15 = calculate_ema(&candles, 15).ok_or_else(|| indicator_missing("EMA15"))?.value;
        let latest = &candles[candles.len() - 1];

        let lower_distance = (latest.close - bands.lower).abs() / bands.lower;
        let upper_distance = (latest.close - bands.upper).abs() / bands.upper;

        let (signal, distance) = if bands.upper <= bands.lower {
            (Signal::Hold, 0.0)
        } else if lower_distance <= TOUCH_THRESHOLD && latest.is_green() {
            (Signal::Buy, lower_distance)
        } else if upper_distance <= TOUCH_THRESHOLD && !latest.is_green() {
            (Signal::Sell, upper_distance)
        } else {
            (Signal::Hold, 0.0)
        };

        let score = match signal {
            Signal::Hold => 0.0,
            _ => {
                let proximity = (40.0 - distance * 10_000.0).max(0.0);
                let trend_ok = match signal {
                    Signal::Buy => ema9 > ema15,
                    _ => ema9 < ema15,
                };
                proximity + if trend_ok { 20.0 } else { 10.0 } + 15.0
            }
        };

        Ok(
            StrategySignal::new(signal, score_to_confidence(score), round_price(latest.close))
                .with_indicator("bb_upper", bands.upper)
                .with_indicator("bb_middle", bands.middle)
                .with_indicator("bb_lower", bands.lower),
        )
    }
}
