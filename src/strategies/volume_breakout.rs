//! High-volume range breakout strategy

use crate::common::math;
use crate::error::StrategyError;
use crate::indicators::{calculate_ema, calculate_rsi};
use crate::models::batch::Signal;
use crate::models::strategy::StrategySignal;
use crate::services::market_data::MarketDataProvider;
use crate::strategies::{indicator_missing, load_candles, round_price, score_to_confidence, Strategy};
use async_trait::async_trait;
use std::sync::Arc;

const VOLUME_WINDOW: usize = 20;
const RANGE_WINDOW: usize = 10;
const VOLUME_SURGE: f64 = 2.0;

pub struct VolumeBreakoutStrategy {
    provider: Arc<dyn MarketDataProvider>,
}

impl VolumeBreakoutStrategy {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Strategy for VolumeBreakoutStrategy {
    fn id(&self) -> &str {
        "volume_breakout"
    }

    fn name(&self) -> &str {
        "Volume Breakout Strategy"
    }

    async fn execute(&self, symbol: &str) -> Result<StrategySignal, StrategyError> {
        let candles = load_candles(self.provider.as_ref(), symbol, VOLUME_WINDOW + 1).await?;
        let latest = &candles[candles.len() - 1];
        let history = &candles[..candles.len() - 1];

        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
        let avg_volume =
            math::sma(&volumes, VOLUME_WINDOW).ok_or_else(|| indicator_missing("volume SMA"))?;
        let volume_ratio = if avg_volume > 0.0 { latest.volume / avg_volume } else { 0.0 };

        let recent = &history[history.len() - RANGE_WINDOW..];
        let recent_high = recent.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let recent_low = recent.iter().map(|c| c.low).fold(f64::MAX, f64::min);

        let rsi = calculate_rsi(&candles, 14)
            .ok_or_else(|| indicator_missing("RSI"))?
            .value;
        let ema15 = calculate_ema(&candles, 15).ok_or_else(|| indicator_missing("EMA15"))?.value;
        let body = latest.body_pct();
        let surge = volume_ratio > VOLUME_SURGE && body > 40.0;

        let signal = if surge && latest.close > recent_high && latest.is_green() && rsi < 80.0 && latest.close > ema15 {
            Signal::Buy
        } else if surge && latest.close < recent_low && !latest.is_green() && rsi > 20.0 && latest.close < ema15 {
            Signal::Sell
        } else {
            Signal::Hold
        };

        let score = match signal {
            Signal::Hold => 0.0,
            _ => {
                let volume_score = ((volume_ratio - 1.0) * 20.0).clamp(0.0, 40.0);
                let breakout = match signal {
                    Signal::Buy => (latest.close - recent_high) / recent_high * 1000.0,
                    _ => (recent_low - latest.close) / recent_low * 1000.0,
                };
                let rsi_ok = match signal {
                    Signal::Buy => rsi > 40.0 && rsi < 80.0,
                    _ => rsi > 20.0 && rsi < 60.0,
                };
                volume_score
                    + breakout.abs().min(25.0)
                    + (body / 2.0).min(20.0)
                    + if rsi_ok { 15.0 } else { 0.0 }
            }
        };

        Ok(
            StrategySignal::new(signal, score_to_confidence(score), round_price(latest.close))
                .with_indicator("volume_ratio", volume_ratio)
                .with_indicator("rsi", rsi)
                .with_indicator("ema_15", ema15),
        )
    }
}
