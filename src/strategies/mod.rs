//! Strategy capability and the static registry that maps ids to implementations.

pub mod bollinger;
pub mod ema_cross;
pub mod macd;
pub mod mother_candle;
pub mod pdhl;
pub mod registry;
pub mod rsi;
pub mod volume_breakout;

pub use bollinger::BollingerStrategy;
pub use ema_cross::EmaCrossStrategy;
pub use macd::MacdStrategy;
pub use mother_candle::MotherCandleStrategy;
pub use pdhl::PdhlStrategy;
pub use registry::StrategyRegistry;
pub use rsi::RsiStrategy;
pub use volume_breakout::VolumeBreakoutStrategy;

use crate::error::StrategyError;
use crate::models::indicators::Candle;
use crate::models::strategy::StrategySignal;
use crate::services::market_data::MarketDataProvider;
use async_trait::async_trait;

/// Candles requested per evaluation, raised when a strategy needs a longer history
pub const CANDLE_LIMIT: usize = 250;

/// Opaque strategy capability: one symbol in, one signal (or typed failure) out
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Registry id, e.g. "rsi"
    fn id(&self) -> &str;

    /// Human readable name
    fn name(&self) -> &str;

    async fn execute(&self, symbol: &str) -> Result<StrategySignal, StrategyError>;
}

pub(crate) async fn load_candles(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    needed: usize,
) -> Result<Vec<Candle>, StrategyError> {
    let candles = provider
        .get_candles(symbol, CANDLE_LIMIT.max(needed))
        .await?;
    if candles.len() < needed {
        return Err(StrategyError::InsufficientData {
            needed,
            available: candles.len(),
        });
    }
    Ok(candles)
}

/// Convert a 0..100 score into a 0..1 confidence rounded to three places
pub(crate) fn score_to_confidence(score: f64) -> f64 {
    (score.clamp(0.0, 100.0) / 100.0 * 1000.0).round() / 1000.0
}

pub(crate) fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

pub(crate) fn indicator_missing(name: &str) -> StrategyError {
    StrategyError::Evaluation(format!("{name} could not be calculated"))
}
