//! Technical indicators consumed by the reference strategies.

pub mod momentum;
pub mod trend;
pub mod volatility;

pub use momentum::*;
pub use trend::*;
pub use volatility::*;

use crate::models::indicators::Candle;

pub(crate) fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}
