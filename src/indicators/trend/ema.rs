//! EMA (Exponential Moving Average) indicator

use crate::common::math;
use crate::indicators::closes;
use crate::models::indicators::{Candle, EmaIndicator};

/// Calculate EMA for a specific period
pub fn calculate_ema(candles: &[Candle], period: u32) -> Option<EmaIndicator> {
    let value = math::ema(&closes(candles), period as usize)?;
    Some(EmaIndicator { value, period })
}

/// EMA values for the last two bars, `(previous, latest)`
pub fn last_two_emas(candles: &[Candle], period: u32) -> Option<(f64, f64)> {
    let series = math::ema_series(&closes(candles), period as usize)?;
    match series.as_slice() {
        [.., previous, latest] => Some((*previous, *latest)),
        _ => None,
    }
}

/// Relative position of a fast EMA to a slow EMA: 1 above, -1 below, 0 equal
pub fn check_ema_cross(candles: &[Candle], fast_period: u32, slow_period: u32) -> Option<i32> {
    let fast_ema = calculate_ema(candles, fast_period)?;
    let slow_ema = calculate_ema(candles, slow_period)?;

    if fast_ema.value > slow_ema.value {
        Some(1)
    } else if fast_ema.value < slow_ema.value {
        Some(-1)
    } else {
        Some(0)
    }
}
