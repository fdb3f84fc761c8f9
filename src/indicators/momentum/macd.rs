//! MACD (Moving Average Convergence Divergence) indicator

use crate::common::math;
use crate::indicators::closes;
use crate::models::indicators::{Candle, MacdIndicator};

/// MACD values for every bar where the signal line is defined, oldest first
///
/// MACD = EMA(fast) - EMA(slow)
/// Signal = EMA(signal) of MACD
/// Histogram = MACD - Signal
pub fn calculate_macd_series(
    candles: &[Candle],
    fast_period: u32,
    slow_period: u32,
    signal_period: u32,
) -> Option<Vec<MacdIndicator>> {
    let (fast, slow, signal) = (
        fast_period as usize,
        slow_period as usize,
        signal_period as usize,
    );
    if fast >= slow || candles.len() < slow + signal {
        return None;
    }

    let closes = closes(candles);
    let fast_series = math::ema_series(&closes, fast)?;
    let slow_series = math::ema_series(&closes, slow)?;

    // fast series starts `slow - fast` bars earlier than the slow one
    let offset = slow - fast;
    let macd_line: Vec<f64> = slow_series
        .iter()
        .enumerate()
        .map(|(i, slow_value)| fast_series[i + offset] - slow_value)
        .collect();

    let signal_line = math::ema_series(&macd_line, signal)?;
    let aligned = &macd_line[signal - 1..];

    Some(
        aligned
            .iter()
            .zip(signal_line.iter())
            .map(|(&macd, &signal)| MacdIndicator {
                macd,
                signal,
                histogram: macd - signal,
            })
            .collect(),
    )
}

/// Latest MACD value
pub fn calculate_macd(
    candles: &[Candle],
    fast_period: u32,
    slow_period: u32,
    signal_period: u32,
) -> Option<MacdIndicator> {
    calculate_macd_series(candles, fast_period, slow_period, signal_period)?.pop()
}

/// Calculate MACD with default periods (12, 26, 9)
pub fn calculate_macd_default(candles: &[Candle]) -> Option<MacdIndicator> {
    calculate_macd(candles, 12, 26, 9)
}
