//! Unit tests for Bollinger Bands

use crate::support::candles_from_closes;
use stockscan::indicators::volatility::{calculate_bollinger_bands, calculate_bollinger_bands_default};

#[test]
fn test_bands_are_symmetric_around_sma() {
    let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
    let bands = calculate_bollinger_bands_default(&candles_from_closes(&closes)).unwrap();
    assert!(bands.upper > bands.middle && bands.middle > bands.lower);
    assert!(((bands.upper - bands.middle) - (bands.middle - bands.lower)).abs() < 1e-9);
    assert_eq!(bands.period, 20);
}

#[test]
fn test_flat_series_collapses_bands() {
    let closes = vec![100.0; 20];
    let bands = calculate_bollinger_bands(&candles_from_closes(&closes), 20, 2.0).unwrap();
    assert_eq!(bands.upper, bands.lower);
}

#[test]
fn test_bollinger_insufficient_data() {
    let closes = vec![100.0; 19];
    assert!(calculate_bollinger_bands_default(&candles_from_closes(&closes)).is_none());
}
