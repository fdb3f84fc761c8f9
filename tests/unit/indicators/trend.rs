//! Unit tests for EMA indicator

use crate::support::candles_from_closes;
use stockscan::indicators::trend::{calculate_ema, check_ema_cross, last_two_emas};

fn rising(count: usize, base: f64) -> Vec<f64> {
    (0..count).map(|i| base + i as f64 * 0.1).collect()
}

#[test]
fn test_ema_insufficient_data() {
    let candles = candles_from_closes(&rising(10, 100.0));
    assert!(calculate_ema(&candles, 20).is_none());
}

#[test]
fn test_ema_sufficient_data() {
    let candles = candles_from_closes(&rising(50, 100.0));
    let ema = calculate_ema(&candles, 12).unwrap();
    assert_eq!(ema.period, 12);
    assert!(ema.value.is_finite());
    // lags behind a rising close
    assert!(ema.value < candles.last().unwrap().close);
}

#[test]
fn test_last_two_emas_orders_previous_first() {
    let candles = candles_from_closes(&rising(30, 100.0));
    let (previous, latest) = last_two_emas(&candles, 9).unwrap();
    assert!(latest > previous);
}

#[test]
fn test_last_two_emas_needs_two_points() {
    let candles = candles_from_closes(&rising(9, 100.0));
    assert!(last_two_emas(&candles, 9).is_none());
}

#[test]
fn test_ema_cross() {
    let candles = candles_from_closes(&rising(50, 100.0));
    assert_eq!(check_ema_cross(&candles, 12, 26), Some(1));

    let falling: Vec<f64> = rising(50, 100.0).into_iter().rev().collect();
    let candles = candles_from_closes(&falling);
    assert_eq!(check_ema_cross(&candles, 12, 26), Some(-1));
}
