//! Reference strategies against hand-built candle series

use std::sync::Arc;
use stockscan::error::{MarketDataError, StrategyError};
use stockscan::models::batch::Signal;
use stockscan::models::indicators::Candle;
use stockscan::services::market_data::InMemoryMarketData;
use stockscan::strategies::{
    BollingerStrategy, EmaCrossStrategy, MacdStrategy, MotherCandleStrategy, PdhlStrategy,
    RsiStrategy, Strategy, VolumeBreakoutStrategy,
};

use crate::support::candles_from_closes;

async fn provider_with(symbol: &str, candles: Vec<Candle>) -> Arc<InMemoryMarketData> {
    let provider = Arc::new(InMemoryMarketData::new());
    provider.insert(symbol, candles).await;
    provider
}

fn alternating(count: usize, low: f64, high: f64) -> Vec<f64> {
    (0..count)
        .map(|i| if i % 2 == 0 { low } else { high })
        .collect()
}

#[tokio::test]
async fn rsi_buys_oversold_bounce() {
    let mut closes: Vec<f64> = (0..19).map(|i| 120.0 - i as f64).collect();
    closes.push(102.5);
    let strategy = RsiStrategy::new(provider_with("BTCUSD", candles_from_closes(&closes)).await);

    let result = strategy.execute("BTCUSD").await.unwrap();
    assert_eq!(result.signal, Signal::Buy);
    assert!(result.confidence > 0.5 && result.confidence <= 1.0);
    assert!(result.indicators["rsi"] < 30.0);
}

#[tokio::test]
async fn rsi_sells_overbought_rejection() {
    let mut closes: Vec<f64> = (0..19).map(|i| 80.0 + i as f64).collect();
    closes.push(97.5);
    let strategy = RsiStrategy::new(provider_with("BTCUSD", candles_from_closes(&closes)).await);

    let result = strategy.execute("BTCUSD").await.unwrap();
    assert_eq!(result.signal, Signal::Sell);
    assert!(result.indicators["rsi"] > 70.0);
}

#[tokio::test]
async fn rsi_holds_in_balanced_market() {
    let closes = alternating(20, 100.0, 101.0);
    let strategy = RsiStrategy::new(provider_with("BTCUSD", candles_from_closes(&closes)).await);

    let result = strategy.execute("BTCUSD").await.unwrap();
    assert_eq!(result.signal, Signal::Hold);
    assert_eq!(result.confidence, 0.0);
}

#[tokio::test]
async fn ema_cross_buys_golden_cross_on_volume() {
    let mut closes: Vec<f64> = (0..30).map(|i| 130.0 - i as f64).collect();
    closes.push(160.0);
    let mut candles = candles_from_closes(&closes);
    if let Some(last) = candles.last_mut() {
        last.volume = 5000.0;
    }
    let strategy = EmaCrossStrategy::new(provider_with("ETHUSD", candles).await);

    let result = strategy.execute("ETHUSD").await.unwrap();
    assert_eq!(result.signal, Signal::Buy);
    assert!(result.confidence > 0.0);
    assert!(result.indicators["ema_9"] > result.indicators["ema_15"]);
}

#[tokio::test]
async fn ema_cross_needs_volume_confirmation() {
    let mut closes: Vec<f64> = (0..30).map(|i| 130.0 - i as f64).collect();
    closes.push(160.0);
    let strategy =
        EmaCrossStrategy::new(provider_with("ETHUSD", candles_from_closes(&closes)).await);

    let result = strategy.execute("ETHUSD").await.unwrap();
    assert_eq!(result.signal, Signal::Hold);
}

#[tokio::test]
async fn bollinger_buys_green_touch_of_lower_band() {
    let mut closes = alternating(19, 101.0, 100.0);
    closes.push(99.3);
    let mut candles = candles_from_closes(&closes);
    if let Some(last) = candles.last_mut() {
        last.open = 99.2;
        last.high = 99.35;
        last.low = 99.15;
    }
    let strategy = BollingerStrategy::new(provider_with("SOLUSD", candles).await);

    let result = strategy.execute("SOLUSD").await.unwrap();
    assert_eq!(result.signal, Signal::Buy);
    assert!(result.confidence > 0.5);
    assert!(result.indicators.contains_key("bb_lower"));
}

#[tokio::test]
async fn bollinger_holds_inside_bands() {
    let closes = alternating(20, 100.0, 100.5);
    let strategy =
        BollingerStrategy::new(provider_with("SOLUSD", candles_from_closes(&closes)).await);

    let result = strategy.execute("SOLUSD").await.unwrap();
    assert_eq!(result.signal, Signal::Hold);
}

#[tokio::test]
async fn volume_breakout_buys_high_volume_range_break() {
    let mut closes = alternating(24, 100.0, 100.5);
    closes.push(103.0);
    let mut candles = candles_from_closes(&closes);
    if let Some(last) = candles.last_mut() {
        last.volume = 5000.0;
    }
    let strategy = VolumeBreakoutStrategy::new(provider_with("BTCUSD", candles).await);

    let result = strategy.execute("BTCUSD").await.unwrap();
    assert_eq!(result.signal, Signal::Buy);
    assert!(result.indicators["volume_ratio"] > 2.0);
}

#[tokio::test]
async fn macd_reports_indicator_values() {
    let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 4.0).collect();
    let strategy = MacdStrategy::new(provider_with("BTCUSD", candles_from_closes(&closes)).await);

    let result = strategy.execute("BTCUSD").await.unwrap();
    assert!((0.0..=1.0).contains(&result.confidence));
    assert!(result.indicators.contains_key("macd"));
    assert!(result.indicators.contains_key("macd_signal"));
}

#[tokio::test]
async fn insufficient_history_is_a_typed_failure() {
    let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
    let strategy = MacdStrategy::new(provider_with("BTCUSD", candles_from_closes(&closes)).await);

    let err = strategy.execute("BTCUSD").await.unwrap_err();
    assert!(matches!(
        err,
        StrategyError::InsufficientData {
            needed: 36,
            available: 20
        }
    ));
}

#[tokio::test]
async fn missing_symbol_surfaces_market_data_error() {
    let strategy = RsiStrategy::new(Arc::new(InMemoryMarketData::new()));
    let err = strategy.execute("NOPE").await.unwrap_err();
    assert!(matches!(
        err,
        StrategyError::MarketData(MarketDataError::Empty { .. })
    ));
}

/// One full day of 15 minute candles oscillating 99.5/100.5, then `today` on the next day
fn two_day_closes(today: &[f64]) -> Vec<f64> {
    let mut closes = alternating(96, 99.5, 100.5);
    closes.extend_from_slice(today);
    closes
}

fn set_candle(candle: &mut Candle, open: f64, high: f64, low: f64, close: f64) {
    candle.open = open;
    candle.high = high;
    candle.low = low;
    candle.close = close;
}

#[tokio::test]
async fn pdhl_buys_reclaim_of_previous_low() {
    let candles = candles_from_closes(&two_day_closes(&[100.0, 99.0, 100.0]));
    let strategy = PdhlStrategy::new(provider_with("AAPL", candles).await);

    let result = strategy.execute("AAPL").await.unwrap();
    assert_eq!(result.signal, Signal::Buy);
    assert!((result.indicators["prev_day_low"] - 99.45).abs() < 1e-9);
    assert!((result.indicators["prev_day_high"] - 100.55).abs() < 1e-9);
    // 40 base + 27.65 strength + 15 green candle, no volume surge
    assert!((result.confidence - 0.827).abs() < 1e-9);
}

#[tokio::test]
async fn pdhl_sells_rejection_of_previous_high() {
    let mut candles = candles_from_closes(&two_day_closes(&[100.0, 101.0, 100.0]));
    if let Some(last) = candles.last_mut() {
        last.volume = 4000.0;
    }
    let strategy = PdhlStrategy::new(provider_with("AAPL", candles).await);

    let result = strategy.execute("AAPL").await.unwrap();
    assert_eq!(result.signal, Signal::Sell);
    assert!(result.confidence > 0.9);
}

#[tokio::test]
async fn pdhl_holds_inside_previous_range() {
    let candles = candles_from_closes(&two_day_closes(&[100.0, 100.2]));
    let strategy = PdhlStrategy::new(provider_with("AAPL", candles).await);

    let result = strategy.execute("AAPL").await.unwrap();
    assert_eq!(result.signal, Signal::Hold);
    assert_eq!(result.confidence, 0.0);
}

#[tokio::test]
async fn pdhl_without_previous_day_is_a_typed_failure() {
    let candles = candles_from_closes(&alternating(20, 99.5, 100.5));
    let strategy = PdhlStrategy::new(provider_with("AAPL", candles).await);

    let err = strategy.execute("AAPL").await.unwrap_err();
    assert!(matches!(err, StrategyError::Evaluation(_)));
}

#[tokio::test]
async fn mother_candle_buys_inside_bar_breakout() {
    let mut candles = candles_from_closes(&[100.0; 300]);
    let n = candles.len();
    set_candle(&mut candles[n - 3], 99.0, 102.0, 98.0, 101.0);
    set_candle(&mut candles[n - 2], 100.5, 101.0, 99.0, 100.0);
    set_candle(&mut candles[n - 1], 100.0, 103.5, 99.9, 103.0);
    candles[n - 1].volume = 3000.0;
    let strategy = MotherCandleStrategy::new(provider_with("MSFT", candles).await);

    let result = strategy.execute("MSFT").await.unwrap();
    assert_eq!(result.signal, Signal::Buy);
    // price sits above the EMA, so only pattern, candle and volume score
    assert!((result.confidence - 0.7).abs() < 1e-9);
    assert!(result.indicators["price_to_ema"] > 0.0);
}

#[tokio::test]
async fn mother_candle_sells_stretched_outside_bar_breakdown() {
    let mut closes = vec![100.0; 290];
    closes.extend(vec![110.0; 10]);
    let mut candles = candles_from_closes(&closes);
    let n = candles.len();
    set_candle(&mut candles[n - 3], 110.0, 111.0, 109.0, 110.0);
    set_candle(&mut candles[n - 2], 110.0, 112.0, 108.0, 110.0);
    set_candle(&mut candles[n - 1], 110.0, 110.5, 108.2, 108.5);
    candles[n - 1].volume = 3000.0;
    let strategy = MotherCandleStrategy::new(provider_with("MSFT", candles).await);

    let result = strategy.execute("MSFT").await.unwrap();
    assert_eq!(result.signal, Signal::Sell);
    assert_eq!(result.confidence, 1.0);
}

#[tokio::test]
async fn mother_candle_outside_bar_needs_ema_stretch() {
    let mut candles = candles_from_closes(&[100.0; 300]);
    let n = candles.len();
    set_candle(&mut candles[n - 3], 100.0, 100.5, 99.5, 100.0);
    set_candle(&mut candles[n - 2], 100.0, 101.0, 99.0, 100.0);
    set_candle(&mut candles[n - 1], 100.0, 101.0, 99.9, 100.8);
    let strategy = MotherCandleStrategy::new(provider_with("MSFT", candles).await);

    let result = strategy.execute("MSFT").await.unwrap();
    assert_eq!(result.signal, Signal::Hold);
}

#[tokio::test]
async fn mother_candle_requests_long_history() {
    let candles = candles_from_closes(&[100.0; 280]);
    let strategy = MotherCandleStrategy::new(provider_with("MSFT", candles).await);

    let err = strategy.execute("MSFT").await.unwrap_err();
    assert!(matches!(
        err,
        StrategyError::InsufficientData {
            needed: 300,
            available: 280
        }
    ));
}
