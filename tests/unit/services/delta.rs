//! Delta Exchange candle provider against a mocked REST endpoint

use serde_json::json;
use stockscan::error::MarketDataError;
use stockscan::services::market_data::MarketDataProvider;
use stockscan::services::DeltaExchangeProvider;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn candles_are_sorted_and_limited() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/history/candles"))
        .and(query_param("symbol", "BTCUSD"))
        .and(query_param("resolution", "15m"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [
                {"time": 1_700_000_900, "open": "101", "high": "103", "low": "100", "close": "102", "volume": 12},
                {"time": 1_700_000_000, "open": 100, "high": 102, "low": 99, "close": 101, "volume": 10},
                {"time": 1_700_001_800, "open": 102, "high": 104, "low": 101, "close": 103, "volume": null}
            ]
        })))
        .mount(&mock)
        .await;

    let provider = DeltaExchangeProvider::new(mock.uri(), "15m");
    let candles = provider.get_candles("BTCUSD", 2).await.unwrap();

    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].close, 102.0);
    assert_eq!(candles[0].open, 101.0);
    assert_eq!(candles[1].close, 103.0);
    assert_eq!(candles[1].volume, 0.0);
    assert!(candles[0].timestamp < candles[1].timestamp);
}

#[tokio::test]
async fn empty_result_is_not_retried() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/history/candles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": []
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let provider = DeltaExchangeProvider::new(mock.uri(), "15m");
    let err = provider.get_candles("NOPE", 10).await.unwrap_err();
    assert!(matches!(err, MarketDataError::Empty { ref symbol } if symbol == "NOPE"));
}

#[tokio::test]
async fn server_errors_surface_after_retries() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/history/candles"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock)
        .await;

    let provider = DeltaExchangeProvider::new(mock.uri(), "15m");
    let err = provider.get_candles("BTCUSD", 10).await.unwrap_err();
    assert!(matches!(err, MarketDataError::Api(_)));
}

#[tokio::test]
async fn unsuccessful_payload_is_an_api_error() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/history/candles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .mount(&mock)
        .await;

    let provider = DeltaExchangeProvider::new(mock.uri(), "15m");
    let err = provider.get_candles("BTCUSD", 10).await.unwrap_err();
    assert!(matches!(err, MarketDataError::Api(ref msg) if msg.contains("success=false")));
}
