//! Delta Exchange REST candle source

use crate::error::MarketDataError;
use crate::models::indicators::Candle;
use crate::services::market_data::MarketDataProvider;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, warn};

const LOOKBACK_DAYS: i64 = 5;

#[derive(Debug, Deserialize)]
struct CandleResponse {
    success: bool,
    #[serde(default)]
    result: Vec<RawCandle>,
}

#[derive(Debug, Deserialize)]
struct RawCandle {
    time: i64,
    #[serde(deserialize_with = "number_or_string")]
    open: f64,
    #[serde(deserialize_with = "number_or_string")]
    high: f64,
    #[serde(deserialize_with = "number_or_string")]
    low: f64,
    #[serde(deserialize_with = "number_or_string")]
    close: f64,
    #[serde(default, deserialize_with = "number_or_null")]
    volume: f64,
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn number_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(0.0),
        Some(serde_json::Value::Number(n)) => Ok(n.as_f64().unwrap_or(0.0)),
        Some(serde_json::Value::String(s)) => s.parse().map_err(serde::de::Error::custom),
        Some(other) => Err(serde::de::Error::custom(format!(
            "unexpected volume value: {other}"
        ))),
    }
}

/// Fetches `/v2/history/candles` with a short exponential retry
pub struct DeltaExchangeProvider {
    client: reqwest::Client,
    base_url: String,
    resolution: String,
}

impl DeltaExchangeProvider {
    pub fn new(base_url: impl Into<String>, resolution: impl Into<String>) -> Self {
        Self::with_client(base_url, resolution, reqwest::Client::new())
    }

    pub fn with_client(
        base_url: impl Into<String>,
        resolution: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            resolution: resolution.into(),
        }
    }

    async fn fetch_once(&self, symbol: &str) -> Result<Vec<Candle>, MarketDataError> {
        let end = Utc::now().timestamp();
        let start = end - LOOKBACK_DAYS * 86_400;

        let response = self
            .client
            .get(format!("{}/v2/history/candles", self.base_url))
            .query(&[
                ("resolution", self.resolution.clone()),
                ("symbol", symbol.to_string()),
                ("start", start.to_string()),
                ("end", end.to_string()),
            ])
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::Api(format!("bad status code: {status}")));
        }

        let body: CandleResponse = response.json().await?;
        if !body.success {
            return Err(MarketDataError::Api("success=false".to_string()));
        }
        if body.result.is_empty() {
            return Err(MarketDataError::Empty {
                symbol: symbol.to_string(),
            });
        }

        let mut candles: Vec<Candle> = body
            .result
            .into_iter()
            .filter_map(|raw| {
                let timestamp = DateTime::<Utc>::from_timestamp(raw.time, 0)?;
                Some(Candle::new(
                    raw.open, raw.high, raw.low, raw.close, raw.volume, timestamp,
                ))
            })
            .collect();
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

#[async_trait]
impl MarketDataProvider for DeltaExchangeProvider {
    async fn get_candles(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let candles = (|| async { self.fetch_once(symbol).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(200))
                    .with_max_times(2),
            )
            .sleep(tokio::time::sleep)
            .when(|e| !matches!(e, MarketDataError::Empty { .. }))
            .notify(|e, delay| {
                warn!(symbol = %symbol, error = %e, ?delay, "candle fetch failed, retrying");
            })
            .await?;

        debug!(symbol = %symbol, count = candles.len(), "fetched candles");
        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }
}
