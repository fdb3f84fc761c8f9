//! Strategy execution result model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::batch::Signal;

/// What a strategy returns for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub signal: Signal,
    /// 0.0 ..= 1.0
    pub confidence: f64,
    pub reference_price: f64,
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
}

impl StrategySignal {
    pub fn new(signal: Signal, confidence: f64, reference_price: f64) -> Self {
        Self {
            signal,
            confidence,
            reference_price,
            indicators: BTreeMap::new(),
        }
    }

    pub fn hold(reference_price: f64) -> Self {
        Self::new(Signal::Hold, 0.0, reference_price)
    }

    pub fn with_indicator(mut self, name: &str, value: f64) -> Self {
        if value.is_finite() {
            self.indicators.insert(name.to_string(), value);
        }
        self
    }
}
