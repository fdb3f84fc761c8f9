//! External data sources used by strategy execution.

pub mod delta;
pub mod market_data;

pub use delta::DeltaExchangeProvider;
pub use market_data::{InMemoryMarketData, MarketDataProvider};
