//! Where price history and fundamental calls come from

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{AnalysisError, Result};
use crate::types::{PriceSeries, Signal};

pub const DEFAULT_PERIOD: &str = "1y";
pub const DEFAULT_INTERVAL: &str = "1d";

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Price history for `symbol`. No data is an `UpstreamData` error.
    async fn fetch_price_series(&self, symbol: &str, period: &str, interval: &str) -> Result<PriceSeries>;

    /// Externally computed fundamental call, if the source has one
    async fn fetch_fundamental_signal(&self, _symbol: &str) -> Result<Option<Signal>> {
        Ok(None)
    }
}

/// Pre-loaded series, keyed by symbol (file input, tests)
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    series: HashMap<String, PriceSeries>,
    fundamentals: HashMap<String, Signal>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.series.insert(series.symbol.to_uppercase(), series);
        self
    }

    pub fn with_fundamental(mut self, symbol: &str, signal: Signal) -> Self {
        self.fundamentals.insert(symbol.to_uppercase(), signal);
        self
    }
}

#[async_trait]
impl MarketDataSource for StaticSource {
    async fn fetch_price_series(&self, symbol: &str, _period: &str, _interval: &str) -> Result<PriceSeries> {
        match self.series.get(&symbol.to_uppercase()) {
            Some(series) if !series.is_empty() => Ok(series.clone()),
            _ => Err(AnalysisError::upstream(symbol, "no bars loaded")),
        }
    }

    async fn fetch_fundamental_signal(&self, symbol: &str) -> Result<Option<Signal>> {
        Ok(self.fundamentals.get(&symbol.to_uppercase()).cloned())
    }
}
