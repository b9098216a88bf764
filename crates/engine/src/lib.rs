//! Stock Advisor Engine - technical analysis core
//!
//! Turns an OHLCV price history into indicators, detected patterns and
//! buy/sell/hold signals. Provides:
//! - Rolling-window series primitives
//! - Indicator engine with a pluggable backend (rolling formulas or `ta`)
//! - Candlestick, chart-geometry and support/resistance pattern detectors
//! - Per-family signal generators and weighted signal fusion
//! - Yahoo Finance chart client for price history

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod fusion;
pub mod indicators;
pub mod patterns;
pub mod series;
pub mod signals;
pub mod types;

// Re-exports for convenience
pub use analysis::{analyze, Analysis, Analyzer};
pub use api::{MarketDataSource, YahooChartClient};
pub use config::{AnalysisConfig, FamilyWeights, FusionWeights, IndicatorBackend, PatternConfig};
pub use error::{AnalysisError, Result};
pub use fusion::{combine_signals, fuse};
pub use indicators::{Indicator, IndicatorEngine, IndicatorSnapshot, IndicatorTable};
pub use patterns::{build_pattern_detectors, detect_patterns, CandlePattern, PatternDetector};
pub use signals::{build_signal_generators, generate_signals, SignalFamily, SignalGenerator};
pub use types::*;

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::types::PriceBar;

    pub fn day(n: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + n * 86_400, 0).unwrap()
    }

    /// Bars opening at the previous close with a one-point wick either side
    pub fn bars_from_closes(closes: &[f64], volume: f64) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                PriceBar::new(
                    day(i as i64),
                    open,
                    open.max(close) + 1.0,
                    open.min(close) - 1.0,
                    close,
                    volume,
                )
            })
            .collect()
    }

    /// 100, 101, 102, ...
    pub fn rising_closes(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    /// `flat` bars at 100, then +1 per bar up to `total` bars
    pub fn flat_then_rising(flat: usize, total: usize) -> Vec<f64> {
        (0..total)
            .map(|i| {
                if i < flat {
                    100.0
                } else {
                    100.0 + (i - flat + 1) as f64
                }
            })
            .collect()
    }
}
