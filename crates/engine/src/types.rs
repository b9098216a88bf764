//! Value types shared by every stage of the analysis

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single OHLCV bar.
///
/// Providers occasionally return nulls for individual fields, so every price
/// field is optional. A field that is null on *every* bar is treated as an
/// absent column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl PriceBar {
    pub fn new(date: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }

    pub fn get(&self, column: Column) -> Option<f64> {
        let value = match column {
            Column::Open => self.open,
            Column::High => self.high,
            Column::Low => self.low,
            Column::Close => self.close,
            Column::Volume => self.volume,
        };
        value.filter(|v| v.is_finite())
    }
}

/// Raw OHLCV columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Open,
        Column::High,
        Column::Low,
        Column::Close,
        Column::Volume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::High => "High",
            Self::Low => "Low",
            Self::Close => "Close",
            Self::Volume => "Volume",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered price history for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series, ordering bars by date and dropping repeated dates.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        let symbol = symbol.into();
        bars.sort_by_key(|b| b.date);
        let before = bars.len();
        bars.dedup_by_key(|b| b.date);
        if bars.len() != before {
            warn!(
                symbol = %symbol,
                dropped = before - bars.len(),
                "Dropped bars with duplicate dates"
            );
        }
        Self { symbol, bars }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
        }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|b| b.date).collect()
    }

    /// Values of one column, aligned with the bars
    pub fn column(&self, column: Column) -> Vec<Option<f64>> {
        self.bars.iter().map(|b| b.get(column)).collect()
    }

    /// A column is present if at least one bar carries a value for it
    pub fn has_column(&self, column: Column) -> bool {
        self.bars.iter().any(|b| b.get(column).is_some())
    }

    /// Series truncated to the first `len` bars
    pub fn truncated(&self, len: usize) -> Self {
        Self {
            symbol: self.symbol.clone(),
            bars: self.bars[..len.min(self.bars.len())].to_vec(),
        }
    }
}

/// Directional bias of a pattern or trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

/// Call attached to a signal.
///
/// `Neutral` means the signal could not be computed (insufficient history);
/// it carries no weight in fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
    Neutral,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Hold => "hold",
            Self::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

/// A directional call with a strength in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal: SignalKind,
    pub strength: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<Direction>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

impl Signal {
    fn with_kind(signal: SignalKind, strength: f64, reason: impl Into<String>) -> Self {
        Self {
            signal,
            strength: if strength.is_finite() {
                strength.clamp(0.0, 1.0)
            } else {
                0.0
            },
            reason: reason.into(),
            trend: None,
            metrics: BTreeMap::new(),
        }
    }

    pub fn buy(strength: f64, reason: impl Into<String>) -> Self {
        Self::with_kind(SignalKind::Buy, strength, reason)
    }

    pub fn sell(strength: f64, reason: impl Into<String>) -> Self {
        Self::with_kind(SignalKind::Sell, strength, reason)
    }

    pub fn hold(reason: impl Into<String>) -> Self {
        Self::with_kind(SignalKind::Hold, 0.5, reason)
    }

    pub fn neutral(reason: impl Into<String>) -> Self {
        Self::with_kind(SignalKind::Neutral, 0.0, reason)
    }

    pub fn insufficient_data() -> Self {
        Self::neutral("Insufficient data")
    }

    /// Attach a supporting value; non-finite values are skipped.
    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        if value.is_finite() {
            self.metrics.insert(name.to_string(), value);
        }
        self
    }

    pub fn with_trend(mut self, trend: Direction) -> Self {
        self.trend = Some(trend);
        self
    }

    /// Signed score: +strength for buy, -strength for sell, 0 otherwise
    pub fn score(&self) -> f64 {
        match self.signal {
            SignalKind::Buy => self.strength,
            SignalKind::Sell => -self.strength,
            SignalKind::Hold | SignalKind::Neutral => 0.0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.signal != SignalKind::Neutral
    }
}

/// Category a detected pattern belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Candlestick,
    Chart,
    SupportResistance,
}

/// One detected pattern occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEvent {
    pub pattern: String,
    pub category: PatternCategory,
    pub index: usize,
    pub date: DateTime<Utc>,
    pub direction: Direction,
    pub strength: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, f64>,
}

impl PatternEvent {
    pub fn with_attribute(mut self, name: &str, value: f64) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }
}

/// Technical and fundamental calls fused into one recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedRecommendation {
    pub signal: SignalKind,
    pub strength: f64,
    pub reason: String,
    pub weighted_score: f64,
    pub technical_contribution: f64,
    pub fundamental_contribution: f64,
}
