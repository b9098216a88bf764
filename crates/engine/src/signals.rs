//! Per-family signal generators
//!
//! Each generator reads the last bar (and the bar before it, for crossovers)
//! of an [`IndicatorTable`] and emits a buy/sell/hold [`Signal`]. A generator
//! whose inputs are missing at the last bar reports a neutral
//! "Insufficient data" signal instead of failing.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::{Indicator, IndicatorTable};
use crate::series;
use crate::types::{Column, Direction, Signal};

// ============================================================================
// Families
// ============================================================================

/// Indicator family a signal is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalFamily {
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "Bollinger_Bands")]
    BollingerBands,
    #[serde(rename = "Moving_Averages")]
    MovingAverages,
    #[serde(rename = "Volume")]
    Volume,
}

impl SignalFamily {
    pub const ALL: [SignalFamily; 5] = [
        Self::Rsi,
        Self::Macd,
        Self::BollingerBands,
        Self::MovingAverages,
        Self::Volume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rsi => "RSI",
            Self::Macd => "MACD",
            Self::BollingerBands => "Bollinger_Bands",
            Self::MovingAverages => "Moving_Averages",
            Self::Volume => "Volume",
        }
    }
}

impl fmt::Display for SignalFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Core trait
// ============================================================================

/// Derives one family's call from a computed indicator table
pub trait SignalGenerator: Send + Sync {
    fn family(&self) -> SignalFamily;

    /// Indicator columns that must exist for this family to be evaluated at all
    fn requires(&self) -> &[Indicator];

    fn evaluate(&self, table: &IndicatorTable) -> Signal;

    fn name(&self) -> &'static str {
        self.family().as_str()
    }
}

/// `a` overtakes `b` on the last bar: `a[t-1] <= b[t-1]` and `a[t] > b[t]`
pub fn crossed_above(prev_a: Option<f64>, prev_b: Option<f64>, a: f64, b: f64) -> bool {
    matches!((prev_a, prev_b), (Some(pa), Some(pb)) if pa <= pb) && a > b
}

/// Mirror of [`crossed_above`]
pub fn crossed_below(prev_a: Option<f64>, prev_b: Option<f64>, a: f64, b: f64) -> bool {
    matches!((prev_a, prev_b), (Some(pa), Some(pb)) if pa >= pb) && a < b
}

// ============================================================================
// 1. RSI
// ============================================================================

pub struct RsiSignalGenerator {
    overbought: f64,
    oversold: f64,
}

impl RsiSignalGenerator {
    pub fn new(overbought: f64, oversold: f64) -> Self {
        Self {
            overbought,
            oversold,
        }
    }
}

impl Default for RsiSignalGenerator {
    fn default() -> Self {
        Self::new(70.0, 30.0)
    }
}

impl SignalGenerator for RsiSignalGenerator {
    fn family(&self) -> SignalFamily {
        SignalFamily::Rsi
    }

    fn requires(&self) -> &[Indicator] {
        &[Indicator::Rsi]
    }

    fn evaluate(&self, table: &IndicatorTable) -> Signal {
        let Some(rsi) = table.latest(Indicator::Rsi) else {
            return Signal::insufficient_data();
        };
        let signal = if rsi > self.overbought {
            Signal::sell(
                (rsi - self.overbought) / (100.0 - self.overbought),
                format!("RSI overbought at {:.2}", rsi),
            )
        } else if rsi < self.oversold {
            Signal::buy(
                (self.oversold - rsi) / self.oversold,
                format!("RSI oversold at {:.2}", rsi),
            )
        } else {
            Signal::hold(format!("RSI neutral at {:.2}", rsi))
        };
        signal.with_metric("value", rsi)
    }
}

// ============================================================================
// 2. MACD
// ============================================================================

#[derive(Default)]
pub struct MacdSignalGenerator;

impl SignalGenerator for MacdSignalGenerator {
    fn family(&self) -> SignalFamily {
        SignalFamily::Macd
    }

    fn requires(&self) -> &[Indicator] {
        &[Indicator::Macd, Indicator::MacdSignal]
    }

    fn evaluate(&self, table: &IndicatorTable) -> Signal {
        let (Some(macd), Some(line)) = (
            table.latest(Indicator::Macd),
            table.latest(Indicator::MacdSignal),
        ) else {
            return Signal::insufficient_data();
        };
        let histogram = table
            .latest(Indicator::MacdHistogram)
            .unwrap_or(macd - line);
        let prev_macd = table.value_back(Indicator::Macd, 1);
        let prev_line = table.value_back(Indicator::MacdSignal, 1);
        let strength = (histogram.abs() / 2.0).min(1.0);

        let signal = if crossed_above(prev_macd, prev_line, macd, line) {
            Signal::buy(strength, "MACD bullish crossover")
        } else if crossed_below(prev_macd, prev_line, macd, line) {
            Signal::sell(strength, "MACD bearish crossover")
        } else {
            Signal::hold("MACD no crossover")
        };
        signal
            .with_metric("macd", macd)
            .with_metric("signal_line", line)
            .with_metric("histogram", histogram)
    }
}

// ============================================================================
// 3. Bollinger Bands
// ============================================================================

#[derive(Default)]
pub struct BollingerSignalGenerator;

impl SignalGenerator for BollingerSignalGenerator {
    fn family(&self) -> SignalFamily {
        SignalFamily::BollingerBands
    }

    fn requires(&self) -> &[Indicator] {
        &[Indicator::BbUpper, Indicator::BbLower]
    }

    fn evaluate(&self, table: &IndicatorTable) -> Signal {
        let close = series::last(table.price(Column::Close));
        let upper = table.latest(Indicator::BbUpper);
        let lower = table.latest(Indicator::BbLower);
        let (Some(close), Some(upper), Some(lower)) = (close, upper, lower) else {
            return Signal::insufficient_data();
        };
        let position = table.latest(Indicator::BbPosition);

        // penetration relative to the band level, x10
        let signal = if close <= lower {
            Signal::buy(
                (lower - close) / lower * 10.0,
                "Price at or below lower Bollinger Band",
            )
        } else if close >= upper {
            Signal::sell(
                (close - upper) / upper * 10.0,
                "Price at or above upper Bollinger Band",
            )
        } else {
            Signal::hold(format!(
                "Price within Bollinger Bands (position: {:.2})",
                position.unwrap_or(f64::NAN)
            ))
        };
        let signal = signal
            .with_metric("upper_band", upper)
            .with_metric("lower_band", lower);
        match position {
            Some(p) => signal.with_metric("position", p),
            None => signal,
        }
    }
}

// ============================================================================
// 4. Moving averages
// ============================================================================

#[derive(Default)]
pub struct MovingAverageSignalGenerator;

impl MovingAverageSignalGenerator {
    const STRENGTH: f64 = 0.8;
}

impl SignalGenerator for MovingAverageSignalGenerator {
    fn family(&self) -> SignalFamily {
        SignalFamily::MovingAverages
    }

    fn requires(&self) -> &[Indicator] {
        &[Indicator::Sma20, Indicator::Sma50]
    }

    fn evaluate(&self, table: &IndicatorTable) -> Signal {
        let (Some(fast), Some(slow)) = (
            table.latest(Indicator::Sma20),
            table.latest(Indicator::Sma50),
        ) else {
            return Signal::insufficient_data();
        };
        let prev_fast = table.value_back(Indicator::Sma20, 1);
        let prev_slow = table.value_back(Indicator::Sma50, 1);

        let mut signal = if crossed_above(prev_fast, prev_slow, fast, slow) {
            Signal::buy(Self::STRENGTH, "Golden Cross (20 SMA crosses above 50 SMA)")
        } else if crossed_below(prev_fast, prev_slow, fast, slow) {
            Signal::sell(Self::STRENGTH, "Death Cross (20 SMA crosses below 50 SMA)")
        } else {
            Signal::hold("No MA crossover")
        }
        .with_metric("sma20", fast)
        .with_metric("sma50", slow);

        let close = series::last(table.price(Column::Close));
        if let (Some(close), Some(long)) = (close, table.latest(Indicator::Sma200)) {
            let trend = if close > long {
                Direction::Bullish
            } else {
                Direction::Bearish
            };
            signal = signal.with_trend(trend).with_metric("sma200", long);
        }
        signal
    }
}

// ============================================================================
// 5. Volume
// ============================================================================

pub struct VolumeSignalGenerator {
    window: usize,
    spike_ratio: f64,
}

impl VolumeSignalGenerator {
    pub fn new(window: usize, spike_ratio: f64) -> Self {
        Self {
            window,
            spike_ratio,
        }
    }
}

impl Default for VolumeSignalGenerator {
    fn default() -> Self {
        Self::new(20, 2.0)
    }
}

impl SignalGenerator for VolumeSignalGenerator {
    fn family(&self) -> SignalFamily {
        SignalFamily::Volume
    }

    fn requires(&self) -> &[Indicator] {
        &[Indicator::Obv]
    }

    fn evaluate(&self, table: &IndicatorTable) -> Signal {
        let volumes = table.price(Column::Volume);
        let (Some(volume), Some(obv)) = (series::last(volumes), table.latest(Indicator::Obv)) else {
            return Signal::insufficient_data();
        };

        // mean over whatever is present in the trailing window
        let tail = &volumes[volumes.len().saturating_sub(self.window)..];
        let present: Vec<f64> = tail.iter().flatten().copied().collect();
        let average = present.iter().sum::<f64>() / present.len() as f64;
        let Some(ratio) = series::finite(volume / average) else {
            return Signal::insufficient_data();
        };

        let closes = table.price(Column::Close);
        let price_up = match (series::from_end(closes, 0), series::from_end(closes, 1)) {
            (Some(close), Some(prev)) => close > prev,
            _ => false,
        };

        let signal = if ratio > self.spike_ratio {
            let strength = ratio / 5.0;
            if price_up {
                Signal::buy(
                    strength,
                    format!("High volume price increase (volume ratio: {:.2})", ratio),
                )
            } else {
                Signal::sell(
                    strength,
                    format!("High volume price decrease (volume ratio: {:.2})", ratio),
                )
            }
        } else {
            Signal::hold(format!("Normal volume (ratio: {:.2})", ratio))
        };
        signal
            .with_metric("volume_ratio", ratio)
            .with_metric("obv", obv)
    }
}

// ============================================================================
// Factory / driver
// ============================================================================

/// The five default family generators, in reporting order
pub fn build_signal_generators() -> Vec<Box<dyn SignalGenerator>> {
    vec![
        Box::new(RsiSignalGenerator::default()),
        Box::new(MacdSignalGenerator),
        Box::new(BollingerSignalGenerator),
        Box::new(MovingAverageSignalGenerator),
        Box::new(VolumeSignalGenerator::default()),
    ]
}

/// Evaluate every generator whose indicator columns were computed.
///
/// A family whose columns are absent (its indicator computation failed) is
/// left out of the map; an empty table yields an empty map.
pub fn generate_signals(
    table: &IndicatorTable,
    generators: &[Box<dyn SignalGenerator>],
) -> BTreeMap<SignalFamily, Signal> {
    if table.is_empty() {
        return BTreeMap::new();
    }
    generators
        .iter()
        .filter(|g| g.requires().iter().all(|i| table.get(*i).is_some()))
        .map(|g| {
            let signal = g.evaluate(table);
            debug!(
                symbol = %table.symbol,
                family = g.name(),
                signal = %signal.signal,
                strength = signal.strength,
                "Signal"
            );
            (g.family(), signal)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::indicators::IndicatorEngine;
    use crate::testutil::{bars_from_closes, day, flat_then_rising};
    use crate::types::{PriceSeries, SignalKind};

    fn table(len: usize, closes: &[f64], columns: &[(Indicator, Vec<Option<f64>>)]) -> IndicatorTable {
        let mut t = IndicatorTable::empty("T");
        t.dates = (0..len as i64).map(day).collect();
        t.prices
            .insert(Column::Close, closes.iter().map(|c| Some(*c)).collect());
        t.prices.insert(Column::Volume, vec![Some(100.0); len]);
        for (indicator, values) in columns {
            t.indicators.insert(*indicator, values.clone());
        }
        t
    }

    fn computed(closes: &[f64], volume: f64) -> IndicatorTable {
        IndicatorEngine::new(&AnalysisConfig::default())
            .compute(&PriceSeries::new("T", bars_from_closes(closes, volume)))
            .unwrap()
    }

    #[test]
    fn test_crossover_predicates() {
        assert!(crossed_above(Some(1.0), Some(1.0), 2.0, 1.5));
        assert!(!crossed_above(Some(2.0), Some(1.0), 2.0, 1.5));
        assert!(!crossed_above(None, Some(1.0), 2.0, 1.5));
        assert!(crossed_below(Some(1.0), Some(1.0), 0.5, 1.0));
        assert!(!crossed_below(Some(1.0), Some(1.0), 1.0, 1.0));
    }

    #[test]
    fn test_rsi_thresholds() {
        let gen = RsiSignalGenerator::default();
        let t = table(1, &[10.0], &[(Indicator::Rsi, vec![Some(85.0)])]);
        let s = gen.evaluate(&t);
        assert_eq!(s.signal, SignalKind::Sell);
        assert!((s.strength - 0.5).abs() < 1e-12);
        assert_eq!(s.reason, "RSI overbought at 85.00");

        let t = table(1, &[10.0], &[(Indicator::Rsi, vec![Some(15.0)])]);
        let s = gen.evaluate(&t);
        assert_eq!(s.signal, SignalKind::Buy);
        assert!((s.strength - 0.5).abs() < 1e-12);

        let t = table(1, &[10.0], &[(Indicator::Rsi, vec![Some(50.0)])]);
        let s = gen.evaluate(&t);
        assert_eq!(s.signal, SignalKind::Hold);
        assert_eq!(s.strength, 0.5);
        assert_eq!(s.reason, "RSI neutral at 50.00");
    }

    #[test]
    fn test_missing_last_value_is_insufficient() {
        let t = table(2, &[10.0, 11.0], &[(Indicator::Rsi, vec![Some(50.0), None])]);
        let s = RsiSignalGenerator::default().evaluate(&t);
        assert_eq!(s.signal, SignalKind::Neutral);
        assert_eq!(s.strength, 0.0);
        assert_eq!(s.reason, "Insufficient data");
    }

    #[test]
    fn test_macd_crossover() {
        let t = table(
            2,
            &[10.0, 11.0],
            &[
                (Indicator::Macd, vec![Some(-0.5), Some(1.0)]),
                (Indicator::MacdSignal, vec![Some(0.0), Some(0.2)]),
                (Indicator::MacdHistogram, vec![Some(-0.5), Some(0.8)]),
            ],
        );
        let s = MacdSignalGenerator.evaluate(&t);
        assert_eq!(s.signal, SignalKind::Buy);
        assert!((s.strength - 0.4).abs() < 1e-12);
        assert_eq!(s.reason, "MACD bullish crossover");

        let t = table(
            2,
            &[10.0, 9.0],
            &[
                (Indicator::Macd, vec![Some(1.0), Some(-3.0)]),
                (Indicator::MacdSignal, vec![Some(0.0), Some(0.0)]),
                (Indicator::MacdHistogram, vec![Some(1.0), Some(-3.0)]),
            ],
        );
        let s = MacdSignalGenerator.evaluate(&t);
        assert_eq!(s.signal, SignalKind::Sell);
        assert_eq!(s.strength, 1.0);
    }

    #[test]
    fn test_bollinger_penetration_strength() {
        let columns = [
            (Indicator::BbUpper, vec![Some(110.0)]),
            (Indicator::BbLower, vec![Some(100.0)]),
        ];
        let s = BollingerSignalGenerator.evaluate(&table(1, &[99.0], &columns));
        assert_eq!(s.signal, SignalKind::Buy);
        assert!((s.strength - 0.1).abs() < 1e-12);

        let s = BollingerSignalGenerator.evaluate(&table(1, &[121.0], &columns));
        assert_eq!(s.signal, SignalKind::Sell);
        assert_eq!(s.strength, 1.0);

        let mut t = table(1, &[105.0], &columns);
        t.indicators.insert(Indicator::BbPosition, vec![Some(0.5)]);
        let s = BollingerSignalGenerator.evaluate(&t);
        assert_eq!(s.signal, SignalKind::Hold);
        assert_eq!(s.reason, "Price within Bollinger Bands (position: 0.50)");
    }

    #[test]
    fn test_golden_cross_fires_at_known_index() {
        // flat at 100 for 60 bars; SMA20 and SMA50 are equal until bar 60
        let closes = flat_then_rising(60, 70);
        let gen = MovingAverageSignalGenerator;

        let before = gen.evaluate(&computed(&closes[..60], 1000.0));
        assert_eq!(before.reason, "No MA crossover");

        let at = gen.evaluate(&computed(&closes[..61], 1000.0));
        assert_eq!(at.signal, SignalKind::Buy);
        assert_eq!(at.strength, 0.8);
        assert!(at.reason.contains("Golden Cross"));

        let after = gen.evaluate(&computed(&closes[..62], 1000.0));
        assert_eq!(after.signal, SignalKind::Hold);
    }

    #[test]
    fn test_death_cross_mirror() {
        let closes: Vec<f64> = (0..61)
            .map(|i| if i < 60 { 100.0 } else { 99.0 })
            .collect();
        let s = MovingAverageSignalGenerator.evaluate(&computed(&closes, 1000.0));
        assert_eq!(s.signal, SignalKind::Sell);
        assert!(s.reason.contains("Death Cross"));
        // SMA200 not yet available, so no trend is reported
        assert_eq!(s.trend, None);
    }

    fn volume_spike(spike: f64, last_close: f64) -> IndicatorTable {
        let mut t = table(21, &[10.0; 21], &[(Indicator::Obv, vec![Some(0.0); 21])]);
        let mut volumes = vec![Some(100.0); 21];
        volumes[20] = Some(spike);
        t.prices.insert(Column::Volume, volumes);
        let mut closes = vec![Some(10.0); 21];
        closes[20] = Some(last_close);
        t.prices.insert(Column::Close, closes);
        t
    }

    #[test]
    fn test_volume_spike_with_price_direction() {
        let s = VolumeSignalGenerator::default().evaluate(&volume_spike(300.0, 11.0));
        // average over the last 20 bars: (19 * 100 + 300) / 20 = 110
        let ratio = 300.0 / 110.0;
        assert_eq!(s.signal, SignalKind::Buy);
        assert!((s.strength - ratio / 5.0).abs() < 1e-12);
        assert_eq!(s.reason, format!("High volume price increase (volume ratio: {:.2})", ratio));

        let s = VolumeSignalGenerator::default().evaluate(&volume_spike(300.0, 9.0));
        assert_eq!(s.signal, SignalKind::Sell);
        assert!((s.strength - ratio / 5.0).abs() < 1e-12);
        assert_eq!(s.reason, format!("High volume price decrease (volume ratio: {:.2})", ratio));
    }

    #[test]
    fn test_volume_spike_strength_capped() {
        // 1000 / 145 is almost 7x the average, well past the 5x cap
        let s = VolumeSignalGenerator::default().evaluate(&volume_spike(1000.0, 11.0));
        assert_eq!(s.signal, SignalKind::Buy);
        assert_eq!(s.strength, 1.0);
        assert!((s.metrics["volume_ratio"] - 1000.0 / 145.0).abs() < 1e-12);
    }

    #[test]
    fn test_volume_normal() {
        let t = table(5, &[10.0; 5], &[(Indicator::Obv, vec![Some(0.0); 5])]);
        let s = VolumeSignalGenerator::default().evaluate(&t);
        assert_eq!(s.signal, SignalKind::Hold);
        assert_eq!(s.reason, "Normal volume (ratio: 1.00)");
    }

    #[test]
    fn test_generate_signals_skips_absent_families() {
        let t = table(1, &[10.0], &[(Indicator::Rsi, vec![Some(50.0)])]);
        let signals = generate_signals(&t, &build_signal_generators());
        assert_eq!(signals.len(), 1);
        assert!(signals.contains_key(&SignalFamily::Rsi));

        let empty = generate_signals(&IndicatorTable::empty("E"), &build_signal_generators());
        assert!(empty.is_empty());
    }

    #[test]
    fn test_family_serializes_to_report_names() {
        assert_eq!(
            serde_json::to_string(&SignalFamily::BollingerBands).unwrap(),
            "\"Bollinger_Bands\""
        );
    }
}
