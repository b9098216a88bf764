//! Single-symbol analysis pipeline
//!
//! indicators -> patterns -> signals -> combined signal, all in memory. An
//! [`Analyzer`] holds no per-call state, so one instance can serve any
//! number of symbols concurrently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::fusion::{combine_signals, fuse};
use crate::indicators::{IndicatorEngine, IndicatorSnapshot, IndicatorTable};
use crate::patterns::{build_pattern_detectors, detect_patterns, PatternDetector};
use crate::signals::{build_signal_generators, generate_signals, SignalFamily, SignalGenerator};
use crate::types::{FusedRecommendation, PatternEvent, PriceSeries, Signal};

/// Everything derived from one price series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub symbol: String,
    pub bars: usize,
    /// Every column at the last bar
    pub latest: Option<IndicatorSnapshot>,
    /// Full table, only when `include_series` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<IndicatorTable>,
    pub patterns: Vec<PatternEvent>,
    pub signals: BTreeMap<SignalFamily, Signal>,
    /// `None` only when there were no bars to analyze
    pub combined: Option<Signal>,
}

impl Analysis {
    fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            bars: 0,
            latest: None,
            table: None,
            patterns: Vec::new(),
            signals: BTreeMap::new(),
            combined: None,
        }
    }
}

pub struct Analyzer {
    config: AnalysisConfig,
    generators: Vec<Box<dyn SignalGenerator>>,
    detectors: Vec<Box<dyn PatternDetector>>,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            generators: build_signal_generators(),
            detectors: build_pattern_detectors(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one series.
    ///
    /// Only a missing OHLCV column is an error. Short or empty history
    /// yields missing values, fewer patterns and neutral signals.
    pub fn analyze(&self, series: &PriceSeries) -> Result<Analysis> {
        if series.is_empty() {
            info!(symbol = %series.symbol, "Empty series, nothing to analyze");
            return Ok(Analysis::empty(&series.symbol));
        }

        let table = IndicatorEngine::new(&self.config).compute(series)?;
        let patterns = detect_patterns(&table, &self.detectors, &self.config.patterns);
        let signals = generate_signals(&table, &self.generators);
        let combined = combine_signals(&signals, &self.config);

        info!(
            symbol = %series.symbol,
            bars = series.len(),
            patterns = patterns.len(),
            signal = %combined.signal,
            strength = combined.strength,
            "Analysis complete"
        );

        Ok(Analysis {
            symbol: series.symbol.clone(),
            bars: series.len(),
            latest: table.latest_snapshot(),
            table: self.config.include_series.then_some(table),
            patterns,
            signals,
            combined: Some(combined),
        })
    }

    /// Fuse an analysis with an optional fundamental call
    pub fn recommend(&self, analysis: &Analysis, fundamental: Option<&Signal>) -> FusedRecommendation {
        let technical = analysis
            .combined
            .clone()
            .unwrap_or_else(|| Signal::hold("No technical data"));
        fuse(&technical, fundamental, &self.config)
    }
}

/// One-shot analysis with a throwaway [`Analyzer`]
pub fn analyze(series: &PriceSeries, config: &AnalysisConfig) -> Result<Analysis> {
    Analyzer::new(config.clone())?.analyze(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::testutil::{bars_from_closes, flat_then_rising};
    use crate::types::{Direction, SignalKind};

    fn analyzer() -> Analyzer {
        Analyzer::new(AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_series() {
        let analysis = analyzer().analyze(&PriceSeries::empty("NONE")).unwrap();
        assert_eq!(analysis.bars, 0);
        assert!(analysis.latest.is_none());
        assert!(analysis.patterns.is_empty());
        assert!(analysis.signals.is_empty());
        assert!(analysis.combined.is_none());

        let fused = analyzer().recommend(&analysis, None);
        assert_eq!(fused.signal, SignalKind::Hold);
    }

    #[test]
    fn test_missing_column_aborts() {
        let mut bars = bars_from_closes(&[1.0; 30], 10.0);
        for bar in &mut bars {
            bar.high = None;
        }
        let err = analyzer().analyze(&PriceSeries::new("BAD", bars)).unwrap_err();
        assert_eq!(err, AnalysisError::MissingColumn { column: "High" });
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalysisConfig {
            bollinger_period: 0,
            ..Default::default()
        };
        assert!(Analyzer::new(config).is_err());
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let closes: Vec<f64> = (0..250)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1)
            .collect();
        let series = PriceSeries::new("SINE", bars_from_closes(&closes, 5000.0));
        let config = AnalysisConfig {
            include_series: true,
            ..Default::default()
        };
        let first = analyze(&series, &config).unwrap();
        let second = analyze(&series, &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert!(first.table.is_some());
    }

    #[test]
    fn test_uptrend_after_flat_base() {
        // 60 flat bars then a steady climb to 300 bars
        let closes = flat_then_rising(60, 300);
        let bars = bars_from_closes(&closes, 1000.0);
        let analyzer = analyzer();

        let at_cross = analyzer
            .analyze(&PriceSeries::new("UP", bars[..61].to_vec()))
            .unwrap();
        let ma = &at_cross.signals[&SignalFamily::MovingAverages];
        assert!(ma.reason.contains("Golden Cross"));
        assert_eq!(at_cross.signals[&SignalFamily::Macd].signal, SignalKind::Buy);

        let end = analyzer.analyze(&PriceSeries::new("UP", bars)).unwrap();
        let rsi = &end.signals[&SignalFamily::Rsi];
        assert_eq!(rsi.signal, SignalKind::Sell);
        assert_eq!(rsi.reason, "RSI overbought at 100.00");
        assert_eq!(
            end.signals[&SignalFamily::MovingAverages].trend,
            Some(Direction::Bullish)
        );

        // overbought RSI is the only active call once the crossovers are behind us
        let combined = end.combined.unwrap();
        assert_eq!(combined.signal, SignalKind::Hold);
        assert!((combined.metrics["score"] + 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_all_families_reported_for_long_series() {
        let closes = flat_then_rising(60, 300);
        let analysis = analyzer()
            .analyze(&PriceSeries::new("UP", bars_from_closes(&closes, 1000.0)))
            .unwrap();
        for family in SignalFamily::ALL {
            assert!(analysis.signals.contains_key(&family), "{} missing", family);
        }
        let latest = analysis.latest.unwrap();
        assert!(latest.values["SMA_200"].is_some());
        assert!(analysis.table.is_none());
    }

    #[test]
    fn test_recommend_blends_fundamental() {
        let closes = flat_then_rising(60, 300);
        let analyzer = analyzer();
        let analysis = analyzer
            .analyze(&PriceSeries::new("UP", bars_from_closes(&closes, 1000.0)))
            .unwrap();
        let fused = analyzer.recommend(&analysis, Some(&Signal::buy(0.9, "cheap")));
        assert!((fused.fundamental_contribution - 0.36).abs() < 1e-9);
        assert_eq!(fused.technical_contribution, 0.0);
        assert_eq!(fused.signal, SignalKind::Buy);
    }
}
