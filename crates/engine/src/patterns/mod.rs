//! Pattern detection
//!
//! Detectors scan the price columns of an [`IndicatorTable`] and emit
//! [`PatternEvent`]s. Every detector runs on its own: one that fails is
//! logged and skipped, and one that lacks history returns nothing.

pub mod candlestick;
pub mod chart;
pub mod cluster;
pub mod levels;

use tracing::{debug, warn};

use crate::config::PatternConfig;
use crate::error::{AnalysisError, Result};
use crate::indicators::IndicatorTable;
use crate::types::{Direction, PatternCategory, PatternEvent};

pub use candlestick::{CandlePattern, CandlestickDetector};
pub use chart::{DoubleTopBottomDetector, HeadAndShouldersDetector, TriangleDetector};
pub use levels::SupportResistanceDetector;

/// A single pattern family
pub trait PatternDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, table: &IndicatorTable, config: &PatternConfig) -> Result<Vec<PatternEvent>>;
}

pub fn build_pattern_detectors() -> Vec<Box<dyn PatternDetector>> {
    vec![
        Box::new(CandlestickDetector::default()),
        Box::new(HeadAndShouldersDetector),
        Box::new(TriangleDetector),
        Box::new(DoubleTopBottomDetector),
        Box::new(SupportResistanceDetector),
    ]
}

/// Run every detector, in order, collecting their events
pub fn detect_patterns(
    table: &IndicatorTable,
    detectors: &[Box<dyn PatternDetector>],
    config: &PatternConfig,
) -> Vec<PatternEvent> {
    if table.is_empty() {
        return Vec::new();
    }
    let mut events = Vec::new();
    for detector in detectors {
        match detector.detect(table, config) {
            Ok(found) => {
                debug!(
                    symbol = %table.symbol,
                    detector = detector.name(),
                    events = found.len(),
                    "Patterns detected"
                );
                events.extend(found);
            }
            Err(e @ AnalysisError::InsufficientHistory { .. }) => {
                debug!(symbol = %table.symbol, detector = detector.name(), reason = %e, "Detector skipped");
            }
            Err(e) => {
                warn!(symbol = %table.symbol, detector = detector.name(), error = %e, "Detector failed, skipping it");
            }
        }
    }
    events
}

/// Fails with `InsufficientHistory` when the table is shorter than `required`
pub(crate) fn require_history(
    table: &IndicatorTable,
    detector: &'static str,
    required: usize,
) -> Result<()> {
    if table.len() < required {
        return Err(AnalysisError::insufficient(detector, required, table.len()));
    }
    Ok(())
}

pub(crate) fn event(
    table: &IndicatorTable,
    pattern: impl Into<String>,
    category: PatternCategory,
    index: usize,
    direction: Direction,
    strength: f64,
) -> PatternEvent {
    PatternEvent {
        pattern: pattern.into(),
        category,
        index,
        date: table.dates[index],
        direction,
        strength,
        attributes: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::indicators::IndicatorEngine;
    use crate::testutil::bars_from_closes;
    use crate::types::PriceSeries;

    struct Failing;

    impl PatternDetector for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&self, _: &IndicatorTable, _: &PatternConfig) -> Result<Vec<PatternEvent>> {
            Err(AnalysisError::Backend {
                indicator: "failing",
                reason: "boom".to_string(),
            })
        }
    }

    fn table(closes: &[f64]) -> IndicatorTable {
        IndicatorEngine::new(&AnalysisConfig::default())
            .compute(&PriceSeries::new("P", bars_from_closes(closes, 100.0)))
            .unwrap()
    }

    #[test]
    fn test_empty_table_has_no_patterns() {
        let events = detect_patterns(
            &IndicatorTable::empty("E"),
            &build_pattern_detectors(),
            &PatternConfig::default(),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_short_history_degrades_to_empty() {
        let t = table(&[10.0, 10.5, 11.0]);
        let config = PatternConfig::default();
        for detector in build_pattern_detectors().iter().skip(1) {
            let events = detect_patterns(&t, std::slice::from_ref(detector), &config);
            assert!(events.is_empty(), "{} fired on 3 bars", detector.name());
        }
    }

    #[test]
    fn test_failing_detector_is_isolated() {
        let t = table(&[100.0; 40]);
        let detectors: Vec<Box<dyn PatternDetector>> =
            vec![Box::new(Failing), Box::new(TriangleDetector)];
        let events = detect_patterns(&t, &detectors, &PatternConfig::default());
        // flat highs and lows form a rectangle
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.category == PatternCategory::Chart));
    }
}
