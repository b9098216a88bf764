//! Support and resistance levels from clustered highs and lows

use crate::config::PatternConfig;
use crate::error::Result;
use crate::indicators::IndicatorTable;
use crate::series;
use crate::types::{Column, Direction, PatternCategory, PatternEvent};

use super::cluster::{dbscan, groups};
use super::{event, require_history, PatternDetector};

const MIN_BARS: usize = 20;

pub struct SupportResistanceDetector;

impl PatternDetector for SupportResistanceDetector {
    fn name(&self) -> &'static str {
        "support_resistance"
    }

    fn detect(&self, table: &IndicatorTable, config: &PatternConfig) -> Result<Vec<PatternEvent>> {
        require_history(table, self.name(), MIN_BARS)?;
        let Some(close) = series::last(table.price(Column::Close)) else {
            return Ok(Vec::new());
        };

        let start = table.len().saturating_sub(config.level_lookback);
        let highs = &table.price(Column::High)[start..];
        let lows = &table.price(Column::Low)[start..];
        let points: Vec<f64> = highs.iter().chain(lows.iter()).flatten().copied().collect();

        let labels = dbscan(&points, config.level_tolerance, config.min_cluster_size);
        let last = table.len() - 1;
        let events = groups(&points, &labels)
            .into_iter()
            .map(|members| {
                let level = members.iter().sum::<f64>() / members.len() as f64;
                let (name, level_type) = if level > close {
                    ("Resistance Level", 1.0)
                } else {
                    ("Support Level", -1.0)
                };
                event(
                    table,
                    name,
                    PatternCategory::SupportResistance,
                    last,
                    Direction::Neutral,
                    0.8,
                )
                .with_attribute("level", level)
                .with_attribute("cluster_size", members.len() as f64)
                .with_attribute("level_type", level_type)
            })
            .collect();
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::day;

    fn table(highs: &[f64], lows: &[f64], close: f64) -> IndicatorTable {
        let n = highs.len();
        let mut t = IndicatorTable::empty("SR");
        t.dates = (0..n as i64).map(day).collect();
        t.prices
            .insert(Column::High, highs.iter().map(|v| Some(*v)).collect());
        t.prices
            .insert(Column::Low, lows.iter().map(|v| Some(*v)).collect());
        t.prices.insert(Column::Close, vec![Some(close); n]);
        t
    }

    #[test]
    fn test_repeated_highs_and_lows_become_levels() {
        // highs alternate between a ceiling at 110 and scattered values
        let highs: Vec<f64> = (0..30)
            .map(|i| if i % 3 == 0 { 110.0 } else { 104.0 + i as f64 * 0.1 })
            .collect();
        let lows: Vec<f64> = (0..30)
            .map(|i| if i % 3 == 0 { 90.0 } else { 95.0 + i as f64 * 0.1 })
            .collect();
        let events = SupportResistanceDetector
            .detect(&table(&highs, &lows, 100.0), &PatternConfig::default())
            .unwrap();

        assert_eq!(events.len(), 2);
        let resistance = events.iter().find(|e| e.pattern == "Resistance Level").unwrap();
        assert_eq!(resistance.attributes["level"], 110.0);
        assert_eq!(resistance.attributes["cluster_size"], 10.0);
        assert_eq!(resistance.attributes["level_type"], 1.0);
        assert_eq!(resistance.index, 29);
        assert_eq!(resistance.category, PatternCategory::SupportResistance);

        let support = events.iter().find(|e| e.pattern == "Support Level").unwrap();
        assert_eq!(support.attributes["level"], 90.0);
        assert_eq!(support.direction, Direction::Neutral);
        assert_eq!(support.strength, 0.8);
    }

    #[test]
    fn test_only_trailing_window_is_clustered() {
        // an old ceiling outside the last 50 bars is ignored
        let highs: Vec<f64> = (0..80)
            .map(|i| if i < 30 { 150.0 } else { 100.0 + i as f64 })
            .collect();
        let lows: Vec<f64> = highs.iter().map(|h| h - 5.0).collect();
        let events = SupportResistanceDetector
            .detect(&table(&highs, &lows, 120.0), &PatternConfig::default())
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_short_history_is_skipped() {
        let result = SupportResistanceDetector.detect(
            &table(&[1.0; 10], &[0.5; 10], 0.8),
            &PatternConfig::default(),
        );
        assert!(result.is_err());
    }
}
