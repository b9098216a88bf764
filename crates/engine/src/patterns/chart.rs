//! Chart-geometry patterns: head-and-shoulders, triangles, double top/bottom

use crate::config::PatternConfig;
use crate::error::Result;
use crate::indicators::IndicatorTable;
use crate::series;
use crate::types::{Column, Direction, PatternCategory, PatternEvent};

use super::{event, require_history, PatternDetector};

const MIN_BARS: usize = 20;
const SHOULDER_SPAN: usize = 5;

/// Present values of a trailing window, or `None` if any is missing
fn complete_tail(values: &[Option<f64>], len: usize) -> Option<Vec<f64>> {
    values[values.len().saturating_sub(len)..]
        .iter()
        .copied()
        .collect()
}

/// Index and value of the first maximum among the present values of `range`
fn window_max(values: &[Option<f64>], range: std::ops::Range<usize>) -> Option<(usize, f64)> {
    range
        .filter_map(|i| values[i].map(|v| (i, v)))
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}

// ============================================================================
// Head and shoulders
// ============================================================================

/// Three adjacent 5-bar windows of highs around a sliding pivot
pub struct HeadAndShouldersDetector;

impl PatternDetector for HeadAndShouldersDetector {
    fn name(&self) -> &'static str {
        "head_and_shoulders"
    }

    fn detect(&self, table: &IndicatorTable, config: &PatternConfig) -> Result<Vec<PatternEvent>> {
        require_history(table, self.name(), MIN_BARS)?;
        let highs = table.price(Column::High);
        let span = SHOULDER_SPAN;

        let mut events: Vec<PatternEvent> = Vec::new();
        // pivots keep two full spans of room on each side
        for i in 2 * span..highs.len() - 2 * span {
            let (Some((_, left)), Some((head_idx, head)), Some((_, right))) = (
                window_max(highs, i - span..i),
                window_max(highs, i..i + span),
                window_max(highs, i + span..i + 2 * span),
            ) else {
                continue;
            };
            if !(head > left && head > right) {
                continue;
            }
            // a zero left shoulder gives NaN, which never counts as close
            let gap = (left - right).abs() / left;
            if gap.is_nan() || gap >= config.shoulder_tolerance {
                continue;
            }
            // neighbouring pivots often find the same head
            if events.iter().any(|e| e.index == head_idx) {
                continue;
            }
            events.push(
                event(
                    table,
                    "Head and Shoulders",
                    PatternCategory::Chart,
                    head_idx,
                    Direction::Bearish,
                    0.8,
                )
                .with_attribute("left_shoulder", left)
                .with_attribute("head", head)
                .with_attribute("right_shoulder", right),
            );
        }
        Ok(events)
    }
}

// ============================================================================
// Triangles
// ============================================================================

/// Trendline slopes of the trailing highs and lows
pub struct TriangleDetector;

impl TriangleDetector {
    pub fn classify(high_slope: f64, low_slope: f64, threshold: f64) -> Option<&'static str> {
        let flat = |s: f64| s.abs() < threshold;
        let up = |s: f64| s > threshold;
        let down = |s: f64| s < -threshold;

        if flat(high_slope) && flat(low_slope) {
            Some("Rectangle")
        } else if down(high_slope) && up(low_slope) {
            Some("Ascending Triangle")
        } else if down(high_slope) && (down(low_slope) || flat(low_slope)) {
            Some("Descending Triangle")
        } else if flat(high_slope) && up(low_slope) {
            Some("Ascending Triangle")
        } else {
            None
        }
    }
}

impl PatternDetector for TriangleDetector {
    fn name(&self) -> &'static str {
        "triangles"
    }

    fn detect(&self, table: &IndicatorTable, config: &PatternConfig) -> Result<Vec<PatternEvent>> {
        require_history(table, self.name(), MIN_BARS.max(config.chart_lookback))?;
        let lookback = config.chart_lookback;
        let (Some(highs), Some(lows)) = (
            complete_tail(table.price(Column::High), lookback),
            complete_tail(table.price(Column::Low), lookback),
        ) else {
            return Ok(Vec::new());
        };
        let (Some((high_slope, _)), Some((low_slope, _))) =
            (series::linear_fit(&highs), series::linear_fit(&lows))
        else {
            return Ok(Vec::new());
        };

        let Some(shape) = Self::classify(high_slope, low_slope, config.slope_threshold) else {
            return Ok(Vec::new());
        };
        Ok(vec![event(
            table,
            shape,
            PatternCategory::Chart,
            table.len() - 1,
            Direction::Neutral,
            0.6,
        )
        .with_attribute("high_slope", high_slope)
        .with_attribute("low_slope", low_slope)])
    }
}

// ============================================================================
// Double top / bottom
// ============================================================================

/// Compares the two most recent strict local extrema of the trailing window
pub struct DoubleTopBottomDetector;

fn peaks(values: &[f64]) -> Vec<f64> {
    values
        .windows(3)
        .filter(|w| w[1] > w[0] && w[1] > w[2])
        .map(|w| w[1])
        .collect()
}

fn troughs(values: &[f64]) -> Vec<f64> {
    values
        .windows(3)
        .filter(|w| w[1] < w[0] && w[1] < w[2])
        .map(|w| w[1])
        .collect()
}

/// Last two extrema, if they sit within `tolerance` of the first one
fn last_pair(extrema: &[f64], tolerance: f64) -> Option<(f64, f64)> {
    let [.., first, second] = extrema else {
        return None;
    };
    ((first - second).abs() / first < tolerance).then_some((*first, *second))
}

impl PatternDetector for DoubleTopBottomDetector {
    fn name(&self) -> &'static str {
        "double_top_bottom"
    }

    fn detect(&self, table: &IndicatorTable, config: &PatternConfig) -> Result<Vec<PatternEvent>> {
        require_history(table, self.name(), MIN_BARS.max(config.chart_lookback))?;
        let lookback = config.chart_lookback;
        let (Some(highs), Some(lows)) = (
            complete_tail(table.price(Column::High), lookback),
            complete_tail(table.price(Column::Low), lookback),
        ) else {
            return Ok(Vec::new());
        };
        let last = table.len() - 1;

        let mut events = Vec::new();
        if let Some((peak1, peak2)) = last_pair(&peaks(&highs), config.double_tolerance) {
            events.push(
                event(table, "Double Top", PatternCategory::Chart, last, Direction::Bearish, 0.7)
                    .with_attribute("peak1", peak1)
                    .with_attribute("peak2", peak2),
            );
        }
        if let Some((trough1, trough2)) = last_pair(&troughs(&lows), config.double_tolerance) {
            events.push(
                event(table, "Double Bottom", PatternCategory::Chart, last, Direction::Bullish, 0.7)
                    .with_attribute("trough1", trough1)
                    .with_attribute("trough2", trough2),
            );
        }
        Ok(events)
    }
}
