//! Candlestick catalog
//!
//! Each [`CandlePattern`] is a pure rule over a fixed window of candles
//! ending at the bar being scored. A rule returns +100 (bullish), -100
//! (bearish) or 0 (no pattern).

use serde::{Deserialize, Serialize};

use crate::config::PatternConfig;
use crate::error::Result;
use crate::indicators::IndicatorTable;
use crate::types::{Column, Direction, PatternCategory, PatternEvent};

use super::{event, PatternDetector};

const BULLISH: i32 = 100;
const BEARISH: i32 = -100;

/// Bars of prior trend checked by the hammer family
const TREND_BARS: usize = 3;

// ============================================================================
// Candle geometry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
        }
    }

    fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    fn range(&self) -> f64 {
        self.high - self.low
    }

    fn body_top(&self) -> f64 {
        self.open.max(self.close)
    }

    fn body_bottom(&self) -> f64 {
        self.open.min(self.close)
    }

    fn upper_shadow(&self) -> f64 {
        self.high - self.body_top()
    }

    fn lower_shadow(&self) -> f64 {
        self.body_bottom() - self.low
    }

    fn midpoint(&self) -> f64 {
        (self.open + self.close) / 2.0
    }

    fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    fn colour(&self) -> i32 {
        if self.is_bullish() {
            BULLISH
        } else if self.is_bearish() {
            BEARISH
        } else {
            0
        }
    }

    fn is_doji(&self) -> bool {
        self.range() > 0.0 && self.body() <= 0.1 * self.range()
    }

    fn is_long(&self) -> bool {
        self.range() > 0.0 && self.body() >= 0.6 * self.range()
    }

    /// Small body at the top, long lower shadow
    fn hammer_shape(&self) -> bool {
        let range = self.range();
        range > 0.0
            && self.body() <= 0.35 * range
            && self.lower_shadow() >= 2.0 * self.body()
            && self.lower_shadow() >= 0.5 * range
            && self.upper_shadow() <= 0.1 * range
    }

    /// Small body at the bottom, long upper shadow
    fn inverted_shape(&self) -> bool {
        let range = self.range();
        range > 0.0
            && self.body() <= 0.35 * range
            && self.upper_shadow() >= 2.0 * self.body()
            && self.upper_shadow() >= 0.5 * range
            && self.lower_shadow() <= 0.1 * range
    }
}

fn falling(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[1].close < w[0].close)
}

fn rising(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[1].close > w[0].close)
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandlePattern {
    Doji,
    DragonflyDoji,
    GravestoneDoji,
    Hammer,
    HangingMan,
    InvertedHammer,
    ShootingStar,
    Marubozu,
    SpinningTop,
    Engulfing,
    Harami,
    PiercingLine,
    DarkCloudCover,
    MorningStar,
    EveningStar,
    ThreeWhiteSoldiers,
    ThreeBlackCrows,
}

impl CandlePattern {
    pub const ALL: [CandlePattern; 17] = [
        Self::Doji,
        Self::DragonflyDoji,
        Self::GravestoneDoji,
        Self::Hammer,
        Self::HangingMan,
        Self::InvertedHammer,
        Self::ShootingStar,
        Self::Marubozu,
        Self::SpinningTop,
        Self::Engulfing,
        Self::Harami,
        Self::PiercingLine,
        Self::DarkCloudCover,
        Self::MorningStar,
        Self::EveningStar,
        Self::ThreeWhiteSoldiers,
        Self::ThreeBlackCrows,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Doji => "Doji",
            Self::DragonflyDoji => "Dragonfly Doji",
            Self::GravestoneDoji => "Gravestone Doji",
            Self::Hammer => "Hammer",
            Self::HangingMan => "Hanging Man",
            Self::InvertedHammer => "Inverted Hammer",
            Self::ShootingStar => "Shooting Star",
            Self::Marubozu => "Marubozu",
            Self::SpinningTop => "Spinning Top",
            Self::Engulfing => "Engulfing Pattern",
            Self::Harami => "Harami Pattern",
            Self::PiercingLine => "Piercing Line",
            Self::DarkCloudCover => "Dark Cloud Cover",
            Self::MorningStar => "Morning Star",
            Self::EveningStar => "Evening Star",
            Self::ThreeWhiteSoldiers => "Three White Soldiers",
            Self::ThreeBlackCrows => "Three Black Crows",
        }
    }

    /// Candles the rule looks at, the scored bar last
    pub fn window(&self) -> usize {
        match self {
            Self::Doji
            | Self::DragonflyDoji
            | Self::GravestoneDoji
            | Self::Marubozu
            | Self::SpinningTop => 1,
            Self::Hammer | Self::HangingMan | Self::InvertedHammer | Self::ShootingStar => {
                TREND_BARS + 1
            }
            Self::Engulfing | Self::Harami | Self::PiercingLine | Self::DarkCloudCover => 2,
            Self::MorningStar
            | Self::EveningStar
            | Self::ThreeWhiteSoldiers
            | Self::ThreeBlackCrows => 3,
        }
    }

    /// Raw score for `candles`, which must hold exactly `window()` candles
    pub fn evaluate(&self, candles: &[Candle]) -> i32 {
        if candles.len() != self.window() {
            return 0;
        }
        let c = candles[candles.len() - 1];
        let fired = |hit: bool, score: i32| if hit { score } else { 0 };

        match self {
            Self::Doji => fired(c.is_doji(), BULLISH),
            Self::DragonflyDoji => fired(
                c.is_doji()
                    && c.upper_shadow() <= 0.1 * c.range()
                    && c.lower_shadow() >= 0.6 * c.range(),
                BULLISH,
            ),
            Self::GravestoneDoji => fired(
                c.is_doji()
                    && c.lower_shadow() <= 0.1 * c.range()
                    && c.upper_shadow() >= 0.6 * c.range(),
                BEARISH,
            ),
            Self::Hammer => fired(falling(&candles[..TREND_BARS]) && c.hammer_shape(), BULLISH),
            Self::HangingMan => fired(rising(&candles[..TREND_BARS]) && c.hammer_shape(), BEARISH),
            Self::InvertedHammer => {
                fired(falling(&candles[..TREND_BARS]) && c.inverted_shape(), BULLISH)
            }
            Self::ShootingStar => {
                fired(rising(&candles[..TREND_BARS]) && c.inverted_shape(), BEARISH)
            }
            Self::Marubozu => {
                let shaved = c.upper_shadow() <= 0.05 * c.range() && c.lower_shadow() <= 0.05 * c.range();
                fired(c.range() > 0.0 && c.body() >= 0.9 * c.range() && shaved, c.colour())
            }
            Self::SpinningTop => {
                let small = c.body() > 0.1 * c.range() && c.body() <= 0.3 * c.range();
                fired(
                    small && c.upper_shadow() > c.body() && c.lower_shadow() > c.body(),
                    c.colour(),
                )
            }
            Self::Engulfing => {
                let p = candles[0];
                let wraps = c.body_top() >= p.body_top()
                    && c.body_bottom() <= p.body_bottom()
                    && c.body() > p.body();
                if wraps && p.is_bearish() && c.is_bullish() {
                    BULLISH
                } else if wraps && p.is_bullish() && c.is_bearish() {
                    BEARISH
                } else {
                    0
                }
            }
            Self::Harami => {
                let p = candles[0];
                let inside = p.is_long()
                    && c.body_top() < p.body_top()
                    && c.body_bottom() > p.body_bottom();
                if inside && p.is_bearish() && c.is_bullish() {
                    BULLISH
                } else if inside && p.is_bullish() && c.is_bearish() {
                    BEARISH
                } else {
                    0
                }
            }
            Self::PiercingLine => {
                let p = candles[0];
                fired(
                    p.is_long()
                        && p.is_bearish()
                        && c.is_bullish()
                        && c.open < p.low
                        && c.close > p.midpoint()
                        && c.close < p.open,
                    BULLISH,
                )
            }
            Self::DarkCloudCover => {
                let p = candles[0];
                fired(
                    p.is_long()
                        && p.is_bullish()
                        && c.is_bearish()
                        && c.open > p.high
                        && c.close < p.midpoint()
                        && c.close > p.open,
                    BEARISH,
                )
            }
            Self::MorningStar => {
                let (first, star) = (candles[0], candles[1]);
                fired(
                    first.is_long()
                        && first.is_bearish()
                        && star.body() <= 0.3 * first.body()
                        && star.body_top() < first.close
                        && c.is_bullish()
                        && c.close > first.midpoint(),
                    BULLISH,
                )
            }
            Self::EveningStar => {
                let (first, star) = (candles[0], candles[1]);
                fired(
                    first.is_long()
                        && first.is_bullish()
                        && star.body() <= 0.3 * first.body()
                        && star.body_bottom() > first.close
                        && c.is_bearish()
                        && c.close < first.midpoint(),
                    BEARISH,
                )
            }
            Self::ThreeWhiteSoldiers => fired(
                candles.iter().all(|k| k.is_long() && k.is_bullish())
                    && rising(candles)
                    && candles
                        .windows(2)
                        .all(|w| w[1].open > w[0].open && w[1].open <= w[0].close),
                BULLISH,
            ),
            Self::ThreeBlackCrows => fired(
                candles.iter().all(|k| k.is_long() && k.is_bearish())
                    && falling(candles)
                    && candles
                        .windows(2)
                        .all(|w| w[1].open < w[0].open && w[1].open >= w[0].close),
                BEARISH,
            ),
        }
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Scores every catalog entry at every bar
pub struct CandlestickDetector {
    catalog: Vec<CandlePattern>,
}

impl CandlestickDetector {
    pub fn new(catalog: Vec<CandlePattern>) -> Self {
        Self { catalog }
    }
}

impl Default for CandlestickDetector {
    fn default() -> Self {
        Self::new(CandlePattern::ALL.to_vec())
    }
}

impl PatternDetector for CandlestickDetector {
    fn name(&self) -> &'static str {
        "candlestick"
    }

    fn detect(&self, table: &IndicatorTable, _config: &PatternConfig) -> Result<Vec<PatternEvent>> {
        let (open, high, low, close) = (
            table.price(Column::Open),
            table.price(Column::High),
            table.price(Column::Low),
            table.price(Column::Close),
        );
        let candles: Vec<Option<Candle>> = (0..table.len())
            .map(|i| match (open.get(i), high.get(i), low.get(i), close.get(i)) {
                (Some(Some(o)), Some(Some(h)), Some(Some(l)), Some(Some(c))) => {
                    Some(Candle::new(*o, *h, *l, *c))
                }
                _ => None,
            })
            .collect();

        let mut events = Vec::new();
        for pattern in &self.catalog {
            let window = pattern.window();
            for end in window.saturating_sub(1)..candles.len() {
                // windows touching a bar with missing prices are skipped
                let Some(bars) = candles[end + 1 - window..=end]
                    .iter()
                    .copied()
                    .collect::<Option<Vec<Candle>>>()
                else {
                    continue;
                };
                let raw = pattern.evaluate(&bars);
                if raw == 0 {
                    continue;
                }
                let direction = if raw > 0 {
                    Direction::Bullish
                } else {
                    Direction::Bearish
                };
                events.push(
                    event(
                        table,
                        pattern.name(),
                        PatternCategory::Candlestick,
                        end,
                        direction,
                        (raw.abs() as f64 / 100.0).min(1.0),
                    )
                    .with_attribute("value", raw as f64),
                );
            }
        }
        Ok(events)
    }
}
