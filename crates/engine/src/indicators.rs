//! Indicator engine
//!
//! Turns a [`PriceSeries`] into an [`IndicatorTable`]: one aligned column per
//! indicator, next to the raw OHLCV columns. Indicator families are computed
//! independently; a family that fails is logged and left out of the table
//! while the others carry on.

use std::collections::BTreeMap;
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ta::indicators::{
    AverageTrueRange, BollingerBands, MovingAverageConvergenceDivergence, RelativeStrengthIndex,
    SlowStochastic,
};
use ta::{DataItem, Next};
use tracing::{debug, error, warn};

use crate::config::{AnalysisConfig, IndicatorBackend};
use crate::error::{AnalysisError, Result};
use crate::series::{self, finite, Series};
use crate::types::{Column, PriceSeries};

const STOCH_PERIOD: usize = 14;
const WILLIAMS_PERIOD: usize = 14;
const ATR_PERIOD: usize = 14;
const MFI_PERIOD: usize = 14;
const MOMENTUM_LOOKBACK: usize = 10;
const CCI_PERIOD: usize = 20;
const CCI_SCALE: f64 = 0.015;
const TREND_PERIOD: usize = 14;
const STOP_WINDOW: usize = 5;

// ============================================================================
// Indicator catalog
// ============================================================================

/// Every column the engine can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Indicator {
    #[serde(rename = "SMA_5")]
    Sma5,
    #[serde(rename = "SMA_10")]
    Sma10,
    #[serde(rename = "SMA_20")]
    Sma20,
    #[serde(rename = "SMA_50")]
    Sma50,
    #[serde(rename = "SMA_100")]
    Sma100,
    #[serde(rename = "SMA_200")]
    Sma200,
    #[serde(rename = "EMA_12")]
    Ema12,
    #[serde(rename = "EMA_26")]
    Ema26,
    #[serde(rename = "EMA_50")]
    Ema50,
    #[serde(rename = "EMA_200")]
    Ema200,
    #[serde(rename = "WMA_20")]
    Wma20,
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "MACD_Signal")]
    MacdSignal,
    #[serde(rename = "MACD_Histogram")]
    MacdHistogram,
    #[serde(rename = "BB_Upper")]
    BbUpper,
    #[serde(rename = "BB_Middle")]
    BbMiddle,
    #[serde(rename = "BB_Lower")]
    BbLower,
    #[serde(rename = "BB_Width")]
    BbWidth,
    #[serde(rename = "BB_Position")]
    BbPosition,
    #[serde(rename = "Stoch_K")]
    StochK,
    #[serde(rename = "Stoch_D")]
    StochD,
    #[serde(rename = "Williams_R")]
    WilliamsR,
    #[serde(rename = "ATR")]
    Atr,
    #[serde(rename = "OBV")]
    Obv,
    #[serde(rename = "VWAP")]
    Vwap,
    #[serde(rename = "MFI")]
    Mfi,
    #[serde(rename = "ROC")]
    Roc,
    #[serde(rename = "Momentum")]
    Momentum,
    #[serde(rename = "CCI")]
    Cci,
    #[serde(rename = "ADX")]
    Adx,
    #[serde(rename = "SAR")]
    Sar,
    #[serde(rename = "DI_Plus")]
    DiPlus,
    #[serde(rename = "DI_Minus")]
    DiMinus,
}

impl Indicator {
    pub const ALL: [Indicator; 34] = [
        Self::Sma5,
        Self::Sma10,
        Self::Sma20,
        Self::Sma50,
        Self::Sma100,
        Self::Sma200,
        Self::Ema12,
        Self::Ema26,
        Self::Ema50,
        Self::Ema200,
        Self::Wma20,
        Self::Rsi,
        Self::Macd,
        Self::MacdSignal,
        Self::MacdHistogram,
        Self::BbUpper,
        Self::BbMiddle,
        Self::BbLower,
        Self::BbWidth,
        Self::BbPosition,
        Self::StochK,
        Self::StochD,
        Self::WilliamsR,
        Self::Atr,
        Self::Obv,
        Self::Vwap,
        Self::Mfi,
        Self::Roc,
        Self::Momentum,
        Self::Cci,
        Self::Adx,
        Self::Sar,
        Self::DiPlus,
        Self::DiMinus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sma5 => "SMA_5",
            Self::Sma10 => "SMA_10",
            Self::Sma20 => "SMA_20",
            Self::Sma50 => "SMA_50",
            Self::Sma100 => "SMA_100",
            Self::Sma200 => "SMA_200",
            Self::Ema12 => "EMA_12",
            Self::Ema26 => "EMA_26",
            Self::Ema50 => "EMA_50",
            Self::Ema200 => "EMA_200",
            Self::Wma20 => "WMA_20",
            Self::Rsi => "RSI",
            Self::Macd => "MACD",
            Self::MacdSignal => "MACD_Signal",
            Self::MacdHistogram => "MACD_Histogram",
            Self::BbUpper => "BB_Upper",
            Self::BbMiddle => "BB_Middle",
            Self::BbLower => "BB_Lower",
            Self::BbWidth => "BB_Width",
            Self::BbPosition => "BB_Position",
            Self::StochK => "Stoch_K",
            Self::StochD => "Stoch_D",
            Self::WilliamsR => "Williams_R",
            Self::Atr => "ATR",
            Self::Obv => "OBV",
            Self::Vwap => "VWAP",
            Self::Mfi => "MFI",
            Self::Roc => "ROC",
            Self::Momentum => "Momentum",
            Self::Cci => "CCI",
            Self::Adx => "ADX",
            Self::Sar => "SAR",
            Self::DiPlus => "DI_Plus",
            Self::DiMinus => "DI_Minus",
        }
    }
}

// ============================================================================
// Indicator table
// ============================================================================

/// Price columns and indicator columns, all aligned with `dates`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorTable {
    pub symbol: String,
    pub dates: Vec<DateTime<Utc>>,
    pub prices: BTreeMap<Column, Series>,
    pub indicators: BTreeMap<Indicator, Series>,
}

/// Every column's value at one bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub date: DateTime<Utc>,
    pub values: BTreeMap<String, Option<f64>>,
}

impl IndicatorTable {
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            dates: Vec::new(),
            prices: BTreeMap::new(),
            indicators: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Raw price column; empty when the table is empty
    pub fn price(&self, column: Column) -> &[Option<f64>] {
        self.prices.get(&column).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Indicator column, `None` if the indicator was not computed
    pub fn get(&self, indicator: Indicator) -> Option<&[Option<f64>]> {
        self.indicators.get(&indicator).map(Vec::as_slice)
    }

    /// Indicator value `back` bars before the last one
    pub fn value_back(&self, indicator: Indicator, back: usize) -> Option<f64> {
        self.get(indicator).and_then(|s| series::from_end(s, back))
    }

    pub fn latest(&self, indicator: Indicator) -> Option<f64> {
        self.value_back(indicator, 0)
    }

    pub fn snapshot(&self, index: usize) -> Option<IndicatorSnapshot> {
        let date = *self.dates.get(index)?;
        let prices = self
            .prices
            .iter()
            .map(|(c, s)| (c.as_str().to_string(), s[index]));
        let indicators = self
            .indicators
            .iter()
            .map(|(i, s)| (i.as_str().to_string(), s[index]));
        Some(IndicatorSnapshot {
            date,
            values: prices.chain(indicators).collect(),
        })
    }

    /// Snapshot of the last bar
    pub fn latest_snapshot(&self) -> Option<IndicatorSnapshot> {
        self.len().checked_sub(1).and_then(|i| self.snapshot(i))
    }
}

// ============================================================================
// Engine
// ============================================================================

type Columns = Vec<(Indicator, Series)>;
type FamilyFn<'e> = fn(&IndicatorEngine<'e>, &Ohlcv) -> Result<Columns>;

/// Input columns borrowed once per computation
struct Ohlcv {
    open: Series,
    high: Series,
    low: Series,
    close: Series,
    volume: Series,
}

impl Ohlcv {
    fn typical_price(&self) -> Series {
        let hl = series::zip_with(&self.high, &self.low, |h, l| h + l);
        series::zip_with(&hl, &self.close, |hl, c| (hl + c) / 3.0)
    }

    /// Complete bars in `ta` form; `None` where a field is missing
    fn data_items(&self, indicator: &'static str) -> Result<Vec<Option<DataItem>>> {
        (0..self.close.len())
            .map(|i| {
                let (Some(o), Some(h), Some(l), Some(c), Some(v)) = (
                    self.open[i],
                    self.high[i],
                    self.low[i],
                    self.close[i],
                    self.volume[i],
                ) else {
                    return Ok(None);
                };
                DataItem::builder()
                    .open(o)
                    .high(h)
                    .low(l)
                    .close(c)
                    .volume(v)
                    .build()
                    .map(Some)
                    .map_err(|e| backend(indicator, format!("bar {}: {:?}", i, e)))
            })
            .collect()
    }
}

fn backend(indicator: &'static str, reason: impl Debug) -> AnalysisError {
    AnalysisError::Backend {
        indicator,
        reason: format!("{:?}", reason),
    }
}

/// Computes the indicator table for one series
pub struct IndicatorEngine<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> IndicatorEngine<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    fn families() -> [(&'static str, FamilyFn<'a>); 10] {
        [
            ("moving_averages", Self::moving_averages),
            ("rsi", Self::rsi),
            ("macd", Self::macd),
            ("bollinger_bands", Self::bollinger),
            ("stochastic", Self::stochastic),
            ("williams_r", Self::williams_r),
            ("atr", Self::atr),
            ("volume", Self::volume),
            ("momentum", Self::momentum),
            ("trend", Self::trend),
        ]
    }

    /// Compute every indicator family.
    ///
    /// Fails only when an OHLCV column is absent. An empty series yields an
    /// empty table.
    pub fn compute(&self, series: &PriceSeries) -> Result<IndicatorTable> {
        if series.is_empty() {
            return Ok(IndicatorTable::empty(&series.symbol));
        }
        if let Some(column) = Column::ALL.iter().find(|c| !series.has_column(**c)) {
            error!(symbol = %series.symbol, column = %column, "Missing required column");
            return Err(AnalysisError::MissingColumn {
                column: column.as_str(),
            });
        }

        let input = Ohlcv {
            open: series.column(Column::Open),
            high: series.column(Column::High),
            low: series.column(Column::Low),
            close: series.column(Column::Close),
            volume: series.column(Column::Volume),
        };

        let mut indicators = BTreeMap::new();
        for (family, compute) in Self::families() {
            match compute(self, &input) {
                Ok(columns) => indicators.extend(columns),
                Err(e) => warn!(
                    symbol = %series.symbol,
                    family,
                    error = %e,
                    "Indicator family failed, leaving it absent"
                ),
            }
        }
        debug!(
            symbol = %series.symbol,
            bars = series.len(),
            columns = indicators.len(),
            backend = ?self.config.backend,
            "Indicators computed"
        );

        let prices = BTreeMap::from([
            (Column::Open, input.open),
            (Column::High, input.high),
            (Column::Low, input.low),
            (Column::Close, input.close),
            (Column::Volume, input.volume),
        ]);

        Ok(IndicatorTable {
            symbol: series.symbol.clone(),
            dates: series.dates(),
            prices,
            indicators,
        })
    }

    // ------------------------------------------------------------------------
    // Moving averages
    // ------------------------------------------------------------------------

    fn moving_averages(&self, input: &Ohlcv) -> Result<Columns> {
        let close = &input.close;
        Ok(vec![
            (Indicator::Sma5, series::rolling_mean(close, 5)),
            (Indicator::Sma10, series::rolling_mean(close, 10)),
            (Indicator::Sma20, series::rolling_mean(close, 20)),
            (Indicator::Sma50, series::rolling_mean(close, 50)),
            (Indicator::Sma100, series::rolling_mean(close, 100)),
            (Indicator::Sma200, series::rolling_mean(close, 200)),
            (Indicator::Ema12, series::ewm(close, 12)),
            (Indicator::Ema26, series::ewm(close, 26)),
            (Indicator::Ema50, series::ewm(close, 50)),
            (Indicator::Ema200, series::ewm(close, 200)),
            (Indicator::Wma20, series::rolling_weighted_mean(close, 20)),
        ])
    }

    // ------------------------------------------------------------------------
    // RSI
    // ------------------------------------------------------------------------

    fn rsi(&self, input: &Ohlcv) -> Result<Columns> {
        let period = self.config.rsi_period;
        let rsi = match self.config.backend {
            IndicatorBackend::Rolling => {
                let delta = series::diff(&input.close, 1);
                // the undefined first delta counts as "no move"
                let gain: Series = delta.iter().map(|d| Some(d.map_or(0.0, |d| d.max(0.0)))).collect();
                let loss: Series = delta.iter().map(|d| Some(d.map_or(0.0, |d| (-d).max(0.0)))).collect();
                let avg_gain = series::rolling_mean(&gain, period);
                let avg_loss = series::rolling_mean(&loss, period);
                avg_gain
                    .iter()
                    .zip(avg_loss.iter())
                    .map(|(g, l)| ratio_index(*g, *l))
                    .collect()
            }
            IndicatorBackend::Streaming => {
                let mut rsi = RelativeStrengthIndex::new(period).map_err(|e| backend("RSI", e))?;
                stream(&input.close, period + 1, |x| rsi.next(x))
            }
        };
        Ok(vec![(Indicator::Rsi, rsi)])
    }

    // ------------------------------------------------------------------------
    // MACD
    // ------------------------------------------------------------------------

    fn macd(&self, input: &Ohlcv) -> Result<Columns> {
        let (fast, slow, signal_period) = (
            self.config.macd_fast,
            self.config.macd_slow,
            self.config.macd_signal,
        );
        let (macd, signal, histogram) = match self.config.backend {
            IndicatorBackend::Rolling => {
                let ema_fast = series::ewm(&input.close, fast);
                let ema_slow = series::ewm(&input.close, slow);
                let macd = series::zip_with(&ema_fast, &ema_slow, |f, s| f - s);
                let signal = series::ewm(&macd, signal_period);
                let histogram = series::zip_with(&macd, &signal, |m, s| m - s);
                (macd, signal, histogram)
            }
            IndicatorBackend::Streaming => {
                let mut ind = MovingAverageConvergenceDivergence::new(fast, slow, signal_period)
                    .map_err(|e| backend("MACD", e))?;
                let outputs: Vec<Option<(f64, f64, f64)>> =
                    stream_with(&input.close, slow, |x| {
                        let out = ind.next(x);
                        (out.macd, out.signal, out.histogram)
                    });
                (
                    outputs.iter().map(|o| o.and_then(|o| finite(o.0))).collect(),
                    outputs.iter().map(|o| o.and_then(|o| finite(o.1))).collect(),
                    outputs.iter().map(|o| o.and_then(|o| finite(o.2))).collect(),
                )
            }
        };
        Ok(vec![
            (Indicator::Macd, macd),
            (Indicator::MacdSignal, signal),
            (Indicator::MacdHistogram, histogram),
        ])
    }

    // ------------------------------------------------------------------------
    // Bollinger Bands
    // ------------------------------------------------------------------------

    fn bollinger(&self, input: &Ohlcv) -> Result<Columns> {
        let period = self.config.bollinger_period;
        let k = self.config.bollinger_std;
        let (upper, middle, lower) = match self.config.backend {
            IndicatorBackend::Rolling => {
                let middle = series::rolling_mean(&input.close, period);
                let std = series::rolling_std(&input.close, period);
                let upper = series::zip_with(&middle, &std, |m, s| m + s * k);
                let lower = series::zip_with(&middle, &std, |m, s| m - s * k);
                (upper, middle, lower)
            }
            IndicatorBackend::Streaming => {
                let mut bb = BollingerBands::new(period, k).map_err(|e| backend("BB", e))?;
                let outputs: Vec<Option<(f64, f64, f64)>> =
                    stream_with(&input.close, period, |x| {
                        let out = bb.next(x);
                        (out.upper, out.average, out.lower)
                    });
                (
                    outputs.iter().map(|o| o.and_then(|o| finite(o.0))).collect(),
                    outputs.iter().map(|o| o.and_then(|o| finite(o.1))).collect(),
                    outputs.iter().map(|o| o.and_then(|o| finite(o.2))).collect(),
                )
            }
        };
        let band = series::zip_with(&upper, &lower, |u, l| u - l);
        let width = series::zip_with(&band, &middle, |b, m| b / m);
        let position = (0..input.close.len())
            .map(|i| match (input.close[i], lower[i], upper[i]) {
                (Some(c), Some(l), Some(u)) => bollinger_position(c, l, u),
                _ => None,
            })
            .collect();
        Ok(vec![
            (Indicator::BbUpper, upper),
            (Indicator::BbMiddle, middle),
            (Indicator::BbLower, lower),
            (Indicator::BbWidth, width),
            (Indicator::BbPosition, position),
        ])
    }

    // ------------------------------------------------------------------------
    // Stochastic, Williams %R, ATR
    // ------------------------------------------------------------------------

    fn stochastic(&self, input: &Ohlcv) -> Result<Columns> {
        let k = match self.config.backend {
            IndicatorBackend::Rolling => {
                let low_min = series::rolling_min(&input.low, STOCH_PERIOD);
                let high_max = series::rolling_max(&input.high, STOCH_PERIOD);
                let range = series::zip_with(&high_max, &low_min, |h, l| h - l);
                let above = series::zip_with(&input.close, &low_min, |c, l| c - l);
                series::zip_with(&above, &range, |a, r| 100.0 * a / r)
            }
            IndicatorBackend::Streaming => {
                let mut stoch =
                    SlowStochastic::new(STOCH_PERIOD, 3).map_err(|e| backend("Stochastic", e))?;
                let items = input.data_items("Stochastic")?;
                stream_items(&items, STOCH_PERIOD, |item| stoch.next(item))
            }
        };
        let d = series::rolling_mean(&k, 3);
        Ok(vec![(Indicator::StochK, k), (Indicator::StochD, d)])
    }

    fn williams_r(&self, input: &Ohlcv) -> Result<Columns> {
        let low_min = series::rolling_min(&input.low, WILLIAMS_PERIOD);
        let high_max = series::rolling_max(&input.high, WILLIAMS_PERIOD);
        let range = series::zip_with(&high_max, &low_min, |h, l| h - l);
        let below = series::zip_with(&high_max, &input.close, |h, c| h - c);
        let wr = series::zip_with(&below, &range, |b, r| -100.0 * b / r);
        Ok(vec![(Indicator::WilliamsR, wr)])
    }

    fn atr(&self, input: &Ohlcv) -> Result<Columns> {
        let atr = match self.config.backend {
            IndicatorBackend::Rolling => {
                let prev_close = series::shift(&input.close, 1);
                let true_range: Series = (0..input.close.len())
                    .map(|i| match (input.high[i], input.low[i], prev_close[i]) {
                        (Some(h), Some(l), Some(pc)) => {
                            finite((h - l).max((h - pc).abs()).max((l - pc).abs()))
                        }
                        _ => None,
                    })
                    .collect();
                series::rolling_mean(&true_range, ATR_PERIOD)
            }
            IndicatorBackend::Streaming => {
                let mut atr = AverageTrueRange::new(ATR_PERIOD).map_err(|e| backend("ATR", e))?;
                let items = input.data_items("ATR")?;
                stream_items(&items, ATR_PERIOD + 1, |item| atr.next(item))
            }
        };
        Ok(vec![(Indicator::Atr, atr)])
    }

    // ------------------------------------------------------------------------
    // Volume: OBV, VWAP, MFI
    // ------------------------------------------------------------------------

    fn volume(&self, input: &Ohlcv) -> Result<Columns> {
        let delta = series::diff(&input.close, 1);
        let signed: Series = delta
            .iter()
            .zip(input.volume.iter())
            .map(|(d, v)| match (d, v) {
                (Some(d), Some(v)) => Some(sign(*d) * v),
                _ => Some(0.0),
            })
            .collect();
        let obv = series::cumsum(&signed);

        // cumulative from the first bar, never reset per session
        let price_volume = series::zip_with(&input.close, &input.volume, |c, v| c * v);
        let vwap = series::zip_with(
            &series::cumsum(&price_volume),
            &series::cumsum(&input.volume),
            |pv, v| pv / v,
        );

        let typical = input.typical_price();
        let prev_typical = series::shift(&typical, 1);
        let money_flow = series::zip_with(&typical, &input.volume, |tp, v| tp * v);
        let flow = |up: bool| -> Series {
            (0..typical.len())
                .map(|i| match (typical[i], prev_typical[i], money_flow[i]) {
                    (Some(tp), Some(prev), Some(mf)) if (up && tp > prev) || (!up && tp < prev) => {
                        Some(mf)
                    }
                    _ => Some(0.0),
                })
                .collect()
        };
        let positive = series::rolling_sum(&flow(true), MFI_PERIOD);
        let negative = series::rolling_sum(&flow(false), MFI_PERIOD);
        let mfi = positive
            .iter()
            .zip(negative.iter())
            .map(|(p, n)| ratio_index(*p, *n))
            .collect();

        Ok(vec![
            (Indicator::Obv, obv),
            (Indicator::Vwap, vwap),
            (Indicator::Mfi, mfi),
        ])
    }

    // ------------------------------------------------------------------------
    // Momentum: ROC, Momentum, CCI
    // ------------------------------------------------------------------------

    fn momentum(&self, input: &Ohlcv) -> Result<Columns> {
        let past = series::shift(&input.close, MOMENTUM_LOOKBACK);
        let momentum = series::zip_with(&input.close, &past, |c, p| c - p);
        let roc = series::zip_with(&momentum, &past, |m, p| m / p * 100.0);

        let typical = input.typical_price();
        let sma_tp = series::rolling_mean(&typical, CCI_PERIOD);
        let abs_dev = series::zip_with(&typical, &sma_tp, |tp, m| (tp - m).abs());
        let mean_dev = series::rolling_mean(&abs_dev, CCI_PERIOD);
        let spread = series::zip_with(&typical, &sma_tp, |tp, m| tp - m);
        let cci = series::zip_with(&spread, &mean_dev, |s, d| s / (CCI_SCALE * d));

        Ok(vec![
            (Indicator::Roc, roc),
            (Indicator::Momentum, momentum),
            (Indicator::Cci, cci),
        ])
    }

    // ------------------------------------------------------------------------
    // Trend proxies: ADX, SAR, DI+/DI-
    // ------------------------------------------------------------------------

    fn trend(&self, input: &Ohlcv) -> Result<Columns> {
        let adx = series::rolling_std(&input.close, TREND_PERIOD);
        let sar = series::rolling_min(&input.low, STOP_WINDOW);
        let delta = series::diff(&input.close, 1);
        let di_plus = series::rolling(&delta, TREND_PERIOD, |w| {
            Some(w.iter().filter(|d| **d > 0.0).sum::<f64>() / w.len() as f64)
        });
        let di_minus = series::rolling(&delta, TREND_PERIOD, |w| {
            Some(w.iter().filter(|d| **d < 0.0).sum::<f64>().abs() / w.len() as f64)
        });
        Ok(vec![
            (Indicator::Adx, adx),
            (Indicator::Sar, sar),
            (Indicator::DiPlus, di_plus),
            (Indicator::DiMinus, di_minus),
        ])
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `100 - 100 / (1 + up / down)`, saturating at 100 when nothing moved down
fn ratio_index(up: Option<f64>, down: Option<f64>) -> Option<f64> {
    let (up, down) = (up?, down?);
    if down == 0.0 {
        return (up > 0.0).then_some(100.0);
    }
    finite(100.0 - 100.0 / (1.0 + up / down))
}

/// Where `close` sits between the bands: 0 at the lower band, 1 at the upper.
/// Not clamped; a close outside the bands falls outside [0, 1].
pub fn bollinger_position(close: f64, lower: f64, upper: f64) -> Option<f64> {
    finite((close - lower) / (upper - lower))
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Feed present values through a streaming indicator, masking its warm-up
fn stream<F>(values: &[Option<f64>], warmup: usize, mut next: F) -> Series
where
    F: FnMut(f64) -> f64,
{
    stream_with(values, warmup, &mut next)
        .into_iter()
        .map(|v| v.and_then(finite))
        .collect()
}

fn stream_with<F, T>(values: &[Option<f64>], warmup: usize, mut next: F) -> Vec<Option<T>>
where
    F: FnMut(f64) -> T,
{
    let mut fed = 0;
    values
        .iter()
        .map(|v| {
            let x = (*v)?;
            let out = next(x);
            fed += 1;
            (fed >= warmup).then_some(out)
        })
        .collect()
}

fn stream_items<F>(items: &[Option<DataItem>], warmup: usize, mut next: F) -> Series
where
    F: FnMut(&DataItem) -> f64,
{
    let mut fed = 0;
    items
        .iter()
        .map(|item| {
            let out = next(item.as_ref()?);
            fed += 1;
            if fed >= warmup {
                finite(out)
            } else {
                None
            }
        })
        .collect()
}
