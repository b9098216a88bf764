//! Analysis configuration

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::signals::SignalFamily;

/// How the oscillator/volatility indicators are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorBackend {
    /// Trailing-window formulas from [`crate::series`]
    #[default]
    Rolling,
    /// Streaming indicators from the `ta` crate
    Streaming,
}

impl FromStr for IndicatorBackend {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rolling" => Ok(Self::Rolling),
            "streaming" | "ta" => Ok(Self::Streaming),
            other => Err(AnalysisError::InvalidConfig(format!(
                "unknown indicator backend '{}'",
                other
            ))),
        }
    }
}

/// Per-family weights for the combined technical signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyWeights {
    pub rsi: f64,
    pub macd: f64,
    pub bollinger: f64,
    pub moving_averages: f64,
    pub volume: f64,
}

impl Default for FamilyWeights {
    fn default() -> Self {
        Self {
            rsi: 0.20,
            macd: 0.25,
            bollinger: 0.20,
            moving_averages: 0.25,
            volume: 0.10,
        }
    }
}

impl FamilyWeights {
    pub fn weight(&self, family: SignalFamily) -> f64 {
        match family {
            SignalFamily::Rsi => self.rsi,
            SignalFamily::Macd => self.macd,
            SignalFamily::BollingerBands => self.bollinger,
            SignalFamily::MovingAverages => self.moving_averages,
            SignalFamily::Volume => self.volume,
        }
    }

    fn all(&self) -> [f64; 5] {
        [
            self.rsi,
            self.macd,
            self.bollinger,
            self.moving_averages,
            self.volume,
        ]
    }
}

/// Weights for the technical/fundamental recommendation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub technical: f64,
    pub fundamental: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            technical: 0.6,
            fundamental: 0.4,
        }
    }
}

/// Pattern detector tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Trailing bars used by triangle and double top/bottom detection
    pub chart_lookback: usize,
    /// Trailing bars whose highs and lows feed level clustering
    pub level_lookback: usize,
    /// Maximum distance between neighbouring prices in one level cluster
    pub level_tolerance: f64,
    pub min_cluster_size: usize,
    /// Max relative gap between the two shoulders of a head-and-shoulders
    pub shoulder_tolerance: f64,
    /// Max relative gap between the two peaks (troughs) of a double top (bottom)
    pub double_tolerance: f64,
    /// Trendline slope below which a line counts as flat
    pub slope_threshold: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            chart_lookback: 20,
            level_lookback: 50,
            level_tolerance: 0.02,
            min_cluster_size: 3,
            shoulder_tolerance: 0.10,
            double_tolerance: 0.05,
            slope_threshold: 0.1,
        }
    }
}

/// Everything an analysis call can override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_std: f64,
    pub backend: IndicatorBackend,
    pub weights: FamilyWeights,
    pub fusion: FusionWeights,
    /// |score| above which the fused call becomes buy/sell
    pub decision_threshold: f64,
    pub patterns: PatternConfig,
    /// Return the whole indicator table, not only the last bar
    pub include_series: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_std: 2.0,
            backend: IndicatorBackend::default(),
            weights: FamilyWeights::default(),
            fusion: FusionWeights::default(),
            decision_threshold: 0.3,
            patterns: PatternConfig::default(),
            include_series: false,
        }
    }
}

impl AnalysisConfig {
    /// Defaults overlaid with `ADVISOR_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = env_parse("ADVISOR_RSI_PERIOD")? {
            config.rsi_period = v;
        }
        if let Some(v) = env_parse("ADVISOR_MACD_FAST")? {
            config.macd_fast = v;
        }
        if let Some(v) = env_parse("ADVISOR_MACD_SLOW")? {
            config.macd_slow = v;
        }
        if let Some(v) = env_parse("ADVISOR_MACD_SIGNAL")? {
            config.macd_signal = v;
        }
        if let Some(v) = env_parse("ADVISOR_BOLLINGER_PERIOD")? {
            config.bollinger_period = v;
        }
        if let Some(v) = env_parse("ADVISOR_BOLLINGER_STD")? {
            config.bollinger_std = v;
        }
        if let Some(v) = env_parse("ADVISOR_BACKEND")? {
            config.backend = v;
        }
        if let Some(v) = env_parse("ADVISOR_DECISION_THRESHOLD")? {
            config.decision_threshold = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bollinger_period", self.bollinger_period),
            ("patterns.chart_lookback", self.patterns.chart_lookback),
            ("patterns.level_lookback", self.patterns.level_lookback),
            ("patterns.min_cluster_size", self.patterns.min_cluster_size),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, w)| *w == 0) {
            return Err(AnalysisError::InvalidConfig(format!("{} must be > 0", name)));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(AnalysisError::InvalidConfig(format!(
                "macd_fast ({}) must be below macd_slow ({})",
                self.macd_fast, self.macd_slow
            )));
        }
        if !self.bollinger_std.is_finite() || self.bollinger_std <= 0.0 {
            return Err(AnalysisError::InvalidConfig(
                "bollinger_std must be a positive number".to_string(),
            ));
        }
        if !self.decision_threshold.is_finite() || self.decision_threshold < 0.0 {
            return Err(AnalysisError::InvalidConfig(
                "decision_threshold must be a non-negative number".to_string(),
            ));
        }
        let fusion = [self.fusion.technical, self.fusion.fundamental];
        if self
            .weights
            .all()
            .iter()
            .chain(fusion.iter())
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(AnalysisError::InvalidConfig(
                "weights must be non-negative numbers".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AnalysisError::InvalidConfig(format!("{}='{}' is not valid", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.rsi_period, 14);
        assert_eq!((config.macd_fast, config.macd_slow, config.macd_signal), (12, 26, 9));
        assert_eq!(config.bollinger_period, 20);
        assert_eq!(config.bollinger_std, 2.0);
        assert_eq!(config.decision_threshold, 0.3);
        assert_eq!(config.backend, IndicatorBackend::Rolling);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_family_weights_sum_to_one() {
        let sum: f64 = FamilyWeights::default().all().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_windows() {
        let config = AnalysisConfig {
            rsi_period: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AnalysisError::InvalidConfig(_))));

        let config = AnalysisConfig {
            macd_fast: 26,
            macd_slow: 12,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut config = AnalysisConfig::default();
        config.weights.volume = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Streaming".parse::<IndicatorBackend>().unwrap(), IndicatorBackend::Streaming);
        assert_eq!("rolling".parse::<IndicatorBackend>().unwrap(), IndicatorBackend::Rolling);
        assert!("talib".parse::<IndicatorBackend>().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"rsi_period": 7}"#).unwrap();
        assert_eq!(config.rsi_period, 7);
        assert_eq!(config.macd_slow, 26);
    }

    #[test]
    fn test_partial_nested_json_uses_defaults() {
        let config: AnalysisConfig = serde_json::from_str(
            r#"{"patterns": {"chart_lookback": 30}, "weights": {"volume": 0.3}, "fusion": {"technical": 0.8}}"#,
        )
        .unwrap();
        assert_eq!(config.patterns.chart_lookback, 30);
        assert_eq!(config.patterns.level_lookback, 50);
        assert_eq!(config.patterns.min_cluster_size, 3);
        assert_eq!(config.weights.volume, 0.3);
        assert_eq!(config.weights.macd, 0.25);
        assert_eq!(config.fusion.technical, 0.8);
        assert_eq!(config.fusion.fundamental, 0.4);
        assert!(config.validate().is_ok());
    }
}
