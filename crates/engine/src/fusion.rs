//! Signal fusion
//!
//! Two stages share one pattern: signed scores (+strength for buy, -strength
//! for sell, 0 for hold) are weighted, summed and thresholded.
//!
//! * [`combine_signals`] folds the per-family technical signals into the
//!   Combined signal, renormalizing by the weights of the families that
//!   actually produced a call.
//! * [`fuse`] blends the Combined signal with an external fundamental signal
//!   into the final [`FusedRecommendation`].

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::AnalysisConfig;
use crate::signals::SignalFamily;
use crate::types::{FusedRecommendation, Signal, SignalKind};

/// Weighted call over the available family signals.
///
/// Neutral ("Insufficient data") signals carry no weight. With no weighted
/// signal at all the result is a neutral signal, never an error.
pub fn combine_signals(
    signals: &BTreeMap<SignalFamily, Signal>,
    config: &AnalysisConfig,
) -> Signal {
    let weighted: Vec<(SignalFamily, f64, f64)> = signals
        .iter()
        .filter(|(_, s)| s.is_available())
        .map(|(family, s)| (*family, config.weights.weight(*family), s.score()))
        .filter(|(_, weight, _)| *weight > 0.0)
        .collect();

    let total_weight: f64 = weighted.iter().map(|(_, w, _)| w).sum();
    if total_weight <= 0.0 {
        return Signal::neutral("No weighted signals available");
    }

    let score = weighted.iter().map(|(_, w, s)| w * s).sum::<f64>() / total_weight;
    let threshold = config.decision_threshold;

    let mut combined = if score > threshold {
        Signal::buy(score.min(1.0), "Multiple indicators suggest bullish momentum")
    } else if score < -threshold {
        Signal::sell(score.abs().min(1.0), "Multiple indicators suggest bearish momentum")
    } else {
        Signal::hold("Mixed signals, maintaining current position")
    }
    .with_metric("score", score)
    .with_metric("total_weight", total_weight);

    for (family, weight, family_score) in &weighted {
        combined = combined.with_metric(
            &format!("contribution_{}", family),
            weight * family_score / total_weight,
        );
    }
    debug!(
        families = weighted.len(),
        score,
        signal = %combined.signal,
        "Combined technical signal"
    );
    combined
}

/// Blend the Combined technical signal with a fundamental one.
///
/// A missing fundamental signal counts as a hold. Weights are applied as
/// configured, without renormalization.
pub fn fuse(
    technical: &Signal,
    fundamental: Option<&Signal>,
    config: &AnalysisConfig,
) -> FusedRecommendation {
    let weights = config.fusion;
    let technical_contribution = technical.score() * weights.technical;
    let fundamental_contribution = fundamental.map_or(0.0, Signal::score) * weights.fundamental;
    let weighted_score = technical_contribution + fundamental_contribution;
    let threshold = config.decision_threshold;

    let (signal, strength, reason) = if weighted_score > threshold {
        (
            SignalKind::Buy,
            weighted_score.min(1.0),
            "Strong technical and fundamental signals",
        )
    } else if weighted_score < -threshold {
        (
            SignalKind::Sell,
            weighted_score.abs().min(1.0),
            "Weak technical and fundamental signals",
        )
    } else {
        (SignalKind::Hold, 0.5, "Mixed signals, maintaining position")
    };

    FusedRecommendation {
        signal,
        strength,
        reason: reason.to_string(),
        weighted_score,
        technical_contribution,
        fundamental_contribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn signals(entries: &[(SignalFamily, Signal)]) -> BTreeMap<SignalFamily, Signal> {
        entries.iter().cloned().collect()
    }

    #[test]
    fn test_all_buys_combine_to_buy() {
        let all = signals(
            &SignalFamily::ALL
                .iter()
                .map(|f| (*f, Signal::buy(0.8, "x")))
                .collect::<Vec<_>>(),
        );
        let combined = combine_signals(&all, &AnalysisConfig::default());
        assert_eq!(combined.signal, SignalKind::Buy);
        assert!(approx(combined.strength, 0.8));
        assert_eq!(combined.reason, "Multiple indicators suggest bullish momentum");
    }

    #[test]
    fn test_renormalization_keeps_family_ratio() {
        let only_two = signals(&[
            (SignalFamily::Macd, Signal::buy(1.0, "x")),
            (SignalFamily::Volume, Signal::buy(1.0, "x")),
            (SignalFamily::Rsi, Signal::insufficient_data()),
        ]);
        let combined = combine_signals(&only_two, &AnalysisConfig::default());
        let macd = combined.metrics["contribution_MACD"];
        let volume = combined.metrics["contribution_Volume"];
        assert!(approx(macd / volume, 0.25 / 0.10));
        assert!(approx(combined.metrics["total_weight"], 0.35));
        // both families agree fully, so the renormalized score is 1
        assert!(approx(combined.metrics["score"], 1.0));
        assert!(!combined.metrics.contains_key("contribution_RSI"));
    }

    #[test]
    fn test_threshold_boundaries_hold() {
        // 0.25 * 0.6 / 0.5 = 0.3 exactly: not above the threshold
        let edge = signals(&[
            (SignalFamily::Macd, Signal::buy(0.6, "x")),
            (SignalFamily::MovingAverages, Signal::hold("x")),
        ]);
        let combined = combine_signals(&edge, &AnalysisConfig::default());
        assert_eq!(combined.signal, SignalKind::Hold);
        assert_eq!(combined.strength, 0.5);
        assert_eq!(combined.reason, "Mixed signals, maintaining current position");
    }

    #[test]
    fn test_bearish_combination() {
        let bearish = signals(&[
            (SignalFamily::Rsi, Signal::sell(1.0, "x")),
            (SignalFamily::BollingerBands, Signal::sell(0.5, "x")),
        ]);
        let combined = combine_signals(&bearish, &AnalysisConfig::default());
        assert_eq!(combined.signal, SignalKind::Sell);
        assert!(approx(combined.strength, 0.75));
    }

    #[test]
    fn test_no_signals_degrades_to_neutral() {
        let combined = combine_signals(&BTreeMap::new(), &AnalysisConfig::default());
        assert_eq!(combined.signal, SignalKind::Neutral);
        assert_eq!(combined.strength, 0.0);
        assert_eq!(combined.reason, "No weighted signals available");

        let neutral_only = signals(&[(SignalFamily::Rsi, Signal::insufficient_data())]);
        let combined = combine_signals(&neutral_only, &AnalysisConfig::default());
        assert_eq!(combined.signal, SignalKind::Neutral);
    }

    #[test]
    fn test_fuse_weights_and_contributions() {
        let config = AnalysisConfig::default();
        let fused = fuse(&Signal::buy(0.8, "t"), Some(&Signal::buy(0.5, "f")), &config);
        assert_eq!(fused.signal, SignalKind::Buy);
        assert!(approx(fused.technical_contribution, 0.48));
        assert!(approx(fused.fundamental_contribution, 0.2));
        assert!(approx(fused.weighted_score, 0.68));
        assert!(approx(fused.strength, 0.68));
        assert_eq!(fused.reason, "Strong technical and fundamental signals");
    }

    #[test]
    fn test_fuse_missing_fundamental_is_hold() {
        let config = AnalysisConfig::default();
        let fused = fuse(&Signal::sell(1.0, "t"), None, &config);
        assert!(approx(fused.weighted_score, -0.6));
        assert_eq!(fused.fundamental_contribution, 0.0);
        assert_eq!(fused.signal, SignalKind::Sell);
        assert_eq!(fused.reason, "Weak technical and fundamental signals");

        let fused = fuse(&Signal::sell(0.4, "t"), None, &config);
        assert_eq!(fused.signal, SignalKind::Hold);
        assert_eq!(fused.strength, 0.5);
        assert_eq!(fused.reason, "Mixed signals, maintaining position");
    }

    #[test]
    fn test_fuse_conflicting_inputs() {
        let fused = fuse(
            &Signal::buy(1.0, "t"),
            Some(&Signal::sell(1.0, "f")),
            &AnalysisConfig::default(),
        );
        assert_eq!(fused.signal, SignalKind::Hold);
        assert!(approx(fused.weighted_score, 0.2));
    }
}
