//! Virtual inspection: extrapolate matched-anomaly depths to a future
//! year without running a tool through the line.
//!
//! The most recent pairwise match set supplies the growth rates; anomalies
//! also tracked across all three runs prefer their regression slope, since
//! three observations beat one delta. Negative rates are skipped outright:
//! wall loss does not reverse, so they are measurement artifacts and
//! extrapolating them would fabricate recovery.

use crate::chain::TripleMatch;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::growth::RiskCategory;
use crate::matching::{ConfidenceLabel, MatchRecord};
use crate::record::EventType;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::HashMap;

/// One anomaly's projected state at the target year.
#[derive(Debug, Clone, Serialize)]
pub struct PredictedAnomaly {
    pub joint: Option<i64>,
    pub distance_ft: f64,
    pub clock: f64,
    pub current_depth_pct: f64,
    /// The rate used for extrapolation (regression slope when
    /// triple-tracked, pairwise delta otherwise).
    pub growth_rate: f64,
    pub predicted_depth_pct: f64,
    pub predicted_risk: RiskCategory,
    /// Years from the target year until the repair threshold; NaN when the
    /// rate is zero.
    pub years_to_repair_threshold: f64,
    pub event_type: EventType,
    pub confidence: ConfidenceLabel,
    pub is_triple_tracked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionSummary {
    pub target_year: i32,
    pub base_year: i32,
    pub years_forward: f64,
    pub total_predicted: usize,
    pub mean_predicted_depth: f64,
    pub max_predicted_depth: f64,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    /// Anomalies predicted at or past the repair threshold by the target
    /// year.
    pub needing_repair_by_target: usize,
}

/// How many anomalies newly exceed each depth threshold between the base
/// year and the target year - the features that change the dig plan.
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdCrossings {
    pub crossing_50: usize,
    pub crossing_60: usize,
    pub crossing_70: usize,
    pub crossing_80: usize,
}

/// Predicted-depth histogram.
#[derive(Debug, Clone, Serialize)]
pub struct DepthDistribution {
    pub bin_0_20: usize,
    pub bin_20_40: usize,
    pub bin_40_60: usize,
    pub bin_60_80: usize,
    pub bin_80_100: usize,
}

/// Full virtual-inspection result.
#[derive(Debug, Clone, Serialize)]
pub struct VirtualInspection {
    pub summary: PredictionSummary,
    pub threshold_crossings: ThresholdCrossings,
    pub depth_distribution: DepthDistribution,
    /// Top 20 by predicted depth.
    pub top_concerns: Vec<PredictedAnomaly>,
    pub predictions: Vec<PredictedAnomaly>,
}

/// Simulate what an inspection in `target_year` would find.
///
/// `matches` is the scored base pair (its later year is the base year) and
/// `triples` supplies refined regression rates, joined on the latest run's
/// row index. Fails with `PredictionUnavailable` when the target year is
/// not in the future of the base year or nothing can be extrapolated.
pub fn predict_future_inspection(
    matches: &[MatchRecord],
    base_pair: (i32, i32),
    triples: &[TripleMatch],
    target_year: i32,
    config: &AnalysisConfig,
) -> Result<VirtualInspection, AnalysisError> {
    let base_year = base_pair.1;
    if target_year <= base_year {
        return Err(AnalysisError::PredictionUnavailable(format!(
            "target year {target_year} is not after base year {base_year}"
        )));
    }
    if matches.is_empty() {
        return Err(AnalysisError::PredictionUnavailable(
            "no matched anomalies to extrapolate".to_string(),
        ));
    }
    let years_forward = (target_year - base_year) as f64;

    // Refined rates from triple-tracked anomalies, keyed by their row in
    // the latest run.
    let mut triple_rates: HashMap<usize, f64> = HashMap::new();
    for triple in triples {
        if triple.linear_rate.is_finite() {
            triple_rates.insert(triple.last.row_idx, triple.linear_rate);
        }
    }

    let mut predictions = Vec::new();
    for m in matches {
        let current = m.later.depth_pct;
        if current.is_nan() || m.depth_growth_rate.is_nan() {
            continue;
        }
        let (rate, is_triple_tracked) = match triple_rates.get(&m.later.row_idx) {
            Some(refined) => (*refined, true),
            None => (m.depth_growth_rate, false),
        };
        if rate < 0.0 {
            continue;
        }

        let predicted = (current + rate * years_forward).clamp(0.0, 100.0);

        let remaining_capacity = config.wall_loss_repair_threshold - predicted;
        let years_to_repair_threshold = if rate > 0.0 {
            if remaining_capacity > 0.0 {
                remaining_capacity / rate
            } else {
                0.0
            }
        } else {
            f64::NAN
        };

        predictions.push(PredictedAnomaly {
            joint: m.later.joint,
            distance_ft: m.later.distance,
            clock: m.later.clock,
            current_depth_pct: current,
            growth_rate: rate,
            predicted_depth_pct: predicted,
            predicted_risk: predicted_risk(predicted),
            years_to_repair_threshold,
            event_type: m.later.event_type.clone(),
            confidence: m.confidence_label,
            is_triple_tracked,
        });
    }

    if predictions.is_empty() {
        return Err(AnalysisError::PredictionUnavailable(
            "no anomalies with usable growth rates".to_string(),
        ));
    }

    let threshold_crossings = ThresholdCrossings {
        crossing_50: count_crossings(&predictions, 50.0),
        crossing_60: count_crossings(&predictions, 60.0),
        crossing_70: count_crossings(&predictions, 70.0),
        crossing_80: count_crossings(&predictions, 80.0),
    };

    let depth_distribution = DepthDistribution {
        bin_0_20: count_in_band(&predictions, 0.0, 20.0),
        bin_20_40: count_in_band(&predictions, 20.0, 40.0),
        bin_40_60: count_in_band(&predictions, 40.0, 60.0),
        bin_60_80: count_in_band(&predictions, 60.0, 80.0),
        bin_80_100: count_in_band(&predictions, 80.0, 100.0 + 1e-9),
    };

    let risk_count = |category: RiskCategory| {
        predictions
            .iter()
            .filter(|p| p.predicted_risk == category)
            .count()
    };
    let summary = PredictionSummary {
        target_year,
        base_year,
        years_forward,
        total_predicted: predictions.len(),
        mean_predicted_depth: predictions.iter().map(|p| p.predicted_depth_pct).mean(),
        max_predicted_depth: predictions
            .iter()
            .map(|p| p.predicted_depth_pct)
            .fold(f64::NEG_INFINITY, f64::max),
        critical_count: risk_count(RiskCategory::Critical),
        high_count: risk_count(RiskCategory::High),
        medium_count: risk_count(RiskCategory::Medium),
        low_count: risk_count(RiskCategory::Low),
        needing_repair_by_target: predictions
            .iter()
            .filter(|p| p.predicted_depth_pct >= config.wall_loss_repair_threshold)
            .count(),
    };

    let mut top_concerns = predictions.clone();
    top_concerns.sort_by(|a, b| {
        b.predicted_depth_pct
            .partial_cmp(&a.predicted_depth_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    top_concerns.truncate(20);

    Ok(VirtualInspection {
        summary,
        threshold_crossings,
        depth_distribution,
        top_concerns,
        predictions,
    })
}

/// Risk tier for a predicted depth: >=70 Critical, >=50 High, >=30 Medium.
fn predicted_risk(depth: f64) -> RiskCategory {
    if depth >= 70.0 {
        RiskCategory::Critical
    } else if depth >= 50.0 {
        RiskCategory::High
    } else if depth >= 30.0 {
        RiskCategory::Medium
    } else {
        RiskCategory::Low
    }
}

fn count_crossings(predictions: &[PredictedAnomaly], threshold: f64) -> usize {
    predictions
        .iter()
        .filter(|p| p.current_depth_pct < threshold && p.predicted_depth_pct >= threshold)
        .count()
}

fn count_in_band(predictions: &[PredictedAnomaly], low: f64, high: f64) -> usize {
    predictions
        .iter()
        .filter(|p| p.predicted_depth_pct >= low && p.predicted_depth_pct < high)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::YearSnapshot;
    use crate::config::AnalysisConfig;
    use crate::growth::score_matches;
    use crate::matching::match_anomalies;
    use crate::record::{AlignedFeature, AlignedRun, FeatureRecord, IdOd};
    use approx::assert_relative_eq;

    fn feature(row: usize, distance: f64, depth: f64) -> AlignedFeature {
        AlignedFeature {
            feature: FeatureRecord {
                joint_number: Some(5),
                log_distance_ft: distance,
                elevation_ft: f64::NAN,
                event_type: EventType::MetalLoss,
                depth_pct: depth,
                depth_in: f64::NAN,
                length_in: 2.0,
                width_in: 1.0,
                clock_hours: 3.0,
                id_od: IdOd::External,
                wall_thickness_in: 0.3,
                comments: None,
                source_row_idx: row,
            },
            corrected_distance: distance,
        }
    }

    fn base_matches() -> Vec<MatchRecord> {
        let config = AnalysisConfig::default();
        let earlier = AlignedRun {
            year: 2015,
            features: vec![feature(0, 1000.0, 30.0), feature(1, 2000.0, 45.0)],
        };
        let later = AlignedRun {
            year: 2022,
            features: vec![feature(0, 1000.1, 44.0), feature(1, 2000.1, 66.0)],
        };
        let mut outcome = match_anomalies(&later, &earlier, 7.0, &config);
        score_matches(&mut outcome.matches, &config);
        outcome.matches
    }

    fn snapshot(year: i32, row: usize, depth: f64) -> YearSnapshot {
        YearSnapshot {
            year,
            joint: Some(5),
            distance: 1000.0,
            clock: 3.0,
            depth_pct: depth,
            length_in: 2.0,
            width_in: 1.0,
            row_idx: row,
        }
    }

    fn triple_with_rate(last_row: usize, linear_rate: f64) -> TripleMatch {
        TripleMatch {
            first: snapshot(2007, last_row, 20.0),
            middle: snapshot(2015, last_row, 30.0),
            last: snapshot(2022, last_row, 44.0),
            confidence_12: 0.9,
            confidence_23: 0.9,
            min_confidence: 0.9,
            total_depth_growth: 24.0,
            total_years: 15.0,
            overall_growth_rate: 1.6,
            linear_rate,
            linear_r2: 0.99,
            predicted_2030: f64::NAN,
            predicted_2035: f64::NAN,
            is_accelerating: false,
        }
    }

    #[test]
    fn test_extrapolation_and_clamping() {
        let config = AnalysisConfig::default();
        let matches = base_matches();
        let result =
            predict_future_inspection(&matches, (2015, 2022), &[], 2030, &config).unwrap();

        assert_eq!(result.summary.total_predicted, 2);
        assert_relative_eq!(result.summary.years_forward, 8.0);

        // Rate 2 %/yr from 44% -> 60% in 2030
        let p0 = result
            .predictions
            .iter()
            .find(|p| p.joint == Some(5) && (p.current_depth_pct - 44.0).abs() < 1e-9)
            .unwrap();
        assert_relative_eq!(p0.predicted_depth_pct, 60.0, epsilon = 1e-9);
        assert_eq!(p0.predicted_risk, RiskCategory::High);
        assert!(!p0.is_triple_tracked);

        // Rate 3 %/yr from 66% -> 90% in 2030
        let p1 = result
            .predictions
            .iter()
            .find(|p| (p.current_depth_pct - 66.0).abs() < 1e-9)
            .unwrap();
        assert_relative_eq!(p1.predicted_depth_pct, 90.0, epsilon = 1e-9);
        assert_eq!(p1.predicted_risk, RiskCategory::Critical);
        assert_relative_eq!(p1.years_to_repair_threshold, 0.0);
        assert_eq!(result.summary.needing_repair_by_target, 1);
    }

    #[test]
    fn test_triple_rate_preferred() {
        let config = AnalysisConfig::default();
        let matches = base_matches();
        let triples = vec![triple_with_rate(0, 1.0)];
        let result =
            predict_future_inspection(&matches, (2015, 2022), &triples, 2030, &config).unwrap();

        let p0 = result
            .predictions
            .iter()
            .find(|p| (p.current_depth_pct - 44.0).abs() < 1e-9)
            .unwrap();
        assert!(p0.is_triple_tracked);
        assert_relative_eq!(p0.growth_rate, 1.0);
        // 44 + 1.0 * 8
        assert_relative_eq!(p0.predicted_depth_pct, 52.0, epsilon = 1e-9);
    }

    #[test]
    fn test_threshold_crossings() {
        let config = AnalysisConfig::default();
        let matches = base_matches();
        let result =
            predict_future_inspection(&matches, (2015, 2022), &[], 2030, &config).unwrap();

        // 44 -> 60 crosses 50 and 60; 66 -> 90 crosses 70 and 80
        assert_eq!(result.threshold_crossings.crossing_50, 1);
        assert_eq!(result.threshold_crossings.crossing_60, 1);
        assert_eq!(result.threshold_crossings.crossing_70, 1);
        assert_eq!(result.threshold_crossings.crossing_80, 1);

        assert_eq!(result.depth_distribution.bin_40_60, 0);
        assert_eq!(result.depth_distribution.bin_60_80, 1);
        assert_eq!(result.depth_distribution.bin_80_100, 1);
    }

    #[test]
    fn test_target_year_must_be_future() {
        let config = AnalysisConfig::default();
        let matches = base_matches();
        assert!(matches!(
            predict_future_inspection(&matches, (2015, 2022), &[], 2022, &config),
            Err(AnalysisError::PredictionUnavailable(_))
        ));
        assert!(matches!(
            predict_future_inspection(&matches, (2015, 2022), &[], 2010, &config),
            Err(AnalysisError::PredictionUnavailable(_))
        ));
    }

    #[test]
    fn test_empty_base_unavailable() {
        let config = AnalysisConfig::default();
        assert!(matches!(
            predict_future_inspection(&[], (2015, 2022), &[], 2030, &config),
            Err(AnalysisError::PredictionUnavailable(_))
        ));
    }
}
