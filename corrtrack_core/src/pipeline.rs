//! Full analysis pipeline: alignment, pairwise matching, growth scoring,
//! chaining and trend fitting, returned as one immutable bundle.
//!
//! The pipeline is pure, batch and single-threaded: inputs are fully
//! materialized before it starts, outputs come back as a single value, and
//! the same inputs and configuration always produce the same bundle.

use crate::alignment::{align_runs, Alignment, AlignmentStats, WeldAlignmentTable};
use crate::chain::{chain_three_runs, ChainOutcome};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::growth::{predict_growth_trends, score_matches};
use crate::matching::{match_anomalies, MatchOutcome};
use crate::record::{AlignedRun, Run};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One pairwise comparison keyed by its (earlier, later) years.
#[derive(Debug, Clone, Serialize)]
pub struct PairwiseResult {
    pub earlier_year: i32,
    pub later_year: i32,
    pub outcome: MatchOutcome,
}

/// Matching and chaining results across all runs.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResults {
    /// Consecutive run pairs in chronological order.
    pub pairwise: Vec<PairwiseResult>,
    /// First run matched directly against the last, skipping the middle
    /// run - a consistency check on the chained result.
    pub direct_first_last: Option<PairwiseResult>,
    pub chain: Option<ChainOutcome>,
}

impl AnalysisResults {
    /// The match outcome for a specific (earlier, later) pair.
    pub fn pair(&self, earlier: i32, later: i32) -> Option<&MatchOutcome> {
        self.pairwise
            .iter()
            .find(|p| p.earlier_year == earlier && p.later_year == later)
            .map(|p| &p.outcome)
    }

    /// The preferred match set for downstream analytics: the pair with the
    /// most recent later year, breaking ties toward the shorter interval.
    pub fn best_pairwise(&self) -> Option<&PairwiseResult> {
        self.pairwise
            .iter()
            .max_by_key(|p| (p.later_year, p.earlier_year))
    }
}

/// Everything one analysis run produces. Replaced wholesale on re-analysis;
/// never mutated in place.
#[derive(Debug, Clone, Serialize)]
pub struct ResultBundle {
    pub runs: BTreeMap<i32, Run>,
    pub gw_alignment: WeldAlignmentTable,
    pub corrected_runs: BTreeMap<i32, AlignedRun>,
    pub results: AnalysisResults,
    pub alignment_stats: AlignmentStats,
}

impl ResultBundle {
    /// The raw run for a year, or `MissingRun` when it was never loaded.
    pub fn run(&self, year: i32) -> Result<&Run, AnalysisError> {
        self.runs.get(&year).ok_or(AnalysisError::MissingRun(year))
    }

    /// The aligned run for a year, or `MissingRun` when it was never
    /// loaded.
    pub fn corrected_run(&self, year: i32) -> Result<&AlignedRun, AnalysisError> {
        self.corrected_runs
            .get(&year)
            .ok_or(AnalysisError::MissingRun(year))
    }
}

/// Run the complete multi-run analysis.
///
/// Alignment failures are fatal and surface immediately; everything
/// downstream degrades gracefully on sparse data instead of failing.
pub fn analyze(
    runs: BTreeMap<i32, Run>,
    config: &AnalysisConfig,
) -> Result<ResultBundle, AnalysisError> {
    config.validate()?;

    let years: Vec<i32> = runs.keys().copied().collect();
    info!(?years, "starting multi-run analysis");

    let Alignment {
        gw_alignment,
        corrected_runs,
        stats: alignment_stats,
    } = align_runs(&runs)?;
    info!(
        common_joints = alignment_stats.common_joints,
        "girth-weld alignment complete"
    );

    // Pairwise matching for each consecutive run pair, scored in place.
    let mut pairwise = Vec::new();
    for window in years.windows(2) {
        let (earlier, later) = (window[0], window[1]);
        let years_between = config.years_between(earlier, later);
        let mut outcome = match_anomalies(
            &corrected_runs[&later],
            &corrected_runs[&earlier],
            years_between,
            config,
        );
        score_matches(&mut outcome.matches, config);
        debug!(
            earlier,
            later,
            matches = outcome.stats.total_matches,
            new = outcome.stats.new_anomalies,
            missing = outcome.stats.missing_anomalies,
            "pairwise matching complete"
        );
        pairwise.push(PairwiseResult {
            earlier_year: earlier,
            later_year: later,
            outcome,
        });
    }

    // Direct first-to-last pairing validates the chained result.
    let direct_first_last = if years.len() >= 3 {
        let (first, last) = (years[0], years[years.len() - 1]);
        let years_between = config.years_between(first, last);
        let mut outcome = match_anomalies(
            &corrected_runs[&last],
            &corrected_runs[&first],
            years_between,
            config,
        );
        score_matches(&mut outcome.matches, config);
        Some(PairwiseResult {
            earlier_year: first,
            later_year: last,
            outcome,
        })
    } else {
        None
    };

    // Chain the first three runs into per-defect lifecycles and fit
    // growth trends.
    let chain = if years.len() >= 3 {
        let chain_years = [years[0], years[1], years[2]];
        let total_years = config.years_between(chain_years[0], chain_years[2]);
        let mut chain = chain_three_runs(
            &pairwise[0].outcome,
            &pairwise[1].outcome,
            chain_years,
            total_years,
        );
        predict_growth_trends(&mut chain.triple_matches);
        info!(
            triples = chain.triple_matches.len(),
            "chained pairwise matches across runs"
        );
        Some(chain)
    } else {
        None
    };

    Ok(ResultBundle {
        runs,
        gw_alignment,
        corrected_runs,
        results: AnalysisResults {
            pairwise,
            direct_first_last,
            chain,
        },
        alignment_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EventType, FeatureRecord, IdOd};

    fn record(
        row: usize,
        joint: i64,
        distance: f64,
        event_type: EventType,
        depth: f64,
    ) -> FeatureRecord {
        FeatureRecord {
            joint_number: Some(joint),
            log_distance_ft: distance,
            elevation_ft: f64::NAN,
            event_type,
            depth_pct: depth,
            depth_in: f64::NAN,
            length_in: 2.0,
            width_in: 1.0,
            clock_hours: 6.0,
            id_od: IdOd::External,
            wall_thickness_in: 0.3,
            comments: None,
            source_row_idx: row,
        }
    }

    /// Three runs with welds at joints 1/2/3 and one defect that grows
    /// from 20% to 24% to 30%, under mild per-run odometer drift.
    fn three_runs() -> BTreeMap<i32, Run> {
        let mut runs = BTreeMap::new();
        runs.insert(
            2007,
            Run::new(
                2007,
                vec![
                    record(0, 1, 100.0, EventType::GirthWeld, f64::NAN),
                    record(1, 1, 120.0, EventType::MetalLoss, 20.0),
                    record(2, 2, 140.0, EventType::GirthWeld, f64::NAN),
                    record(3, 3, 180.0, EventType::GirthWeld, f64::NAN),
                ],
            ),
        );
        runs.insert(
            2015,
            Run::new(
                2015,
                vec![
                    record(0, 1, 101.0, EventType::GirthWeld, f64::NAN),
                    record(1, 1, 121.1, EventType::MetalLoss, 24.0),
                    record(2, 2, 141.2, EventType::GirthWeld, f64::NAN),
                    record(3, 3, 181.4, EventType::GirthWeld, f64::NAN),
                ],
            ),
        );
        runs.insert(
            2022,
            Run::new(
                2022,
                vec![
                    record(0, 1, 99.5, EventType::GirthWeld, f64::NAN),
                    record(1, 1, 119.6, EventType::MetalLoss, 30.0),
                    record(2, 2, 139.5, EventType::GirthWeld, f64::NAN),
                    record(3, 3, 179.4, EventType::GirthWeld, f64::NAN),
                ],
            ),
        );
        runs
    }

    #[test]
    fn test_full_pipeline() {
        let config = AnalysisConfig::default();
        let bundle = analyze(three_runs(), &config).unwrap();

        assert_eq!(bundle.alignment_stats.common_joints, 3);
        assert_eq!(bundle.results.pairwise.len(), 2);
        assert_eq!(bundle.results.pairwise[0].earlier_year, 2007);
        assert_eq!(bundle.results.pairwise[0].later_year, 2015);
        assert_eq!(bundle.results.pairwise[1].later_year, 2022);

        for pair in &bundle.results.pairwise {
            assert_eq!(pair.outcome.stats.total_matches, 1);
            // The scorer ran: risk fields are populated
            let m = &pair.outcome.matches[0];
            assert!(m.risk_score.is_finite());
        }

        let direct = bundle.results.direct_first_last.as_ref().unwrap();
        assert_eq!(direct.earlier_year, 2007);
        assert_eq!(direct.later_year, 2022);
        assert_eq!(direct.outcome.stats.total_matches, 1);

        let chain = bundle.results.chain.as_ref().unwrap();
        assert_eq!(chain.triple_matches.len(), 1);
        let triple = &chain.triple_matches[0];
        assert_eq!(triple.total_years, 15.0);
        // Trend fit ran over depths 20/24/30
        assert!(triple.linear_rate.is_finite());
        assert!(triple.linear_rate > 0.0);
        assert!(triple.is_accelerating);
    }

    #[test]
    fn test_best_pairwise_prefers_latest() {
        let config = AnalysisConfig::default();
        let bundle = analyze(three_runs(), &config).unwrap();
        let best = bundle.results.best_pairwise().unwrap();
        assert_eq!((best.earlier_year, best.later_year), (2015, 2022));
    }

    #[test]
    fn test_missing_run_lookup() {
        let config = AnalysisConfig::default();
        let bundle = analyze(three_runs(), &config).unwrap();
        assert!(bundle.run(2015).is_ok());
        assert!(matches!(
            bundle.run(2010),
            Err(AnalysisError::MissingRun(2010))
        ));
        assert!(matches!(
            bundle.corrected_run(1999),
            Err(AnalysisError::MissingRun(1999))
        ));
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let config = AnalysisConfig {
            weight_distance: 0.9,
            ..Default::default()
        };
        assert!(matches!(
            analyze(three_runs(), &config),
            Err(AnalysisError::Config(_))
        ));
    }

    #[test]
    fn test_bundle_serializes_without_nan() {
        let config = AnalysisConfig::default();
        let bundle = analyze(three_runs(), &config).unwrap();
        let json = serde_json::to_value(&bundle).unwrap();
        // Non-finite floats must serialize as null, never as NaN tokens.
        fn assert_finite(value: &serde_json::Value) {
            match value {
                serde_json::Value::Number(n) => {
                    assert!(n.as_f64().map(f64::is_finite).unwrap_or(true));
                }
                serde_json::Value::Array(items) => items.iter().for_each(assert_finite),
                serde_json::Value::Object(map) => map.values().for_each(assert_finite),
                _ => {}
            }
        }
        assert_finite(&json);
    }

    #[test]
    fn test_determinism() {
        let config = AnalysisConfig::default();
        let a = analyze(three_runs(), &config).unwrap();
        let b = analyze(three_runs(), &config).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
