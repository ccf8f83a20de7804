//! Multi-run chaining: composing pairwise matches into per-defect
//! lifecycles spanning all three runs.
//!
//! The join key is the shared middle-run row index: if the (y1, y2) pair
//! matched anomaly B (in y2) to A (in y1), and the (y2, y3) pair matched C
//! (in y3) to the same B, then A -> B -> C is one physical defect tracked
//! across the full inspection history.

use crate::matching::{safe_sub, MatchOutcome, MatchRecord, MatchSide};
use serde::Serialize;
use std::collections::HashMap;

/// Per-year snapshot carried by a triple match.
#[derive(Debug, Clone, Serialize)]
pub struct YearSnapshot {
    pub year: i32,
    pub joint: Option<i64>,
    pub distance: f64,
    pub clock: f64,
    pub depth_pct: f64,
    pub length_in: f64,
    pub width_in: f64,
    pub row_idx: usize,
}

impl YearSnapshot {
    fn from_side(side: &MatchSide) -> Self {
        Self {
            year: side.year,
            joint: side.joint,
            distance: side.distance,
            clock: side.clock,
            depth_pct: side.depth_pct,
            length_in: side.length_in,
            width_in: side.width_in,
            row_idx: side.row_idx,
        }
    }
}

/// An anomaly matched consistently across all three runs.
#[derive(Debug, Clone, Serialize)]
pub struct TripleMatch {
    pub first: YearSnapshot,
    pub middle: YearSnapshot,
    pub last: YearSnapshot,
    pub confidence_12: f64,
    pub confidence_23: f64,
    /// The chain is only as trustworthy as its weaker link.
    pub min_confidence: f64,
    pub total_depth_growth: f64,
    pub total_years: f64,
    pub overall_growth_rate: f64,
    // Trend fitting (populated by `growth::predict_growth_trends`).
    pub linear_rate: f64,
    pub linear_r2: f64,
    pub predicted_2030: f64,
    pub predicted_2035: f64,
    pub is_accelerating: bool,
}

impl TripleMatch {
    /// (year, depth) observations in chronological order.
    pub fn year_depths(&self) -> [(i32, f64); 3] {
        [
            (self.first.year, self.first.depth_pct),
            (self.middle.year, self.middle.depth_pct),
            (self.last.year, self.last.depth_pct),
        ]
    }
}

/// One lifecycle category with its anomaly count.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleCount {
    pub category: String,
    pub count: usize,
}

/// Chained three-run tracking result.
#[derive(Debug, Clone, Serialize)]
pub struct ChainOutcome {
    pub triple_matches: Vec<TripleMatch>,
    pub lifecycle_summary: Vec<LifecycleCount>,
}

/// Compose the (y1, y2) and (y2, y3) pairwise results into triple matches
/// and a lifecycle summary. `total_years` is the known gap from y1 to y3.
pub fn chain_three_runs(
    m12: &MatchOutcome,
    m23: &MatchOutcome,
    years: [i32; 3],
    total_years: f64,
) -> ChainOutcome {
    // Lookup from each y2 anomaly's row index to its y1 match.
    let mut middle_lookup: HashMap<usize, &MatchRecord> = HashMap::new();
    for record in &m12.matches {
        middle_lookup.insert(record.later.row_idx, record);
    }

    let mut triples = Vec::new();
    for m23_record in &m23.matches {
        let Some(m12_record) = middle_lookup.get(&m23_record.earlier.row_idx) else {
            continue;
        };
        let total_depth_growth =
            safe_sub(m23_record.later.depth_pct, m12_record.earlier.depth_pct);
        triples.push(TripleMatch {
            first: YearSnapshot::from_side(&m12_record.earlier),
            middle: YearSnapshot::from_side(&m23_record.earlier),
            last: YearSnapshot::from_side(&m23_record.later),
            confidence_12: m12_record.confidence,
            confidence_23: m23_record.confidence,
            min_confidence: m12_record.confidence.min(m23_record.confidence),
            total_depth_growth,
            total_years,
            overall_growth_rate: total_depth_growth / total_years,
            linear_rate: f64::NAN,
            linear_r2: f64::NAN,
            predicted_2030: f64::NAN,
            predicted_2035: f64::NAN,
            is_accelerating: false,
        });
    }

    let lifecycle_summary = build_lifecycle_summary(&triples, m12, m23, years);

    ChainOutcome {
        triple_matches: triples,
        lifecycle_summary,
    }
}

/// Five lifecycle categories, in fixed order:
/// tracked across all runs; first seen in y2 and still present; first seen
/// in y3; gone after y1; gone after y2.
fn build_lifecycle_summary(
    triples: &[TripleMatch],
    m12: &MatchOutcome,
    m23: &MatchOutcome,
    years: [i32; 3],
) -> Vec<LifecycleCount> {
    let [y1, y2, y3] = years;
    vec![
        LifecycleCount {
            category: "Tracked All 3 Runs".to_string(),
            count: triples.len(),
        },
        LifecycleCount {
            category: format!("New in {y2} (tracked to {y3})"),
            count: m23.matches.len() - triples.len(),
        },
        LifecycleCount {
            category: format!("New in {y3}"),
            count: m23.new_anomalies.len(),
        },
        LifecycleCount {
            category: format!("Disappeared after {y1}"),
            count: m12.missing_anomalies.len(),
        },
        LifecycleCount {
            category: format!("Disappeared after {y2}"),
            count: m23.missing_anomalies.len(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::matching::match_anomalies;
    use crate::record::{AlignedFeature, AlignedRun, EventType, FeatureRecord, IdOd};
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

    fn three_run_outcomes() -> (MatchOutcome, MatchOutcome) {
        let config = AnalysisConfig::default();
        let run_2007 = AlignedRun {
            year: 2007,
            features: vec![feature(0, 1000.0, 20.0), feature(1, 2000.0, 15.0)],
        };
        let run_2015 = AlignedRun {
            year: 2015,
            features: vec![feature(0, 1000.1, 24.0), feature(1, 3000.0, 10.0)],
        };
        let run_2022 = AlignedRun {
            year: 2022,
            features: vec![feature(0, 1000.2, 30.0), feature(1, 3000.1, 14.0)],
        };

        let m12 = match_anomalies(&run_2015, &run_2007, 8.0, &config);
        let m23 = match_anomalies(&run_2022, &run_2015, 7.0, &config);
        (m12, m23)
    }

    #[test]
    fn test_triple_chain_join() {
        let (m12, m23) = three_run_outcomes();
        let chain = chain_three_runs(&m12, &m23, [2007, 2015, 2022], 15.0);

        assert_eq!(chain.triple_matches.len(), 1);
        let triple = &chain.triple_matches[0];
        assert_eq!(triple.first.row_idx, 0);
        assert_eq!(triple.middle.row_idx, 0);
        assert_eq!(triple.last.row_idx, 0);
        assert_relative_eq!(triple.first.depth_pct, 20.0);
        assert_relative_eq!(triple.middle.depth_pct, 24.0);
        assert_relative_eq!(triple.last.depth_pct, 30.0);
        assert_relative_eq!(triple.total_depth_growth, 10.0);
        assert_relative_eq!(triple.total_years, 15.0);
        assert_relative_eq!(triple.overall_growth_rate, 10.0 / 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_middle_row_consistency() {
        let (m12, m23) = three_run_outcomes();
        let chain = chain_three_runs(&m12, &m23, [2007, 2015, 2022], 15.0);

        for triple in &chain.triple_matches {
            let m12_record = m12
                .matches
                .iter()
                .find(|m| m.later.row_idx == triple.middle.row_idx)
                .expect("triple middle must come from m12's later side");
            let m23_record = m23
                .matches
                .iter()
                .find(|m| m.earlier.row_idx == triple.middle.row_idx)
                .expect("triple middle must come from m23's earlier side");
            assert_eq!(triple.confidence_12, m12_record.confidence);
            assert_eq!(triple.confidence_23, m23_record.confidence);
            assert!(triple.min_confidence <= triple.confidence_12);
            assert!(triple.min_confidence <= triple.confidence_23);
        }
    }

    #[test]
    fn test_lifecycle_summary_counts() {
        let (m12, m23) = three_run_outcomes();
        let chain = chain_three_runs(&m12, &m23, [2007, 2015, 2022], 15.0);

        let counts: Vec<(String, usize)> = chain
            .lifecycle_summary
            .iter()
            .map(|c| (c.category.clone(), c.count))
            .collect();

        // One defect tracked all three runs; the 2015 stranger at 3000 ft
        // is matched to 2022 (new in 2015, tracked on); nothing is brand
        // new in 2022; the 2007 defect at 2000 ft disappeared.
        assert_eq!(counts[0], ("Tracked All 3 Runs".to_string(), 1));
        assert_eq!(counts[1], ("New in 2015 (tracked to 2022)".to_string(), 1));
        assert_eq!(counts[2], ("New in 2022".to_string(), 0));
        assert_eq!(counts[3], ("Disappeared after 2007".to_string(), 1));
        assert_eq!(counts[4], ("Disappeared after 2015".to_string(), 0));
    }

    #[test]
    fn test_empty_pairs_chain_to_empty() {
        let config = AnalysisConfig::default();
        let empty = AlignedRun {
            year: 2007,
            features: vec![],
        };
        let m_empty = match_anomalies(&empty, &empty, 8.0, &config);
        let chain = chain_three_runs(&m_empty, &m_empty, [2007, 2015, 2022], 15.0);
        assert!(chain.triple_matches.is_empty());
        assert_eq!(chain.lifecycle_summary.len(), 5);
        assert!(chain.lifecycle_summary.iter().all(|c| c.count == 0));
    }
}
