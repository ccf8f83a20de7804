//! Anomaly matching engine - globally optimal 1-to-1 pairing across runs.
//!
//! Three-stage pipeline:
//! 1. Candidate generation - embed pipe distance and clock position into a
//!    3-D Euclidean space and query a grid index for nearby earlier-run
//!    anomalies.
//! 2. Gating + similarity - exact tolerance gates, then a weighted
//!    multi-attribute similarity for every surviving candidate pair.
//! 3. Global assignment - Kuhn-Munkres over the cost matrix
//!    (cost = 1 - similarity) for a globally optimal 1-to-1 pairing,
//!    followed by confidence scoring and filtering. Unmatched later-run
//!    anomalies classify as new, unmatched earlier-run anomalies as
//!    missing.

use crate::config::AnalysisConfig;
use crate::growth::{GrowthClass, RiskCategory};
use crate::index::CandidateIndex;
use crate::record::{AlignedFeature, AlignedRun, EventType, IdOd};
use nalgebra::Vector3;
use ordered_float::OrderedFloat;
use pathfinding::matrix::Matrix;
use pathfinding::prelude::kuhn_munkres_min;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashSet;
use std::f64::consts::PI;
use std::fmt;

/// Sentinel cost for non-candidate cells. Large enough that the solver
/// only selects such a pair when a row has no viable candidate at all, in
/// which case the confidence cut removes it.
const LARGE_COST: f64 = 1e6;

// ============================================================================
// CLOCK UTILITIES
// ============================================================================

/// Circular distance between two clock positions on the 12-hour face.
///
/// Result in [0, 6]: 11:00 and 1:00 are 2 hours apart, not 10, because the
/// shortest arc wraps through 12. Returns 6.0 (diametrically opposite, the
/// maximum) when either value is unknown, which also fails the clock gate
/// downstream.
pub fn clock_distance(h1: f64, h2: f64) -> f64 {
    if h1.is_nan() || h2.is_nan() {
        return 6.0;
    }
    let diff = (h1 - h2).abs() % 12.0;
    diff.min(12.0 - diff)
}

/// Embed clock hours as (cos, sin) on the unit circle.
///
/// A raw numeric encoding breaks Euclidean candidate search because 0 and
/// 12 are the same physical point. On the unit circle, Euclidean distance
/// reflects angular proximity with correct wraparound. Unknown hours map
/// to the origin, which is equidistant from every point on the circle - a
/// neutral unknown.
pub fn clock_to_trig(hours: f64) -> (f64, f64) {
    if hours.is_nan() {
        return (0.0, 0.0);
    }
    let theta = hours * PI / 6.0;
    (theta.cos(), theta.sin())
}

fn embed(distance: f64, clock_hours: f64) -> Vector3<f64> {
    let (cos_c, sin_c) = clock_to_trig(clock_hours);
    Vector3::new(distance, cos_c, sin_c)
}

// ============================================================================
// MATCH RECORDS
// ============================================================================

/// Confidence tier for a matched pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
}

impl fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfidenceLabel::High => "HIGH",
            ConfidenceLabel::Medium => "MEDIUM",
            ConfidenceLabel::Low => "LOW",
        };
        f.write_str(label)
    }
}

/// One side of a matched pair - the feature as its run reported it.
#[derive(Debug, Clone, Serialize)]
pub struct MatchSide {
    pub year: i32,
    pub joint: Option<i64>,
    /// Position in the reference frame.
    pub distance: f64,
    /// Position as logged by the tool.
    pub orig_distance: f64,
    pub clock: f64,
    pub depth_pct: f64,
    pub length_in: f64,
    pub width_in: f64,
    pub event_type: EventType,
    pub id_od: IdOd,
    pub wall_thickness: f64,
    pub comments: Option<String>,
    pub row_idx: usize,
}

impl MatchSide {
    fn from_feature(year: i32, aligned: &AlignedFeature) -> Self {
        let f = &aligned.feature;
        Self {
            year,
            joint: f.joint_number,
            distance: aligned.corrected_distance,
            orig_distance: f.log_distance_ft,
            clock: f.clock_hours,
            depth_pct: f.depth_pct,
            length_in: f.length_in,
            width_in: f.width_in,
            event_type: f.event_type.clone(),
            id_od: f.id_od,
            wall_thickness: f.wall_thickness_in,
            comments: f.comments.clone(),
            row_idx: f.source_row_idx,
        }
    }
}

/// A matched anomaly pair with its scores and growth deltas.
///
/// Created by the matcher; the growth scorer fills the trailing
/// assessment fields in place. Otherwise immutable.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRecord {
    pub similarity: f64,
    pub confidence: f64,
    pub confidence_label: ConfidenceLabel,
    pub earlier: MatchSide,
    pub later: MatchSide,
    pub years_between: f64,
    pub depth_growth_pct: f64,
    /// Annualized depth growth (% points per year).
    pub depth_growth_rate: f64,
    pub length_growth_in: f64,
    pub length_growth_rate: f64,
    pub width_growth_in: f64,
    pub width_growth_rate: f64,
    // Growth-scorer enrichment; NaN / Unknown until scored.
    pub remaining_wall_pct: f64,
    pub remaining_life_years: f64,
    pub growth_class: GrowthClass,
    pub risk_score: f64,
    pub risk_category: RiskCategory,
}

/// Aggregate statistics for one pairwise comparison.
#[derive(Debug, Clone, Serialize)]
pub struct MatchStats {
    pub total_matches: usize,
    pub new_anomalies: usize,
    pub missing_anomalies: usize,
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub low_confidence: usize,
    pub avg_similarity: f64,
    pub avg_confidence: f64,
    /// Mean annualized depth growth over pairs with a defined rate.
    pub avg_depth_growth_rate: f64,
    pub negative_growth_count: usize,
    pub high_growth_count: usize,
}

/// Full result of matching one (earlier, later) run pair.
///
/// `matches`, `new_anomalies` and `missing_anomalies` partition the two
/// input anomaly sets: every anomaly row appears in exactly one of them.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub matches: Vec<MatchRecord>,
    pub new_anomalies: Vec<AlignedFeature>,
    pub missing_anomalies: Vec<AlignedFeature>,
    pub stats: MatchStats,
}

// ============================================================================
// MATCHING PIPELINE
// ============================================================================

/// Match anomalies between a later and an earlier aligned run.
///
/// Never fails on data content: an empty side yields an empty match set
/// with every anomaly classified new or missing. Match records are emitted
/// in later-run row order.
pub fn match_anomalies(
    later: &AlignedRun,
    earlier: &AlignedRun,
    years_between: f64,
    config: &AnalysisConfig,
) -> MatchOutcome {
    let anom_later = later.matchable_anomalies();
    let anom_earlier = earlier.matchable_anomalies();

    let n_later = anom_later.len();
    let n_earlier = anom_earlier.len();

    if n_later == 0 || n_earlier == 0 {
        let new_anomalies: Vec<AlignedFeature> =
            anom_later.iter().map(|f| (*f).clone()).collect();
        let missing_anomalies: Vec<AlignedFeature> =
            anom_earlier.iter().map(|f| (*f).clone()).collect();
        let stats = compute_stats(&[], new_anomalies.len(), missing_anomalies.len(), config);
        return MatchOutcome {
            matches: Vec::new(),
            new_anomalies,
            missing_anomalies,
            stats,
        };
    }

    // Stage 1: bucket earlier-run anomalies in the embedding grid. The
    // query radius is a superset filter; exact gates follow.
    let search_radius = config.distance_tolerance_ft.max(2.0);
    let mut index = CandidateIndex::new(search_radius);
    for f in &anom_earlier {
        index.insert(embed(f.corrected_distance, f.feature.clock_hours));
    }

    // Stage 2: gate candidates and fill the cost matrix.
    let mut cost = Matrix::new(n_later, n_earlier, OrderedFloat(LARGE_COST));
    let mut candidate_counts = vec![0usize; n_later];
    for (i, a_l) in anom_later.iter().enumerate() {
        let point = embed(a_l.corrected_distance, a_l.feature.clock_hours);
        for j in index.query_radius(&point, search_radius) {
            let a_e = anom_earlier[j];
            if !passes_gates(a_l, a_e, config) {
                continue;
            }
            let sim = compute_similarity(a_l, a_e, config);
            cost[(i, j)] = OrderedFloat(1.0 - sim);
            candidate_counts[i] += 1;
        }
    }

    // Stage 3: globally optimal 1-to-1 assignment, then confidence
    // filtering.
    let assignment = solve_assignment(&cost, n_later, n_earlier);
    let cost_cut = 1.0 - config.low_confidence;

    let mut matches = Vec::new();
    let mut matched_later: HashSet<usize> = HashSet::new();
    let mut matched_earlier: HashSet<usize> = HashSet::new();
    for (i, j) in assignment {
        let pair_cost = cost[(i, j)].into_inner();
        if pair_cost >= cost_cut {
            continue;
        }
        let similarity = 1.0 - pair_cost;
        let a_l = anom_later[i];
        let a_e = anom_earlier[j];

        let confidence =
            compute_confidence(similarity, candidate_counts[i], a_l, a_e, years_between, config);
        let label = classify_confidence(confidence, config);

        matches.push(build_match_record(
            later.year,
            earlier.year,
            a_l,
            a_e,
            similarity,
            confidence,
            label,
            years_between,
        ));
        matched_later.insert(i);
        matched_earlier.insert(j);
    }
    matches.sort_by_key(|m| m.later.row_idx);

    let new_anomalies: Vec<AlignedFeature> = anom_later
        .iter()
        .enumerate()
        .filter(|(i, _)| !matched_later.contains(i))
        .map(|(_, f)| (*f).clone())
        .collect();
    let missing_anomalies: Vec<AlignedFeature> = anom_earlier
        .iter()
        .enumerate()
        .filter(|(j, _)| !matched_earlier.contains(j))
        .map(|(_, f)| (*f).clone())
        .collect();

    let stats = compute_stats(&matches, new_anomalies.len(), missing_anomalies.len(), config);

    MatchOutcome {
        matches,
        new_anomalies,
        missing_anomalies,
        stats,
    }
}

/// Run Kuhn-Munkres on the cost matrix, returning (later, earlier) index
/// pairs. The solver requires rows <= columns, so the wider-than-tall case
/// is solved transposed and mapped back.
fn solve_assignment(
    cost: &Matrix<OrderedFloat<f64>>,
    n_later: usize,
    n_earlier: usize,
) -> Vec<(usize, usize)> {
    if n_later <= n_earlier {
        let (_, assignment) = kuhn_munkres_min(cost);
        assignment.into_iter().enumerate().collect()
    } else {
        let transposed = cost.transposed();
        let (_, assignment) = kuhn_munkres_min(&transposed);
        assignment.into_iter().enumerate().map(|(j, i)| (i, j)).collect()
    }
}

/// Exact tolerance gates: axial offset, circular clock offset, event-type
/// compatibility.
fn passes_gates(a_l: &AlignedFeature, a_e: &AlignedFeature, config: &AnalysisConfig) -> bool {
    let dist_diff = (a_l.corrected_distance - a_e.corrected_distance).abs();
    if dist_diff > config.distance_tolerance_ft {
        return false;
    }
    let clk_diff = clock_distance(a_l.feature.clock_hours, a_e.feature.clock_hours);
    if clk_diff > config.clock_tolerance_hours {
        return false;
    }
    a_l.feature
        .event_type
        .compatible_with(&a_e.feature.event_type)
}

// ============================================================================
// SIMILARITY
// ============================================================================

/// Weighted multi-attribute similarity in [0, 1].
///
/// Five sub-scores, each decaying linearly from 1.0 at no difference:
/// distance, clock, depth, dimensions, type. The depth term is asymmetric:
/// corrosion is expected to grow, so increases decay gently (divisor 30)
/// while apparent shrinkage is physically implausible and decays three
/// times as fast (divisor 10).
pub fn compute_similarity(
    a_l: &AlignedFeature,
    a_e: &AlignedFeature,
    config: &AnalysisConfig,
) -> f64 {
    let dist_diff = (a_l.corrected_distance - a_e.corrected_distance).abs();
    let s_dist = (1.0 - dist_diff / config.distance_tolerance_ft).max(0.0);

    let clk_diff = clock_distance(a_l.feature.clock_hours, a_e.feature.clock_hours);
    let s_clock = (1.0 - clk_diff / (config.clock_tolerance_hours * 6.0)).max(0.0);

    let d_l = a_l.feature.depth_pct;
    let d_e = a_e.feature.depth_pct;
    let s_depth = if d_l.is_nan() || d_e.is_nan() {
        0.5
    } else {
        let depth_diff = d_l - d_e;
        if depth_diff >= 0.0 {
            (1.0 - depth_diff / 30.0).max(0.0)
        } else {
            (1.0 - depth_diff.abs() / 10.0).max(0.0)
        }
    };

    let len_diff = dimension_delta(a_l.feature.length_in, a_e.feature.length_in);
    let wid_diff = dimension_delta(a_l.feature.width_in, a_e.feature.width_in);
    let s_dim = (1.0 - (len_diff + wid_diff) / 6.0).max(0.0);

    // They already passed the compatibility gate, so a type mismatch is a
    // known vendor-labeling difference rather than a disqualifier.
    let s_type = if a_l.feature.event_type == a_e.feature.event_type {
        1.0
    } else {
        0.7
    };

    config.weight_distance * s_dist
        + config.weight_clock * s_clock
        + config.weight_depth * s_depth
        + config.weight_dimensions * s_dim
        + config.weight_type * s_type
}

/// Absolute difference with a moderate 1.5 stand-in when either side is
/// missing - neither rewards absent data nor rejects the pair outright.
fn dimension_delta(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        1.5
    } else {
        (a - b).abs()
    }
}

pub(crate) fn safe_sub(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a - b
    }
}

// ============================================================================
// CONFIDENCE
// ============================================================================

/// Ambiguity factor from the number of gated candidates for a later-run
/// anomaly: a single candidate is unambiguous, more candidates
/// progressively reduce confidence down to a 0.3 floor.
fn uniqueness_factor(n_candidates: usize) -> f64 {
    match n_candidates {
        0 | 1 => 1.0,
        2 => 0.7,
        n => (1.0 - n as f64 * 0.1).max(0.3),
    }
}

/// Four-factor confidence model: similarity (40%), uniqueness (25%),
/// growth plausibility (20%), joint-number agreement (15%).
fn compute_confidence(
    similarity: f64,
    n_candidates: usize,
    a_l: &AlignedFeature,
    a_e: &AlignedFeature,
    years_between: f64,
    config: &AnalysisConfig,
) -> f64 {
    let f_unique = uniqueness_factor(n_candidates);

    // Growth plausibility: a non-negative rate at or below the plausible
    // cap is fully credible; shrinkage and extreme growth both suggest a
    // mismatch.
    let d_l = a_l.feature.depth_pct;
    let d_e = a_e.feature.depth_pct;
    let f_plaus = if !d_l.is_nan() && !d_e.is_nan() && years_between > 0.0 {
        let rate = (d_l - d_e) / years_between;
        if rate >= 0.0 && rate <= config.max_plausible_growth_rate {
            1.0
        } else if rate < 0.0 {
            (0.5 + rate / 10.0).max(0.0)
        } else {
            (1.0 - (rate - config.max_plausible_growth_rate) / 10.0).max(0.2)
        }
    } else {
        0.5
    };

    // Joint numbers give independent spatial confirmation.
    let f_joint = match (a_l.feature.joint_number, a_e.feature.joint_number) {
        (Some(jl), Some(je)) if jl == je => 1.0,
        (Some(_), Some(_)) => 0.6,
        _ => 0.5,
    };

    0.40 * similarity + 0.25 * f_unique + 0.20 * f_plaus + 0.15 * f_joint
}

fn classify_confidence(confidence: f64, config: &AnalysisConfig) -> ConfidenceLabel {
    if confidence >= config.high_confidence {
        ConfidenceLabel::High
    } else if confidence >= config.medium_confidence {
        ConfidenceLabel::Medium
    } else {
        ConfidenceLabel::Low
    }
}

// ============================================================================
// RECORD ASSEMBLY & STATS
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn build_match_record(
    later_year: i32,
    earlier_year: i32,
    a_l: &AlignedFeature,
    a_e: &AlignedFeature,
    similarity: f64,
    confidence: f64,
    confidence_label: ConfidenceLabel,
    years_between: f64,
) -> MatchRecord {
    let depth_growth = safe_sub(a_l.feature.depth_pct, a_e.feature.depth_pct);
    let length_growth = safe_sub(a_l.feature.length_in, a_e.feature.length_in);
    let width_growth = safe_sub(a_l.feature.width_in, a_e.feature.width_in);

    MatchRecord {
        similarity,
        confidence,
        confidence_label,
        earlier: MatchSide::from_feature(earlier_year, a_e),
        later: MatchSide::from_feature(later_year, a_l),
        years_between,
        depth_growth_pct: depth_growth,
        depth_growth_rate: depth_growth / years_between,
        length_growth_in: length_growth,
        length_growth_rate: length_growth / years_between,
        width_growth_in: width_growth,
        width_growth_rate: width_growth / years_between,
        remaining_wall_pct: f64::NAN,
        remaining_life_years: f64::NAN,
        growth_class: GrowthClass::Unknown,
        risk_score: f64::NAN,
        risk_category: RiskCategory::Unknown,
    }
}

fn compute_stats(
    matches: &[MatchRecord],
    new_count: usize,
    missing_count: usize,
    config: &AnalysisConfig,
) -> MatchStats {
    let mut stats = MatchStats {
        total_matches: matches.len(),
        new_anomalies: new_count,
        missing_anomalies: missing_count,
        high_confidence: 0,
        medium_confidence: 0,
        low_confidence: 0,
        avg_similarity: f64::NAN,
        avg_confidence: f64::NAN,
        avg_depth_growth_rate: f64::NAN,
        negative_growth_count: 0,
        high_growth_count: 0,
    };
    if matches.is_empty() {
        return stats;
    }

    for m in matches {
        match m.confidence_label {
            ConfidenceLabel::High => stats.high_confidence += 1,
            ConfidenceLabel::Medium => stats.medium_confidence += 1,
            ConfidenceLabel::Low => stats.low_confidence += 1,
        }
    }
    stats.avg_similarity = matches.iter().map(|m| m.similarity).mean();
    stats.avg_confidence = matches.iter().map(|m| m.confidence).mean();

    let rates: Vec<f64> = matches
        .iter()
        .map(|m| m.depth_growth_rate)
        .filter(|r| !r.is_nan())
        .collect();
    if !rates.is_empty() {
        stats.avg_depth_growth_rate = rates.iter().mean();
        stats.negative_growth_count = rates.iter().filter(|r| **r < 0.0).count();
        stats.high_growth_count = rates
            .iter()
            .filter(|r| **r > config.max_plausible_growth_rate)
            .count();
    }
    stats
}

// ============================================================================
// TESTS
// ============================================================================
