//! Girth-weld anchored cross-run distance alignment.
//!
//! Each inspection tool carries its own odometer, and over tens of
//! thousands of feet the logged distances drift between runs. Girth welds
//! are physically fixed and reliably detected by every tool, so welds with
//! the same joint number anchor a piecewise-linear correction that maps
//! every run's distances into the reference (latest) run's frame.

use crate::error::AnalysisError;
use crate::record::{AlignedFeature, AlignedRun, Run};
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

// ============================================================================
// WELD ALIGNMENT TABLE
// ============================================================================

/// One anchor: a joint present as a girth weld in every run.
#[derive(Debug, Clone, Serialize)]
pub struct WeldAnchor {
    pub joint_number: i64,
    /// Logged weld distance per run, parallel to the table's `years`.
    pub distances: Vec<f64>,
}

/// Girth-weld alignment table: one row per joint common to all runs,
/// sorted by joint number.
#[derive(Debug, Clone, Serialize)]
pub struct WeldAlignmentTable {
    /// Run years in ascending order; each anchor's `distances` is parallel.
    pub years: Vec<i32>,
    pub anchors: Vec<WeldAnchor>,
}

impl WeldAlignmentTable {
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// The anchor distance column for one run year.
    pub fn column(&self, year: i32) -> Option<Vec<f64>> {
        let idx = self.years.iter().position(|y| *y == year)?;
        Some(self.anchors.iter().map(|a| a.distances[idx]).collect())
    }

    /// Per-anchor odometer drift between two runs: dist(later) - dist(earlier).
    /// Positive drift means the later tool's odometer read ahead at the
    /// same physical weld.
    pub fn pair_deltas(&self, earlier: i32, later: i32) -> Option<Vec<f64>> {
        let ei = self.years.iter().position(|y| *y == earlier)?;
        let li = self.years.iter().position(|y| *y == later)?;
        Some(
            self.anchors
                .iter()
                .map(|a| a.distances[li] - a.distances[ei])
                .collect(),
        )
    }
}

/// Match girth welds across runs by joint number.
///
/// Welds missing a joint number or a distance are skipped, duplicated
/// joints keep the lowest distance reading, and only joints present in
/// every run become anchors.
pub fn match_girth_welds(runs: &BTreeMap<i32, Run>) -> WeldAlignmentTable {
    let years: Vec<i32> = runs.keys().copied().collect();

    // Per-run map of joint number -> weld distance.
    let mut weld_maps: Vec<BTreeMap<i64, f64>> = Vec::with_capacity(years.len());
    for year in &years {
        let mut welds: BTreeMap<i64, f64> = BTreeMap::new();
        for feature in &runs[year].features {
            if !feature.is_girth_weld() || !feature.log_distance_ft.is_finite() {
                continue;
            }
            if let Some(joint) = feature.joint_number {
                let distance = welds.entry(joint).or_insert(feature.log_distance_ft);
                if feature.log_distance_ft < *distance {
                    *distance = feature.log_distance_ft;
                }
            }
        }
        weld_maps.push(welds);
    }

    // Intersect joint sets; only joints every tool saw can anchor.
    let mut common: Option<HashSet<i64>> = None;
    for welds in &weld_maps {
        let joints: HashSet<i64> = welds.keys().copied().collect();
        common = Some(match common {
            None => joints,
            Some(prev) => prev.intersection(&joints).copied().collect(),
        });
    }
    let mut common_joints: Vec<i64> = common.unwrap_or_default().into_iter().collect();
    common_joints.sort_unstable();

    let anchors = common_joints
        .into_iter()
        .map(|joint| WeldAnchor {
            joint_number: joint,
            distances: weld_maps.iter().map(|w| w[&joint]).collect(),
        })
        .collect();

    WeldAlignmentTable { years, anchors }
}

// ============================================================================
// DISTANCE CORRECTOR
// ============================================================================

/// Piecewise-linear map from one run's odometer frame into the reference
/// frame, anchored on matched girth welds.
///
/// Between anchors the map interpolates linearly; outside the anchor range
/// it extrapolates along the nearest segment. Anchors must be supplied
/// sorted by source distance with at least two entries.
#[derive(Debug, Clone)]
pub struct DistanceCorrector {
    src: Vec<f64>,
    dst: Vec<f64>,
}

impl DistanceCorrector {
    /// Build from (source, reference) anchor pairs sorted by source
    /// distance.
    pub fn new(src: Vec<f64>, dst: Vec<f64>) -> Self {
        debug_assert!(src.len() >= 2 && src.len() == dst.len());
        debug_assert!(src.windows(2).all(|w| w[0] < w[1]));
        Self { src, dst }
    }

    /// Map a source-frame distance into the reference frame. NaN in, NaN
    /// out.
    pub fn correct(&self, distance: f64) -> f64 {
        if distance.is_nan() {
            return f64::NAN;
        }
        let n = self.src.len();
        // Segment index, clamped to the outermost segments so the map
        // extrapolates linearly past either end.
        let seg = match self.src.partition_point(|&s| s <= distance) {
            0 => 0,
            p if p >= n => n - 2,
            p => p - 1,
        };
        let (x0, x1) = (self.src[seg], self.src[seg + 1]);
        let (y0, y1) = (self.dst[seg], self.dst[seg + 1]);
        y0 + (distance - x0) * (y1 - y0) / (x1 - x0)
    }
}

// ============================================================================
// ALIGNMENT
// ============================================================================

/// Drift summary for one consecutive run pair.
#[derive(Debug, Clone, Serialize)]
pub struct DriftStats {
    pub earlier_year: i32,
    pub later_year: i32,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub abs_mean: f64,
}

/// Summary of how well the runs anchor to each other.
#[derive(Debug, Clone, Serialize)]
pub struct AlignmentStats {
    pub common_joints: usize,
    pub joint_range: (i64, i64),
    pub drift: Vec<DriftStats>,
}

/// Alignment output: the anchor table, every run carried into the
/// reference frame, and drift statistics.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub gw_alignment: WeldAlignmentTable,
    pub corrected_runs: BTreeMap<i32, AlignedRun>,
    pub stats: AlignmentStats,
}

/// Align all runs onto the reference (latest) year's distance frame.
///
/// Fails when fewer than two common girth welds exist or when any run's
/// anchor distances do not strictly increase with joint number.
pub fn align_runs(runs: &BTreeMap<i32, Run>) -> Result<Alignment, AnalysisError> {
    let table = match_girth_welds(runs);

    if table.len() < 2 {
        return Err(AnalysisError::InsufficientAnchors { found: table.len() });
    }

    // Anchor distances must increase with joint number in every run; a
    // violation means joint labels are corrupted upstream and silently
    // sorting would hide it.
    for (year_idx, year) in table.years.iter().enumerate() {
        for pair in table.anchors.windows(2) {
            if pair[1].distances[year_idx] <= pair[0].distances[year_idx] {
                return Err(AnalysisError::NonMonotoneAnchors {
                    year: *year,
                    joint: pair[1].joint_number,
                });
            }
        }
    }

    let reference_year = *table.years.last().unwrap_or(&0);
    let reference_column = table
        .column(reference_year)
        .unwrap_or_default();

    let mut corrected_runs = BTreeMap::new();
    for (year, run) in runs {
        let features: Vec<AlignedFeature> = if *year == reference_year {
            // The reference year is the target frame: identity.
            run.features
                .iter()
                .map(|f| AlignedFeature {
                    feature: f.clone(),
                    corrected_distance: f.log_distance_ft,
                })
                .collect()
        } else {
            let source_column = table.column(*year).unwrap_or_default();
            let corrector = DistanceCorrector::new(source_column, reference_column.clone());
            run.features
                .iter()
                .map(|f| AlignedFeature {
                    feature: f.clone(),
                    corrected_distance: corrector.correct(f.log_distance_ft),
                })
                .collect()
        };
        corrected_runs.insert(*year, AlignedRun { year: *year, features });
    }

    let stats = compute_alignment_stats(&table);
    debug!(
        common_joints = stats.common_joints,
        reference_year, "aligned runs onto reference frame"
    );

    Ok(Alignment {
        gw_alignment: table,
        corrected_runs,
        stats,
    })
}

/// Summarize per-joint drift between each pair of consecutive runs.
pub fn compute_alignment_stats(table: &WeldAlignmentTable) -> AlignmentStats {
    let joint_range = match (table.anchors.first(), table.anchors.last()) {
        (Some(first), Some(last)) => (first.joint_number, last.joint_number),
        _ => (0, 0),
    };

    let mut drift = Vec::new();
    for pair in table.years.windows(2) {
        let (earlier, later) = (pair[0], pair[1]);
        if let Some(deltas) = table.pair_deltas(earlier, later) {
            if deltas.is_empty() {
                continue;
            }
            drift.push(DriftStats {
                earlier_year: earlier,
                later_year: later,
                mean: deltas.iter().mean(),
                std: deltas.iter().std_dev(),
                min: deltas.iter().copied().fold(f64::INFINITY, f64::min),
                max: deltas.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                abs_mean: deltas.iter().map(|d| d.abs()).mean(),
            });
        }
    }

    AlignmentStats {
        common_joints: table.len(),
        joint_range,
        drift,
    }
}
