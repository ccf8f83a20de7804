//! Synthetic ILI world generation with known ground truth.
//!
//! Builds a pipeline of welded joints, seeds corrosion defects with
//! per-year grown depths, then "inspects" it once per run year with
//! per-run odometer drift and measurement noise, producing the same record
//! shape a real ingestion layer would. The true cross-run identity of every
//! defect is kept so the matcher's output can be scored.

use corrtrack_core::{EventType, FeatureRecord, IdOd, Run};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::collections::{BTreeMap, HashSet};

/// Knobs for one synthetic world.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub run_years: Vec<i32>,
    pub joint_count: usize,
    pub joint_length_ft: f64,
    /// Target defect count; the actual count is slightly lower because
    /// defects closer than `min_defect_spacing_ft` are culled.
    pub defect_count: usize,
    /// Minimum true spacing between defects, kept above twice the match
    /// tolerance so ground truth stays unambiguous.
    pub min_defect_spacing_ft: f64,
    /// Linear odometer drift per run index (ft of drift per ft of pipe).
    pub drift_per_ft: f64,
    /// Amplitude of the slow sinusoidal drift component (ft).
    pub drift_wobble_ft: f64,
    pub distance_noise_ft: f64,
    pub clock_noise_hours: f64,
    pub depth_noise_pct: f64,
    /// Fraction of defect rows reported without a clock position.
    pub clock_dropout: f64,
    /// Fraction of first-run defects reported as Cluster, the way older
    /// tools grouped nearby pits.
    pub cluster_fraction: f64,
    /// Mean true growth rate (% wall per year).
    pub mean_growth_rate: f64,
    /// Fraction of defects that first appear in the middle run.
    pub appear_mid_fraction: f64,
    /// Fraction of defects that first appear in the last run.
    pub appear_last_fraction: f64,
    /// Fraction of defects repaired (gone) after the first run.
    pub vanish_fraction: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            run_years: vec![2007, 2015, 2022],
            joint_count: 250,
            joint_length_ft: 40.0,
            defect_count: 400,
            min_defect_spacing_ft: 8.0,
            drift_per_ft: 0.002,
            drift_wobble_ft: 3.0,
            distance_noise_ft: 0.15,
            clock_noise_hours: 0.08,
            depth_noise_pct: 1.0,
            clock_dropout: 0.0,
            cluster_fraction: 0.0,
            mean_growth_rate: 0.8,
            appear_mid_fraction: 0.10,
            appear_last_fraction: 0.05,
            vanish_fraction: 0.05,
        }
    }
}

/// A physical defect with its true location, per-year depths, and the row
/// index it received in each generated run.
#[derive(Debug, Clone)]
pub struct TruthDefect {
    pub id: usize,
    pub true_distance_ft: f64,
    pub clock_hours: f64,
    pub length_in: f64,
    pub width_in: f64,
    pub id_od: IdOd,
    /// True depth per run year (parallel to `run_years`); None when the
    /// defect is absent from that run.
    pub depths: Vec<Option<f64>>,
    /// Row index of this defect in each generated run (parallel to
    /// `run_years`); None when absent.
    pub row_indices: Vec<Option<usize>>,
}

/// A generated world: the runs as an ingestion layer would deliver them,
/// plus the ground truth behind them.
pub struct SimWorld {
    pub config: GeneratorConfig,
    pub runs: BTreeMap<i32, Run>,
    pub defects: Vec<TruthDefect>,
}

enum RowKind {
    Weld { joint: i64 },
    Defect { id: usize },
}

struct RowDraft {
    odometer: f64,
    kind: RowKind,
}

impl SimWorld {
    pub fn generate(config: GeneratorConfig) -> SimWorld {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let pipeline_length = config.joint_count as f64 * config.joint_length_ft;
        let n_runs = config.run_years.len();
        let first_year = config.run_years[0];

        let growth_noise = Normal::new(0.0, 0.3).expect("valid std dev");
        let depth_noise = Normal::new(0.0, config.depth_noise_pct).expect("valid std dev");
        let dist_noise = Normal::new(0.0, config.distance_noise_ft).expect("valid std dev");
        let weld_noise = Normal::new(0.0, 0.02).expect("valid std dev");
        let clock_noise = Normal::new(0.0, config.clock_noise_hours).expect("valid std dev");

        // Seed true defects, culling any closer than the minimum spacing.
        let mut positions: Vec<f64> = (0..config.defect_count)
            .map(|_| rng.gen_range(10.0..pipeline_length - 10.0))
            .collect();
        positions.sort_by(|a, b| a.partial_cmp(b).expect("finite positions"));
        let mut spaced = Vec::new();
        let mut last = f64::NEG_INFINITY;
        for p in positions {
            if p - last >= config.min_defect_spacing_ft {
                spaced.push(p);
                last = p;
            }
        }

        let mut defects: Vec<TruthDefect> = Vec::with_capacity(spaced.len());
        for (id, true_distance_ft) in spaced.into_iter().enumerate() {
            let initial_depth = rng.gen_range(5.0..35.0);
            let rate = (config.mean_growth_rate + growth_noise.sample(&mut rng)).max(0.0);

            // Presence window: most defects span all runs; some appear
            // late, some get repaired after the first inspection.
            let draw: f64 = rng.gen();
            let (first_run, last_run) = if draw < config.appear_mid_fraction && n_runs >= 2 {
                (1, n_runs - 1)
            } else if draw < config.appear_mid_fraction + config.appear_last_fraction {
                (n_runs - 1, n_runs - 1)
            } else if draw
                < config.appear_mid_fraction
                    + config.appear_last_fraction
                    + config.vanish_fraction
            {
                (0, 0)
            } else {
                (0, n_runs - 1)
            };

            let depths = (0..n_runs)
                .map(|i| {
                    if i < first_run || i > last_run {
                        return None;
                    }
                    let years = (config.run_years[i] - first_year) as f64;
                    Some((initial_depth + rate * years).clamp(1.0, 95.0))
                })
                .collect();

            defects.push(TruthDefect {
                id,
                true_distance_ft,
                clock_hours: rng.gen_range(0.0..12.0),
                length_in: rng.gen_range(1.0..6.0),
                width_in: rng.gen_range(0.5..3.0),
                id_od: if rng.gen_bool(0.4) {
                    IdOd::Internal
                } else {
                    IdOd::External
                },
                depths,
                row_indices: vec![None; n_runs],
            });
        }

        // Inspect the world once per run year.
        let mut runs = BTreeMap::new();
        for run_idx in 0..n_runs {
            let year = config.run_years[run_idx];
            let slope = config.drift_per_ft * run_idx as f64;
            let wobble_amp =
                config.drift_wobble_ft * run_idx as f64 / (n_runs.max(2) - 1) as f64;
            let phase = 0.9 * run_idx as f64;
            let odometer = |d: f64| d * (1.0 + slope) + wobble_amp * ((d / 1500.0) + phase).sin();

            let mut drafts = Vec::new();
            for joint in 1..=config.joint_count as i64 {
                let true_dist = joint as f64 * config.joint_length_ft;
                drafts.push(RowDraft {
                    odometer: odometer(true_dist) + weld_noise.sample(&mut rng),
                    kind: RowKind::Weld { joint },
                });
            }
            for defect in &defects {
                if defect.depths[run_idx].is_some() {
                    drafts.push(RowDraft {
                        odometer: odometer(defect.true_distance_ft) + dist_noise.sample(&mut rng),
                        kind: RowKind::Defect { id: defect.id },
                    });
                }
            }
            drafts.sort_by(|a, b| a.odometer.partial_cmp(&b.odometer).expect("finite odometer"));

            let mut features = Vec::with_capacity(drafts.len());
            for (row_idx, draft) in drafts.into_iter().enumerate() {
                match draft.kind {
                    RowKind::Weld { joint } => {
                        features.push(weld_record(joint, draft.odometer, row_idx));
                    }
                    RowKind::Defect { id } => {
                        let defect = &mut defects[id];
                        defect.row_indices[run_idx] = Some(row_idx);

                        let true_depth = defect.depths[run_idx].expect("present in this run");
                        let measured_depth =
                            (true_depth + depth_noise.sample(&mut rng)).clamp(0.5, 98.0);
                        let measured_clock = if rng.gen_bool(config.clock_dropout) {
                            f64::NAN
                        } else {
                            (defect.clock_hours + clock_noise.sample(&mut rng)).rem_euclid(12.0)
                        };
                        let event_type =
                            if run_idx == 0 && rng.gen_bool(config.cluster_fraction) {
                                EventType::Cluster
                            } else {
                                EventType::MetalLoss
                            };
                        let joint = (defect.true_distance_ft / config.joint_length_ft) as i64 + 1;

                        features.push(FeatureRecord {
                            joint_number: Some(joint),
                            log_distance_ft: draft.odometer,
                            elevation_ft: f64::NAN,
                            event_type,
                            depth_pct: measured_depth,
                            depth_in: measured_depth / 100.0 * 0.3,
                            length_in: defect.length_in,
                            width_in: defect.width_in,
                            clock_hours: measured_clock,
                            id_od: defect.id_od,
                            wall_thickness_in: 0.3,
                            comments: None,
                            source_row_idx: row_idx,
                        });
                    }
                }
            }

            runs.insert(year, Run::new(year, features));
        }

        SimWorld {
            config,
            runs,
            defects,
        }
    }

    /// Ground-truth (earlier_row, later_row) pairs for a run pair: the
    /// defects physically present in both inspections.
    pub fn truth_pairs(&self, earlier: i32, later: i32) -> HashSet<(usize, usize)> {
        let ei = self
            .config
            .run_years
            .iter()
            .position(|y| *y == earlier)
            .expect("earlier year generated");
        let li = self
            .config
            .run_years
            .iter()
            .position(|y| *y == later)
            .expect("later year generated");
        self.defects
            .iter()
            .filter_map(|d| Some((d.row_indices[ei]?, d.row_indices[li]?)))
            .collect()
    }

    /// Defects present in every run - the triple-match ground truth.
    pub fn triple_tracked_count(&self) -> usize {
        self.defects
            .iter()
            .filter(|d| d.row_indices.iter().all(Option::is_some))
            .count()
    }
}

fn weld_record(joint: i64, odometer: f64, row_idx: usize) -> FeatureRecord {
    FeatureRecord {
        joint_number: Some(joint),
        log_distance_ft: odometer,
        elevation_ft: f64::NAN,
        event_type: EventType::GirthWeld,
        depth_pct: f64::NAN,
        depth_in: f64::NAN,
        length_in: f64::NAN,
        width_in: f64::NAN,
        clock_hours: f64::NAN,
        id_od: IdOd::Unknown,
        wall_thickness_in: 0.3,
        comments: None,
        source_row_idx: row_idx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let a = SimWorld::generate(GeneratorConfig::default());
        let b = SimWorld::generate(GeneratorConfig::default());
        assert_eq!(a.defects.len(), b.defects.len());
        for (da, db) in a.defects.iter().zip(&b.defects) {
            assert_eq!(da.true_distance_ft, db.true_distance_ft);
            assert_eq!(da.row_indices, db.row_indices);
        }
        let run_a = &a.runs[&2022];
        let run_b = &b.runs[&2022];
        assert_eq!(run_a.features.len(), run_b.features.len());
    }

    #[test]
    fn test_world_shape() {
        let world = SimWorld::generate(GeneratorConfig::default());
        assert_eq!(world.runs.len(), 3);
        for run in world.runs.values() {
            assert_eq!(run.girth_weld_count(), 250);
            assert!(run.anomaly_count() > 200);
        }
        // Spacing is respected
        for pair in world.defects.windows(2) {
            assert!(pair[1].true_distance_ft - pair[0].true_distance_ft >= 8.0);
        }
    }

    #[test]
    fn test_row_indices_point_at_defect_rows() {
        let world = SimWorld::generate(GeneratorConfig::default());
        for defect in &world.defects {
            for (run_idx, row) in defect.row_indices.iter().enumerate() {
                if let Some(row) = row {
                    let year = world.config.run_years[run_idx];
                    let feature = &world.runs[&year].features[*row];
                    assert!(feature.is_anomaly());
                    assert_eq!(feature.source_row_idx, *row);
                }
            }
        }
    }

    #[test]
    fn test_truth_pairs_cover_persistent_defects() {
        let world = SimWorld::generate(GeneratorConfig::default());
        let pairs = world.truth_pairs(2015, 2022);
        assert!(!pairs.is_empty());
        assert!(pairs.len() <= world.defects.len());
        assert!(world.triple_tracked_count() <= pairs.len());
    }
}
