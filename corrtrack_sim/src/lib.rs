//! Deterministic synthetic-pipeline harness for CorrTrack.
//!
//! Generates pipelines with known ground truth - welded joints, drifting
//! odometers, growing defects - runs the full analysis, and scores how
//! much of the truth the matcher recovered.

pub mod generator;
pub mod scenarios;

pub use generator::{GeneratorConfig, SimWorld, TruthDefect};
pub use scenarios::ScenarioId;

use corrtrack_core::MatchOutcome;
use serde::Serialize;

/// Match-recovery score for one run pair.
#[derive(Debug, Clone, Serialize)]
pub struct PairScore {
    pub earlier_year: i32,
    pub later_year: i32,
    pub truth_pairs: usize,
    pub emitted: usize,
    pub correct: usize,
    pub precision: f64,
    pub recall: f64,
}

/// Score a match outcome against the world's ground truth.
pub fn score_pair(
    world: &SimWorld,
    outcome: &MatchOutcome,
    earlier: i32,
    later: i32,
) -> PairScore {
    let truth = world.truth_pairs(earlier, later);
    let emitted = outcome.matches.len();
    let correct = outcome
        .matches
        .iter()
        .filter(|m| truth.contains(&(m.earlier.row_idx, m.later.row_idx)))
        .count();

    PairScore {
        earlier_year: earlier,
        later_year: later,
        truth_pairs: truth.len(),
        emitted,
        correct,
        precision: if emitted > 0 {
            correct as f64 / emitted as f64
        } else {
            1.0
        },
        recall: if truth.is_empty() {
            1.0
        } else {
            correct as f64 / truth.len() as f64
        },
    }
}
