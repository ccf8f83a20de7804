//! Ground-truth recovery: the full pipeline against generated worlds.

use corrtrack_core::{analyze, AnalysisConfig};
use corrtrack_sim::scenarios::ScenarioId;
use corrtrack_sim::{score_pair, SimWorld};
use std::collections::HashSet;

#[test]
fn test_baseline_recovery() {
    let world = SimWorld::generate(ScenarioId::Baseline.generator_config(7));
    let config = AnalysisConfig::default();
    let bundle = analyze(world.runs.clone(), &config).unwrap();

    for pair in &bundle.results.pairwise {
        let score = score_pair(&world, &pair.outcome, pair.earlier_year, pair.later_year);
        assert!(
            score.recall >= 0.95,
            "recall {:.3} for {}-{}",
            score.recall,
            pair.earlier_year,
            pair.later_year
        );
        assert!(
            score.precision >= 0.95,
            "precision {:.3} for {}-{}",
            score.precision,
            pair.earlier_year,
            pair.later_year
        );
    }

    // Chained triples should cover most defects present in all runs.
    let chain = bundle.results.chain.as_ref().unwrap();
    let truth = world.triple_tracked_count();
    assert!(chain.triple_matches.len() as f64 >= 0.9 * truth as f64);
    assert!(chain.triple_matches.len() <= truth + world.defects.len() / 20);
}

#[test]
fn test_heavy_drift_still_aligns() {
    let world = SimWorld::generate(ScenarioId::HeavyDrift.generator_config(11));
    let config = AnalysisConfig::default();
    let bundle = analyze(world.runs.clone(), &config).unwrap();

    for pair in &bundle.results.pairwise {
        let score = score_pair(&world, &pair.outcome, pair.earlier_year, pair.later_year);
        assert!(
            score.recall >= 0.9,
            "recall {:.3} under heavy drift",
            score.recall
        );
    }
}

#[test]
fn test_matcher_invariants_on_generated_world() {
    let world = SimWorld::generate(ScenarioId::Baseline.generator_config(23));
    let config = AnalysisConfig::default();
    let bundle = analyze(world.runs, &config).unwrap();

    for pair in &bundle.results.pairwise {
        let outcome = &pair.outcome;

        // One-to-one on both sides
        let later_rows: HashSet<usize> =
            outcome.matches.iter().map(|m| m.later.row_idx).collect();
        let earlier_rows: HashSet<usize> =
            outcome.matches.iter().map(|m| m.earlier.row_idx).collect();
        assert_eq!(later_rows.len(), outcome.matches.len());
        assert_eq!(earlier_rows.len(), outcome.matches.len());

        // Gates hold for every emitted match
        for m in &outcome.matches {
            assert!((m.later.distance - m.earlier.distance).abs() <= 3.0 + 1e-9);
        }

        // Stats agree with the row sets
        assert_eq!(outcome.stats.total_matches, outcome.matches.len());
        assert_eq!(outcome.stats.new_anomalies, outcome.new_anomalies.len());
        assert_eq!(
            outcome.stats.missing_anomalies,
            outcome.missing_anomalies.len()
        );
    }
}

#[test]
fn test_cluster_decomposition_matches_across_types() {
    let world = SimWorld::generate(ScenarioId::ClusterDecomposition.generator_config(5));
    let config = AnalysisConfig::default();
    let bundle = analyze(world.runs.clone(), &config).unwrap();

    let pair = &bundle.results.pairwise[0];
    let score = score_pair(&world, &pair.outcome, pair.earlier_year, pair.later_year);
    assert!(score.recall >= 0.95, "recall {:.3}", score.recall);

    // Some matches really did cross the Cluster / Metal Loss boundary.
    let cross_type = pair
        .outcome
        .matches
        .iter()
        .filter(|m| m.earlier.event_type != m.later.event_type)
        .count();
    assert!(cross_type > 0);
}
