//! Named generator presets with pass criteria.

use crate::generator::GeneratorConfig;
use std::fmt;
use std::str::FromStr;

/// The built-in world presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Mild drift, full clock coverage - the matcher should recover
    /// nearly every persistent defect.
    Baseline,
    /// Strong linear drift plus a large slow wobble; stresses the
    /// girth-weld correction.
    HeavyDrift,
    /// A fifth of defect rows carry no clock position and can never be
    /// matched; recall is bounded by the rows that still do.
    SparseClock,
    /// The first run reports most defects as Cluster, the way older tools
    /// grouped pits; the type-compatibility rule has to carry the match.
    ClusterDecomposition,
}

impl ScenarioId {
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::HeavyDrift,
            ScenarioId::SparseClock,
            ScenarioId::ClusterDecomposition,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::HeavyDrift => "heavy_drift",
            ScenarioId::SparseClock => "sparse_clock",
            ScenarioId::ClusterDecomposition => "cluster_decomposition",
        }
    }

    pub fn generator_config(&self, seed: u64) -> GeneratorConfig {
        let base = GeneratorConfig {
            seed,
            ..Default::default()
        };
        match self {
            ScenarioId::Baseline => base,
            ScenarioId::HeavyDrift => GeneratorConfig {
                drift_per_ft: 0.01,
                drift_wobble_ft: 10.0,
                ..base
            },
            ScenarioId::SparseClock => GeneratorConfig {
                clock_dropout: 0.2,
                ..base
            },
            ScenarioId::ClusterDecomposition => GeneratorConfig {
                cluster_fraction: 0.8,
                ..base
            },
        }
    }

    /// Minimum acceptable recall of ground-truth pairs.
    pub fn min_recall(&self) -> f64 {
        match self {
            ScenarioId::Baseline => 0.95,
            ScenarioId::HeavyDrift => 0.90,
            // Independent 20% dropout per run leaves ~64% of pairs with a
            // clock on both sides.
            ScenarioId::SparseClock => 0.55,
            ScenarioId::ClusterDecomposition => 0.95,
        }
    }

    /// Minimum acceptable precision of emitted matches.
    pub fn min_precision(&self) -> f64 {
        0.95
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "baseline" => Ok(ScenarioId::Baseline),
            "heavy_drift" => Ok(ScenarioId::HeavyDrift),
            "sparse_clock" => Ok(ScenarioId::SparseClock),
            "cluster_decomposition" => Ok(ScenarioId::ClusterDecomposition),
            other => Err(format!("unknown scenario: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>().unwrap(), scenario);
        }
        assert!("no_such_thing".parse::<ScenarioId>().is_err());
    }
}
