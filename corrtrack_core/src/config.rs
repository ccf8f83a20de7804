//! Central configuration for the analysis pipeline.
//!
//! Every tunable constant lives here: matching tolerances, similarity
//! weights, confidence thresholds, growth limits, and the inter-run year
//! gaps. A single edit propagates to the whole pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors detected at pipeline startup.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("similarity weights must sum to 1.0, got {sum}")]
    WeightsNotNormalized { sum: f64 },

    #[error("{name} must be non-negative, got {value}")]
    NegativeTolerance { name: &'static str, value: f64 },

    #[error("confidence thresholds must be strictly ordered high > medium > low > 0")]
    MisorderedThresholds,
}

/// Tunables for alignment, matching, growth and analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Max axial offset along the pipe for a candidate pair (feet).
    pub distance_tolerance_ft: f64,
    /// Max circumferential offset (clock hours; 1 h = 30 degrees).
    pub clock_tolerance_hours: f64,
    /// Max wall-loss depth difference (% points).
    pub depth_tolerance_pct: f64,
    /// Max axial length difference (inches).
    pub length_tolerance_in: f64,
    /// Max circumferential width difference (inches).
    pub width_tolerance_in: f64,

    /// Similarity weights. Distance carries the most weight because the
    /// odometer position is the most consistently accurate measurement
    /// across vendor tools; depth and dimensions change with corrosion
    /// growth and sizing methodology, so they carry less.
    pub weight_distance: f64,
    pub weight_clock: f64,
    pub weight_depth: f64,
    pub weight_dimensions: f64,
    pub weight_type: f64,

    /// Confidence label cutoffs. `low_confidence` doubles as the solver's
    /// minimum acceptable similarity: assignment pairs with similarity
    /// below it are rejected outright.
    pub high_confidence: f64,
    pub medium_confidence: f64,
    pub low_confidence: f64,

    /// Depth growth above this rate (%/yr) is treated as a sizing error or
    /// mismatch rather than real corrosion.
    pub max_plausible_growth_rate: f64,
    /// Wall-loss percentage that triggers mandatory repair verification.
    pub wall_loss_repair_threshold: f64,

    /// Known year gaps between inspection runs, as (earlier, later, years)
    /// rows. Pairs not listed fall back to the plain year difference.
    pub years_between: Vec<(i32, i32, f64)>,

    /// Segment length for the risk heatmap (feet).
    pub segment_length_ft: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            distance_tolerance_ft: 3.0,
            clock_tolerance_hours: 1.0,
            depth_tolerance_pct: 15.0,
            length_tolerance_in: 3.0,
            width_tolerance_in: 3.0,

            weight_distance: 0.35,
            weight_clock: 0.25,
            weight_depth: 0.20,
            weight_dimensions: 0.10,
            weight_type: 0.10,

            high_confidence: 0.85,
            medium_confidence: 0.60,
            low_confidence: 0.40,

            max_plausible_growth_rate: 5.0,
            wall_loss_repair_threshold: 80.0,

            years_between: vec![(2007, 2015, 8.0), (2015, 2022, 7.0), (2007, 2022, 15.0)],

            segment_length_ft: 1000.0,
        }
    }
}

impl AnalysisConfig {
    /// Years elapsed between two runs, from the known-gap table when
    /// present, otherwise the plain year difference.
    pub fn years_between(&self, earlier: i32, later: i32) -> f64 {
        self.years_between
            .iter()
            .find(|(e, l, _)| *e == earlier && *l == later)
            .map(|(_, _, years)| *years)
            .unwrap_or((later - earlier) as f64)
    }

    /// Validate invariants that would otherwise corrupt every downstream
    /// score. Called once at pipeline entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.weight_distance
            + self.weight_clock
            + self.weight_depth
            + self.weight_dimensions
            + self.weight_type;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(ConfigError::WeightsNotNormalized { sum });
        }

        let tolerances = [
            ("distance_tolerance_ft", self.distance_tolerance_ft),
            ("clock_tolerance_hours", self.clock_tolerance_hours),
            ("depth_tolerance_pct", self.depth_tolerance_pct),
            ("length_tolerance_in", self.length_tolerance_in),
            ("width_tolerance_in", self.width_tolerance_in),
            ("segment_length_ft", self.segment_length_ft),
        ];
        for (name, value) in tolerances {
            if !(value >= 0.0) {
                return Err(ConfigError::NegativeTolerance { name, value });
            }
        }

        if !(self.high_confidence > self.medium_confidence
            && self.medium_confidence > self.low_confidence
            && self.low_confidence > 0.0)
        {
            return Err(ConfigError::MisorderedThresholds);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let config = AnalysisConfig::default();
        let sum = config.weight_distance
            + config.weight_clock
            + config.weight_depth
            + config.weight_dimensions
            + config.weight_type;
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unnormalized_weights_rejected() {
        let config = AnalysisConfig {
            weight_distance: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WeightsNotNormalized { .. })
        ));
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let config = AnalysisConfig {
            distance_tolerance_ft: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeTolerance {
                name: "distance_tolerance_ft",
                ..
            })
        ));
    }

    #[test]
    fn test_years_between_table_and_fallback() {
        let config = AnalysisConfig::default();
        assert_eq!(config.years_between(2007, 2015), 8.0);
        assert_eq!(config.years_between(2015, 2022), 7.0);
        assert_eq!(config.years_between(2007, 2022), 15.0);
        // Not in the table: plain difference
        assert_eq!(config.years_between(2010, 2020), 10.0);
    }
}
