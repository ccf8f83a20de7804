//! Caller-visible failures of the analysis pipeline.
//!
//! Alignment errors are fatal: without a trustworthy coordinate frame no
//! downstream comparison is meaningful. The matcher, growth scorer,
//! chainer and analytics never fail on data content; missing values
//! propagate as NaN and empty inputs yield empty outputs.

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// Fewer than two girth-weld joints are shared by every run, so no
    /// piecewise-linear correction can be anchored.
    #[error("insufficient alignment anchors: {found} girth weld joint(s) common to all runs, need at least 2")]
    InsufficientAnchors { found: usize },

    /// Anchor distances do not strictly increase with joint number,
    /// which indicates joint-label corruption upstream. Silently sorting
    /// would mask the corruption, so this is surfaced instead.
    #[error("girth weld distances for run {year} do not strictly increase with joint number (violated at joint {joint})")]
    NonMonotoneAnchors { year: i32, joint: i64 },

    /// A requested year is not present in the input run map.
    #[error("run {0} is not present in the input set")]
    MissingRun(i32),

    /// Virtual inspection was requested for a target year at or before the
    /// base year, or no pairwise match data exists to extrapolate from.
    #[error("virtual inspection unavailable: {0}")]
    PredictionUnavailable(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
