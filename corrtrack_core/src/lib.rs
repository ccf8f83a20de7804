//! CorrTrack Core - multi-run in-line inspection alignment, anomaly
//! matching and pipeline integrity analytics.
//!
//! The engine ingests typed feature records for three ILI runs of the same
//! pipeline and solves four coupled problems:
//! 1. **Alignment**: girth welds anchor a piecewise-linear correction that
//!    puts every run on the latest run's distance frame.
//! 2. **Matching**: a globally optimal one-to-one pairing of anomalies
//!    between runs, with calibrated confidence.
//! 3. **Chaining**: pairwise matches compose into per-defect lifecycles
//!    spanning all three runs, with fitted growth trends.
//! 4. **Analytics**: segment risk, B31G interaction clusters, a
//!    prioritized dig list, population growth patterns and virtual future
//!    inspections.

pub mod alignment;
pub mod analytics;
pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod growth;
pub mod index;
pub mod matching;
pub mod pipeline;
pub mod record;
pub mod virtual_run;

// Re-export key types for convenience
pub use alignment::{
    align_runs, match_girth_welds, Alignment, AlignmentStats, DistanceCorrector, DriftStats,
    WeldAlignmentTable,
};
pub use analytics::{
    generate_dig_list, integrity_dashboard, interaction_assessment, population_analytics,
    segment_risk_analysis, DigCategory, DigItem, IntegrityDashboard, InteractionCluster,
    PopulationAnalytics, SegmentRisk, Severity,
};
pub use cache::{BundleCell, RebuildInProgress};
pub use chain::{chain_three_runs, ChainOutcome, LifecycleCount, TripleMatch, YearSnapshot};
pub use config::{AnalysisConfig, ConfigError};
pub use error::AnalysisError;
pub use growth::{
    growth_summary, predict_growth_trends, score_matches, top_concerns, GrowthClass,
    GrowthSummary, RiskCategory,
};
pub use matching::{
    clock_distance, clock_to_trig, match_anomalies, ConfidenceLabel, MatchOutcome, MatchRecord,
    MatchSide, MatchStats,
};
pub use pipeline::{analyze, AnalysisResults, PairwiseResult, ResultBundle};
pub use record::{AlignedFeature, AlignedRun, EventType, FeatureRecord, IdOd, Run};
pub use virtual_run::{predict_future_inspection, PredictedAnomaly, VirtualInspection};
