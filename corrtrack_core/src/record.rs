//! Canonical ILI feature records and run containers.
//!
//! Ingestion (an external collaborator) delivers rows already normalized to
//! this schema; nothing here renames columns or parses vendor formats.
//! Missing measurements use NaN as the sentinel and propagate through the
//! scoring rules downstream.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// EVENT VOCABULARY
// ============================================================================

/// Canonical event vocabulary after ingestion normalization.
///
/// The anomaly subset participates in matching and growth analysis; girth
/// welds anchor cross-run alignment. Every other label lands in `Other`,
/// which is neither an anomaly nor a reference and only counts toward raw
/// row totals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    MetalLoss,
    Cluster,
    MetalLossManufacturing,
    Dent,
    SeamWeldManufacturing,
    SeamWeldAnomaly,
    SeamWeldDent,
    GirthWeldAnomaly,
    GirthWeld,
    Other(String),
}

impl EventType {
    /// The canonical display label for this event type.
    pub fn label(&self) -> &str {
        match self {
            EventType::MetalLoss => "Metal Loss",
            EventType::Cluster => "Cluster",
            EventType::MetalLossManufacturing => "Metal Loss Manufacturing",
            EventType::Dent => "Dent",
            EventType::SeamWeldManufacturing => "Seam Weld Manufacturing",
            EventType::SeamWeldAnomaly => "Seam Weld Anomaly",
            EventType::SeamWeldDent => "Seam Weld Dent",
            EventType::GirthWeldAnomaly => "Girth Weld Anomaly",
            EventType::GirthWeld => "Girth Weld",
            EventType::Other(label) => label,
        }
    }

    /// Whether this type is a corrosion/defect anomaly subject to matching.
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            EventType::MetalLoss
                | EventType::Cluster
                | EventType::MetalLossManufacturing
                | EventType::Dent
                | EventType::SeamWeldManufacturing
                | EventType::SeamWeldAnomaly
                | EventType::SeamWeldDent
                | EventType::GirthWeldAnomaly
        )
    }

    /// Whether this type serves as an alignment reference point.
    pub fn is_girth_weld(&self) -> bool {
        matches!(self, EventType::GirthWeld)
    }

    /// Cross-run compatibility for matching.
    ///
    /// Exact matches always pass. A few cross-type pairs are allowed
    /// because vendors report the same physical feature differently:
    /// older tools grouped nearby pits into Cluster rows that newer tools
    /// decompose into individual Metal Loss indications, and seam-weld
    /// variants of manufacturing anomalies and dents carry the same root
    /// feature.
    pub fn compatible_with(&self, other: &EventType) -> bool {
        use EventType::*;
        if self == other {
            return true;
        }
        matches!(
            (self, other),
            (MetalLoss, Cluster)
                | (Cluster, MetalLoss)
                | (MetalLossManufacturing, SeamWeldManufacturing)
                | (SeamWeldManufacturing, MetalLossManufacturing)
                | (Dent, SeamWeldDent)
                | (SeamWeldDent, Dent)
        )
    }
}

impl From<String> for EventType {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Metal Loss" => EventType::MetalLoss,
            "Cluster" => EventType::Cluster,
            "Metal Loss Manufacturing" => EventType::MetalLossManufacturing,
            "Dent" => EventType::Dent,
            "Seam Weld Manufacturing" => EventType::SeamWeldManufacturing,
            "Seam Weld Anomaly" => EventType::SeamWeldAnomaly,
            "Seam Weld Dent" => EventType::SeamWeldDent,
            "Girth Weld Anomaly" => EventType::GirthWeldAnomaly,
            "Girth Weld" => EventType::GirthWeld,
            _ => EventType::Other(label),
        }
    }
}

impl From<EventType> for String {
    fn from(event: EventType) -> Self {
        event.label().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Internal/external surface classification of a feature.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum IdOd {
    Internal,
    External,
    #[default]
    Unknown,
}

impl fmt::Display for IdOd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IdOd::Internal => "Internal",
            IdOd::External => "External",
            IdOd::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

// ============================================================================
// FEATURE RECORDS
// ============================================================================

/// One normalized feature row from an ILI report.
///
/// Measurement fields carry NaN when the vendor left them blank; the
/// matcher and growth scorer define explicit behavior for every missing
/// field. `source_row_idx` is stable within a run and is the traceability
/// key used by the chainer and the predictor.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureRecord {
    pub joint_number: Option<i64>,
    pub log_distance_ft: f64,
    pub elevation_ft: f64,
    pub event_type: EventType,
    /// Depth as percent of wall thickness lost.
    pub depth_pct: f64,
    pub depth_in: f64,
    pub length_in: f64,
    pub width_in: f64,
    /// Circumferential position as decimal clock hours on [0, 12).
    pub clock_hours: f64,
    pub id_od: IdOd,
    pub wall_thickness_in: f64,
    pub comments: Option<String>,
    pub source_row_idx: usize,
}

impl FeatureRecord {
    pub fn is_anomaly(&self) -> bool {
        self.event_type.is_anomaly()
    }

    pub fn is_girth_weld(&self) -> bool {
        self.event_type.is_girth_weld()
    }
}

/// A single ILI run: the year it was performed and its feature rows in
/// report order. Immutable once constructed.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub year: i32,
    pub features: Vec<FeatureRecord>,
}

impl Run {
    pub fn new(year: i32, features: Vec<FeatureRecord>) -> Self {
        Self { year, features }
    }

    pub fn anomaly_count(&self) -> usize {
        self.features.iter().filter(|f| f.is_anomaly()).count()
    }

    pub fn girth_weld_count(&self) -> usize {
        self.features.iter().filter(|f| f.is_girth_weld()).count()
    }
}

// ============================================================================
// ALIGNED RUNS
// ============================================================================

/// A feature row mapped into the reference distance frame.
#[derive(Debug, Clone, Serialize)]
pub struct AlignedFeature {
    #[serde(flatten)]
    pub feature: FeatureRecord,
    /// Position in the reference run's odometer frame. Equal to the raw
    /// distance for the reference year itself; NaN whenever the raw
    /// distance is NaN.
    pub corrected_distance: f64,
}

/// A run with every feature carried into the shared coordinate frame.
#[derive(Debug, Clone, Serialize)]
pub struct AlignedRun {
    pub year: i32,
    pub features: Vec<AlignedFeature>,
}

impl AlignedRun {
    /// Anomaly rows eligible for cross-run matching: anomaly event type
    /// with a finite depth and a finite corrected distance. Rows missing
    /// either cannot be placed or compared and stay out of the match,
    /// new and missing sets alike.
    pub fn matchable_anomalies(&self) -> Vec<&AlignedFeature> {
        self.features
            .iter()
            .filter(|f| {
                f.feature.is_anomaly()
                    && f.feature.depth_pct.is_finite()
                    && f.corrected_distance.is_finite()
            })
            .collect()
    }
}
