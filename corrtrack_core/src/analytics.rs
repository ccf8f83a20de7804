//! Integrity analytics: segment risk heatmap, ASME B31G interaction
//! clusters, dig-list prioritization and population growth patterns.
//!
//! These are the views integrity engineers act on after an inspection:
//! where risk concentrates along the line, which defects interact into
//! larger effective flaws, which locations to excavate first, and whether
//! growth clusters by position or surface in a way that points at a
//! systemic mechanism.

use crate::config::AnalysisConfig;
use crate::growth::RiskCategory;
use crate::matching::{ConfidenceLabel, MatchRecord};
use crate::record::{AlignedRun, EventType, IdOd};
use serde::Serialize;
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::collections::BTreeMap;

// ============================================================================
// 1. SEGMENT RISK HEATMAP
// ============================================================================

/// Composite risk for one fixed-length pipeline segment.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentRisk {
    pub segment: usize,
    pub start_ft: f64,
    pub end_ft: f64,
    pub midpoint_ft: f64,
    pub anomaly_count: usize,
    pub max_depth_pct: f64,
    /// Mean of the non-negative growth rates in the segment.
    pub avg_growth_rate: f64,
    pub critical_count: usize,
    /// 0-100: density (25) + max depth (35) + avg growth (25) +
    /// critical count (15).
    pub risk_score: f64,
}

struct SegmentEntry {
    distance: f64,
    depth: f64,
    growth_rate: f64,
    is_critical: bool,
}

/// Divide the pipeline into fixed-length segments and score each one.
///
/// The extent comes from the latest run. When no matches exist yet the
/// segments fall back to the latest run's raw anomalies, without growth or
/// risk information.
pub fn segment_risk_analysis(
    matches: &[MatchRecord],
    corrected_runs: &BTreeMap<i32, AlignedRun>,
    config: &AnalysisConfig,
) -> Vec<SegmentRisk> {
    let Some(latest_run) = corrected_runs.values().last() else {
        return Vec::new();
    };
    let max_dist = latest_run
        .features
        .iter()
        .map(|f| f.corrected_distance)
        .filter(|d| d.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !max_dist.is_finite() || max_dist <= 0.0 {
        return Vec::new();
    }

    let segment_length = config.segment_length_ft;
    let n_segments = (max_dist / segment_length).ceil() as usize;

    let entries: Vec<SegmentEntry> = if matches.is_empty() {
        latest_run
            .features
            .iter()
            .filter(|f| f.feature.is_anomaly())
            .map(|f| SegmentEntry {
                distance: f.corrected_distance,
                depth: f.feature.depth_pct,
                growth_rate: f64::NAN,
                is_critical: false,
            })
            .collect()
    } else {
        matches
            .iter()
            .map(|m| SegmentEntry {
                distance: m.later.distance,
                depth: m.later.depth_pct,
                growth_rate: m.depth_growth_rate,
                is_critical: m.risk_category == RiskCategory::Critical,
            })
            .collect()
    };

    let mut segments = Vec::with_capacity(n_segments);
    for i in 0..n_segments {
        let start = i as f64 * segment_length;
        let end = start + segment_length;
        let mid = start + segment_length / 2.0;

        let in_segment: Vec<&SegmentEntry> = entries
            .iter()
            .filter(|e| e.distance >= start && e.distance < end)
            .collect();
        let count = in_segment.len();

        if count == 0 {
            segments.push(SegmentRisk {
                segment: i + 1,
                start_ft: start,
                end_ft: end,
                midpoint_ft: mid,
                anomaly_count: 0,
                max_depth_pct: 0.0,
                avg_growth_rate: 0.0,
                critical_count: 0,
                risk_score: 0.0,
            });
            continue;
        }

        let max_depth = in_segment
            .iter()
            .map(|e| e.depth)
            .filter(|d| d.is_finite())
            .fold(0.0f64, f64::max);
        let positive_rates: Vec<f64> = in_segment
            .iter()
            .map(|e| e.growth_rate)
            .filter(|r| r.is_finite() && *r >= 0.0)
            .collect();
        let avg_rate = if positive_rates.is_empty() {
            0.0
        } else {
            positive_rates.iter().mean()
        };
        let critical_count = in_segment.iter().filter(|e| e.is_critical).count();

        // Full credit at 5 anomalies, 80% wall, 3 %/yr, 3 criticals.
        let density_score = (count as f64 * 25.0 / 5.0).min(25.0);
        let depth_score = (max_depth / config.wall_loss_repair_threshold * 35.0).min(35.0);
        let rate_score = (avg_rate / 3.0 * 25.0).min(25.0);
        let crit_score = (critical_count as f64 * 15.0 / 3.0).min(15.0);

        segments.push(SegmentRisk {
            segment: i + 1,
            start_ft: start,
            end_ft: end,
            midpoint_ft: mid,
            anomaly_count: count,
            max_depth_pct: max_depth,
            avg_growth_rate: avg_rate,
            critical_count,
            risk_score: density_score + depth_score + rate_score + crit_score,
        });
    }

    segments
}

// ============================================================================
// 2. ASME B31G INTERACTION ASSESSMENT
// ============================================================================

/// Interaction severity per cluster depth and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A group of anomalies close enough axially to act as one larger flaw.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionCluster {
    pub cluster_id: usize,
    pub anomaly_count: usize,
    pub start_distance_ft: f64,
    pub end_distance_ft: f64,
    pub span_ft: f64,
    /// Cluster span plus the longest member, in inches.
    pub effective_length_in: f64,
    pub max_depth_pct: f64,
    pub avg_depth_pct: f64,
    pub max_growth_rate: f64,
    pub max_risk_score: f64,
    pub joint: Option<i64>,
    pub wall_thickness_in: f64,
    pub interaction_threshold_in: f64,
    pub severity: Severity,
}

/// Detect interacting anomalies per the B31G criterion: two flaws interact
/// when their clear axial spacing is within 6 x wall thickness.
///
/// Anomalies are walked in distance order; each cluster chains forward
/// from its seed, so three or more defects can join a single group.
/// Only clusters of two or more are reported.
pub fn interaction_assessment(
    matches: &[MatchRecord],
    config: &AnalysisConfig,
) -> Vec<InteractionCluster> {
    let mut rows: Vec<&MatchRecord> = matches
        .iter()
        .filter(|m| m.later.distance.is_finite() && m.later.depth_pct.is_finite())
        .collect();
    rows.sort_by(|a, b| {
        a.later
            .distance
            .partial_cmp(&b.later.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.later.row_idx.cmp(&b.later.row_idx))
    });

    if rows.len() < 2 {
        return Vec::new();
    }

    let mut clusters = Vec::new();
    let mut used = vec![false; rows.len()];

    for i in 0..rows.len() {
        if used[i] {
            continue;
        }
        let seed = rows[i];

        let mut wall_thickness = seed.later.wall_thickness;
        if !wall_thickness.is_finite() || wall_thickness <= 0.0 {
            wall_thickness = 0.3;
        }
        let threshold_ft = 6.0 * wall_thickness / 12.0;
        let seed_length_in = if seed.later.length_in.is_finite() {
            seed.later.length_in
        } else {
            0.0
        };

        // Chain forward from the seed: each successor within the clear
        // spacing threshold of the last added member extends the cluster.
        let mut members = vec![i];
        let mut last_dist = seed.later.distance;
        let mut j = i + 1;
        while j < rows.len() {
            let next_dist = rows[j].later.distance;
            let clear_spacing = (next_dist - last_dist) - seed_length_in / 12.0;
            if clear_spacing <= threshold_ft {
                members.push(j);
                used[j] = true;
                last_dist = next_dist;
                j += 1;
            } else {
                break;
            }
        }

        if members.len() < 2 {
            continue;
        }
        used[i] = true;

        let member_rows: Vec<&MatchRecord> = members.iter().map(|k| rows[*k]).collect();
        let start = member_rows
            .iter()
            .map(|m| m.later.distance)
            .fold(f64::INFINITY, f64::min);
        let end = member_rows
            .iter()
            .map(|m| m.later.distance)
            .fold(f64::NEG_INFINITY, f64::max);
        let span_ft = end - start;
        let max_member_length = member_rows
            .iter()
            .map(|m| m.later.length_in)
            .filter(|l| l.is_finite())
            .fold(0.0f64, f64::max);

        let max_depth = member_rows
            .iter()
            .map(|m| m.later.depth_pct)
            .fold(f64::NEG_INFINITY, f64::max);
        let avg_depth = member_rows.iter().map(|m| m.later.depth_pct).mean();
        let max_growth = member_rows
            .iter()
            .map(|m| m.depth_growth_rate)
            .filter(|r| r.is_finite())
            .fold(f64::NAN, f64::max);
        let max_risk = member_rows
            .iter()
            .map(|m| m.risk_score)
            .filter(|r| r.is_finite())
            .fold(f64::NAN, f64::max);

        let severity = if max_depth >= 60.0 || member_rows.len() >= 4 {
            Severity::High
        } else if max_depth >= 40.0 || member_rows.len() >= 3 {
            Severity::Medium
        } else {
            Severity::Low
        };

        clusters.push(InteractionCluster {
            cluster_id: clusters.len() + 1,
            anomaly_count: member_rows.len(),
            start_distance_ft: start,
            end_distance_ft: end,
            span_ft,
            effective_length_in: span_ft * 12.0 + max_member_length,
            max_depth_pct: max_depth,
            avg_depth_pct: avg_depth,
            max_growth_rate: max_growth,
            max_risk_score: max_risk,
            joint: member_rows[0].later.joint,
            wall_thickness_in: wall_thickness,
            interaction_threshold_in: 6.0 * wall_thickness,
            severity,
        });
    }

    clusters
}

// ============================================================================
// 3. AUTOMATED DIG LIST
// ============================================================================

/// Repair scheduling tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DigCategory {
    Immediate,
    Scheduled,
    Monitor,
}

/// One prioritized excavation site.
#[derive(Debug, Clone, Serialize)]
pub struct DigItem {
    pub joint: Option<i64>,
    pub distance_ft: f64,
    pub clock: f64,
    pub depth_pct: f64,
    pub growth_rate: f64,
    pub remaining_life_years: f64,
    pub event_type: EventType,
    pub id_od: IdOd,
    pub wall_thickness_in: f64,
    /// 0-100: depth (40) + growth rate (30) + remaining life (30).
    pub urgency_score: f64,
    pub category: DigCategory,
    pub priority: u8,
    pub risk_category: RiskCategory,
    pub confidence: ConfidenceLabel,
}

/// Build the prioritized dig list from a scored match set.
///
/// Shallow (<20%) anomalies with negligible growth (<=0.5 %/yr) are left
/// off entirely; everything else gets an urgency score and one of
/// IMMEDIATE / SCHEDULED / MONITOR. Sorted by priority, then urgency
/// descending.
pub fn generate_dig_list(matches: &[MatchRecord], config: &AnalysisConfig) -> Vec<DigItem> {
    let mut items = Vec::new();

    for m in matches {
        if !m.later.depth_pct.is_finite() {
            continue;
        }
        let depth = m.later.depth_pct;
        let rate = if m.depth_growth_rate.is_finite() && m.depth_growth_rate > 0.0 {
            m.depth_growth_rate
        } else {
            0.0
        };
        // Missing remaining life counts as "far away" for scoring.
        let life = if m.remaining_life_years.is_finite() {
            m.remaining_life_years
        } else {
            999.0
        };

        if depth < 20.0 && rate <= 0.5 {
            continue;
        }

        // Full credit at 80% depth, 5 %/yr, 0 years remaining.
        let depth_score = (depth / config.wall_loss_repair_threshold * 40.0).min(40.0);
        let rate_score = (rate / config.max_plausible_growth_rate * 30.0).min(30.0);
        let life_score = if life <= 0.0 {
            30.0
        } else if life >= 15.0 {
            0.0
        } else {
            30.0 * (1.0 - life / 15.0)
        };
        let urgency = depth_score + rate_score + life_score;

        let (category, priority) = if urgency >= 75.0 || depth >= 70.0 || life < 3.0 {
            (DigCategory::Immediate, 1)
        } else if urgency >= 50.0 || depth >= 50.0 || life < 7.0 {
            (DigCategory::Scheduled, 2)
        } else {
            (DigCategory::Monitor, 3)
        };

        items.push(DigItem {
            joint: m.later.joint,
            distance_ft: m.later.distance,
            clock: m.later.clock,
            depth_pct: depth,
            growth_rate: rate,
            remaining_life_years: m.remaining_life_years,
            event_type: m.later.event_type.clone(),
            id_od: m.later.id_od,
            wall_thickness_in: m.later.wall_thickness,
            urgency_score: urgency,
            category,
            priority,
            risk_category: m.risk_category,
            confidence: m.confidence_label,
        });
    }

    // Stable: equal-urgency items keep their input order.
    items.sort_by(|a, b| {
        a.priority.cmp(&b.priority).then(
            b.urgency_score
                .partial_cmp(&a.urgency_score)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });
    items
}

// ============================================================================
// 4. POPULATION GROWTH ANALYTICS
// ============================================================================

/// Growth-rate statistics for one pipe-cross-section quadrant.
#[derive(Debug, Clone, Serialize)]
pub struct QuadrantStats {
    pub quadrant: String,
    pub count: usize,
    pub mean_growth_rate: f64,
    pub median_growth_rate: f64,
    pub max_growth_rate: f64,
    pub pct_high_growth: f64,
    pub avg_depth: f64,
}

/// Internal vs external growth comparison.
#[derive(Debug, Clone, Serialize)]
pub struct IdOdStats {
    pub id_od: IdOd,
    pub count: usize,
    pub mean_growth_rate: f64,
    pub median_growth_rate: f64,
    pub max_growth_rate: f64,
    pub avg_depth: f64,
}

/// Growth by current-depth band: do deeper defects grow faster?
#[derive(Debug, Clone, Serialize)]
pub struct DepthBandStats {
    pub band: String,
    pub count: usize,
    pub mean_growth_rate: f64,
    pub median_growth_rate: f64,
}

/// The most diagnostic view: quadrant x surface cross-tab. A hot cell
/// (say bottom-of-pipe internal) points at a systemic mechanism such as
/// water settling rather than random pitting.
#[derive(Debug, Clone, Serialize)]
pub struct QuadrantIdOdStats {
    pub quadrant: String,
    pub id_od: IdOd,
    pub count: usize,
    pub mean_growth_rate: f64,
    pub avg_depth: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulationAnalytics {
    pub by_quadrant: Vec<QuadrantStats>,
    pub by_id_od: Vec<IdOdStats>,
    pub by_depth_band: Vec<DepthBandStats>,
    pub quadrant_id_od: Vec<QuadrantIdOdStats>,
}

/// Pipe cross-section quadrant from a clock position.
fn clock_quadrant(clock: f64) -> &'static str {
    if clock.is_nan() {
        return "Unknown";
    }
    let c = clock.rem_euclid(12.0);
    if c >= 10.0 || c < 2.0 {
        "Top (10-2)"
    } else if c < 4.0 {
        "Right (2-4)"
    } else if c < 8.0 {
        "Bottom (4-8)"
    } else {
        "Left (8-10)"
    }
}

fn depth_band(depth: f64) -> &'static str {
    if depth.is_nan() {
        "Unknown"
    } else if depth < 20.0 {
        "0-20%"
    } else if depth < 40.0 {
        "20-40%"
    } else if depth < 60.0 {
        "40-60%"
    } else {
        "60%+"
    }
}

fn median_of(rates: &[f64]) -> f64 {
    let mut data = Data::new(rates.to_vec());
    data.median()
}

/// Group growth rates by quadrant, ID/OD and depth band.
///
/// Negative rates are dropped first: depth decrease is physically
/// implausible and reads as measurement noise, which would drag every
/// group mean down.
pub fn population_analytics(matches: &[MatchRecord]) -> PopulationAnalytics {
    let valid: Vec<&MatchRecord> = matches
        .iter()
        .filter(|m| m.depth_growth_rate.is_finite() && m.depth_growth_rate >= 0.0)
        .collect();

    let mut by_quadrant_groups: BTreeMap<&'static str, Vec<&MatchRecord>> = BTreeMap::new();
    let mut by_id_od_groups: BTreeMap<IdOd, Vec<&MatchRecord>> = BTreeMap::new();
    let mut by_band_groups: BTreeMap<&'static str, Vec<&MatchRecord>> = BTreeMap::new();
    let mut cross_groups: BTreeMap<(&'static str, IdOd), Vec<&MatchRecord>> = BTreeMap::new();

    for m in &valid {
        let quadrant = clock_quadrant(m.later.clock);
        let band = depth_band(m.later.depth_pct);
        by_quadrant_groups.entry(quadrant).or_default().push(m);
        by_id_od_groups.entry(m.later.id_od).or_default().push(m);
        by_band_groups.entry(band).or_default().push(m);
        cross_groups
            .entry((quadrant, m.later.id_od))
            .or_default()
            .push(m);
    }

    let by_quadrant = by_quadrant_groups
        .into_iter()
        .map(|(quadrant, group)| {
            let rates: Vec<f64> = group.iter().map(|m| m.depth_growth_rate).collect();
            QuadrantStats {
                quadrant: quadrant.to_string(),
                count: group.len(),
                mean_growth_rate: rates.iter().mean(),
                median_growth_rate: median_of(&rates),
                max_growth_rate: rates.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                pct_high_growth: 100.0 * rates.iter().filter(|r| **r > 3.0).count() as f64
                    / group.len() as f64,
                avg_depth: group.iter().map(|m| m.later.depth_pct).mean(),
            }
        })
        .collect();

    let by_id_od = by_id_od_groups
        .into_iter()
        .map(|(id_od, group)| {
            let rates: Vec<f64> = group.iter().map(|m| m.depth_growth_rate).collect();
            IdOdStats {
                id_od,
                count: group.len(),
                mean_growth_rate: rates.iter().mean(),
                median_growth_rate: median_of(&rates),
                max_growth_rate: rates.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                avg_depth: group.iter().map(|m| m.later.depth_pct).mean(),
            }
        })
        .collect();

    let by_depth_band = by_band_groups
        .into_iter()
        .map(|(band, group)| {
            let rates: Vec<f64> = group.iter().map(|m| m.depth_growth_rate).collect();
            DepthBandStats {
                band: band.to_string(),
                count: group.len(),
                mean_growth_rate: rates.iter().mean(),
                median_growth_rate: median_of(&rates),
            }
        })
        .collect();

    let quadrant_id_od = cross_groups
        .into_iter()
        .map(|((quadrant, id_od), group)| QuadrantIdOdStats {
            quadrant: quadrant.to_string(),
            id_od,
            count: group.len(),
            mean_growth_rate: group.iter().map(|m| m.depth_growth_rate).mean(),
            avg_depth: group.iter().map(|m| m.later.depth_pct).mean(),
        })
        .collect();

    PopulationAnalytics {
        by_quadrant,
        by_id_od,
        by_depth_band,
        quadrant_id_od,
    }
}

// ============================================================================
// COMBINED DASHBOARD
// ============================================================================

/// Header counts for the integrity dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_dig_items: usize,
    pub immediate_count: usize,
    pub scheduled_count: usize,
    pub monitor_count: usize,
    pub interaction_clusters: usize,
    pub high_risk_segments: usize,
    pub total_segments: usize,
    pub match_pair: Option<(i32, i32)>,
}

/// All four analytics over one match set, plus summary counts.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityDashboard {
    pub summary: DashboardSummary,
    pub segments: Vec<SegmentRisk>,
    pub interactions: Vec<InteractionCluster>,
    pub dig_list: Vec<DigItem>,
    pub population: PopulationAnalytics,
}

/// Run every analytic over the given (scored) match set.
pub fn integrity_dashboard(
    matches: &[MatchRecord],
    match_pair: Option<(i32, i32)>,
    corrected_runs: &BTreeMap<i32, AlignedRun>,
    config: &AnalysisConfig,
) -> IntegrityDashboard {
    let segments = segment_risk_analysis(matches, corrected_runs, config);
    let interactions = interaction_assessment(matches, config);
    let dig_list = generate_dig_list(matches, config);
    let population = population_analytics(matches);

    let summary = DashboardSummary {
        total_dig_items: dig_list.len(),
        immediate_count: dig_list
            .iter()
            .filter(|d| d.category == DigCategory::Immediate)
            .count(),
        scheduled_count: dig_list
            .iter()
            .filter(|d| d.category == DigCategory::Scheduled)
            .count(),
        monitor_count: dig_list
            .iter()
            .filter(|d| d.category == DigCategory::Monitor)
            .count(),
        interaction_clusters: interactions.len(),
        high_risk_segments: segments.iter().filter(|s| s.risk_score >= 60.0).count(),
        total_segments: segments.len(),
        match_pair,
    };

    IntegrityDashboard {
        summary,
        segments,
        interactions,
        dig_list,
        population,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::growth::score_matches;
    use crate::matching::{match_anomalies, MatchOutcome};
    use crate::record::{AlignedFeature, AlignedRun, FeatureRecord};
    use approx::assert_relative_eq;

    fn feature(
        row: usize,
        distance: f64,
        clock: f64,
        depth: f64,
        length: f64,
        id_od: IdOd,
    ) -> AlignedFeature {
        AlignedFeature {
            feature: FeatureRecord {
                joint_number: Some(1 + (distance / 40.0) as i64),
                log_distance_ft: distance,
                elevation_ft: f64::NAN,
                event_type: EventType::MetalLoss,
                depth_pct: depth,
                depth_in: f64::NAN,
                length_in: length,
                width_in: 1.0,
                clock_hours: clock,
                id_od,
                wall_thickness_in: 0.3,
                comments: None,
                source_row_idx: row,
            },
            corrected_distance: distance,
        }
    }

    /// A scored match set with a tight pair of deep defects at ~500 ft, a
    /// slow shallow one at 2500 ft and a bottom-of-pipe internal one at
    /// 4200 ft.
    fn scored_outcome() -> MatchOutcome {
        let config = AnalysisConfig::default();
        let earlier = AlignedRun {
            year: 2015,
            features: vec![
                feature(0, 500.0, 3.0, 50.0, 4.0, IdOd::External),
                feature(1, 500.3, 3.1, 40.0, 3.0, IdOd::External),
                feature(2, 2500.0, 12.0 - 0.5, 10.0, 2.0, IdOd::External),
                feature(3, 4200.0, 6.0, 30.0, 2.0, IdOd::Internal),
            ],
        };
        let later = AlignedRun {
            year: 2022,
            features: vec![
                feature(0, 500.1, 3.0, 72.0, 4.0, IdOd::External),
                feature(1, 500.4, 3.1, 55.0, 3.0, IdOd::External),
                feature(2, 2500.1, 11.5, 12.0, 2.0, IdOd::External),
                feature(3, 4200.1, 6.0, 44.0, 2.0, IdOd::Internal),
            ],
        };
        let mut outcome = match_anomalies(&later, &earlier, 7.0, &config);
        score_matches(&mut outcome.matches, &config);
        assert_eq!(outcome.matches.len(), 4);
        outcome
    }

    fn corrected_runs() -> BTreeMap<i32, AlignedRun> {
        let later = AlignedRun {
            year: 2022,
            features: vec![
                feature(0, 500.1, 3.0, 72.0, 4.0, IdOd::External),
                feature(1, 4200.1, 6.0, 44.0, 2.0, IdOd::Internal),
            ],
        };
        let mut runs = BTreeMap::new();
        runs.insert(2022, later);
        runs
    }

    #[test]
    fn test_segment_scores() {
        let config = AnalysisConfig::default();
        let outcome = scored_outcome();
        let segments = segment_risk_analysis(&outcome.matches, &corrected_runs(), &config);

        // Extent 4200.1 ft -> 5 segments of 1000 ft
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0].anomaly_count, 2);
        assert_relative_eq!(segments[0].max_depth_pct, 72.0);
        // Segment 2 (1000-2000) is empty and scores zero
        assert_eq!(segments[1].anomaly_count, 0);
        assert_eq!(segments[1].risk_score, 0.0);
        assert_eq!(segments[2].anomaly_count, 1);
        assert_eq!(segments[4].anomaly_count, 1);
        for s in &segments {
            assert!(s.risk_score >= 0.0 && s.risk_score <= 100.0);
        }
    }

    #[test]
    fn test_segment_fallback_without_matches() {
        let config = AnalysisConfig::default();
        let segments = segment_risk_analysis(&[], &corrected_runs(), &config);
        assert_eq!(segments.len(), 5);
        // Raw anomalies still counted, but carry no growth contribution
        assert_eq!(segments[0].anomaly_count, 1);
        assert_eq!(segments[0].avg_growth_rate, 0.0);
    }

    #[test]
    fn test_interaction_clustering() {
        let config = AnalysisConfig::default();
        let outcome = scored_outcome();
        let clusters = interaction_assessment(&outcome.matches, &config);

        // The two defects at 500.1/500.4 are 0.3 ft apart: clear spacing
        // 0.3 - 4/12 < 6*0.3/12, so they interact. Nothing else is close.
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.anomaly_count, 2);
        assert_relative_eq!(cluster.span_ft, 0.3, epsilon = 1e-9);
        assert_relative_eq!(cluster.effective_length_in, 0.3 * 12.0 + 4.0, epsilon = 1e-9);
        // Max depth 72% >= 60 -> HIGH
        assert_eq!(cluster.severity, Severity::High);
        assert_relative_eq!(cluster.interaction_threshold_in, 1.8, epsilon = 1e-9);
    }

    #[test]
    fn test_interaction_requires_two() {
        let config = AnalysisConfig::default();
        let outcome = scored_outcome();
        // Keep only the isolated defect
        let lone: Vec<MatchRecord> = outcome
            .matches
            .iter()
            .filter(|m| m.later.row_idx == 3)
            .cloned()
            .collect();
        assert!(interaction_assessment(&lone, &config).is_empty());
    }

    #[test]
    fn test_dig_list_eligibility_and_order() {
        let config = AnalysisConfig::default();
        let outcome = scored_outcome();
        let dig_list = generate_dig_list(&outcome.matches, &config);

        // The shallow slow defect (12%, ~0.29 %/yr) is excluded.
        assert_eq!(dig_list.len(), 3);
        assert!(dig_list.iter().all(|d| d.depth_pct >= 20.0));

        // Priorities ascending, urgency descending within a tier.
        for pair in dig_list.windows(2) {
            assert!(pair[0].priority <= pair[1].priority);
            if pair[0].priority == pair[1].priority {
                assert!(pair[0].urgency_score >= pair[1].urgency_score);
            }
        }
        // 72% depth crosses the IMMEDIATE hard threshold.
        assert_eq!(dig_list[0].category, DigCategory::Immediate);
        assert_relative_eq!(dig_list[0].depth_pct, 72.0);
    }

    #[test]
    fn test_dig_list_sort_is_stable() {
        let config = AnalysisConfig::default();
        let outcome = scored_outcome();
        let once = generate_dig_list(&outcome.matches, &config);
        let twice = generate_dig_list(&outcome.matches, &config);
        let order_once: Vec<_> = once.iter().map(|d| d.distance_ft.to_bits()).collect();
        let order_twice: Vec<_> = twice.iter().map(|d| d.distance_ft.to_bits()).collect();
        assert_eq!(order_once, order_twice);
    }

    #[test]
    fn test_clock_quadrants() {
        assert_eq!(clock_quadrant(11.0), "Top (10-2)");
        assert_eq!(clock_quadrant(0.5), "Top (10-2)");
        assert_eq!(clock_quadrant(2.0), "Right (2-4)");
        assert_eq!(clock_quadrant(3.9), "Right (2-4)");
        assert_eq!(clock_quadrant(6.0), "Bottom (4-8)");
        assert_eq!(clock_quadrant(8.0), "Left (8-10)");
        assert_eq!(clock_quadrant(9.9), "Left (8-10)");
        assert_eq!(clock_quadrant(10.0), "Top (10-2)");
        assert_eq!(clock_quadrant(f64::NAN), "Unknown");
    }

    #[test]
    fn test_population_drops_negative_rates() {
        let outcome = scored_outcome();
        let population = population_analytics(&outcome.matches);

        let total: usize = population.by_quadrant.iter().map(|q| q.count).sum();
        let negatives = outcome
            .matches
            .iter()
            .filter(|m| m.depth_growth_rate < 0.0)
            .count();
        assert_eq!(total + negatives, outcome.matches.len());

        for q in &population.by_quadrant {
            assert!(q.mean_growth_rate >= 0.0);
            assert!(q.median_growth_rate >= 0.0);
        }
    }

    #[test]
    fn test_population_cross_tab() {
        let outcome = scored_outcome();
        let population = population_analytics(&outcome.matches);

        let internal_bottom = population
            .quadrant_id_od
            .iter()
            .find(|c| c.quadrant == "Bottom (4-8)" && c.id_od == IdOd::Internal);
        assert!(internal_bottom.is_some());
        assert_eq!(internal_bottom.unwrap().count, 1);
    }

    #[test]
    fn test_dashboard_summary_counts() {
        let config = AnalysisConfig::default();
        let outcome = scored_outcome();
        let dashboard = integrity_dashboard(
            &outcome.matches,
            Some((2015, 2022)),
            &corrected_runs(),
            &config,
        );

        assert_eq!(dashboard.summary.total_dig_items, dashboard.dig_list.len());
        assert_eq!(
            dashboard.summary.immediate_count
                + dashboard.summary.scheduled_count
                + dashboard.summary.monitor_count,
            dashboard.summary.total_dig_items
        );
        assert_eq!(dashboard.summary.interaction_clusters, 1);
        assert_eq!(dashboard.summary.total_segments, 5);
        assert_eq!(dashboard.summary.match_pair, Some((2015, 2022)));
    }
}
