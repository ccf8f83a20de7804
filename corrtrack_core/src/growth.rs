//! Growth scoring, risk classification and multi-run trend fitting.
//!
//! Enriches matched anomaly pairs with remaining-wall and remaining-life
//! estimates, categorical growth bands and a composite risk score, and
//! fits linear/quadratic depth trends to anomalies tracked across all
//! three runs.

use crate::chain::TripleMatch;
use crate::config::AnalysisConfig;
use crate::matching::MatchRecord;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::fmt;

/// Categorical band for an annualized depth growth rate (%/yr).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrowthClass {
    Unknown,
    /// Negative rate - wall loss does not reverse, so this is a
    /// measurement artifact or a mismatch.
    #[serde(rename = "Apparent Shrinkage")]
    ApparentShrinkage,
    Stable,
    Low,
    Moderate,
    High,
    Severe,
}

impl fmt::Display for GrowthClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GrowthClass::Unknown => "Unknown",
            GrowthClass::ApparentShrinkage => "Apparent Shrinkage",
            GrowthClass::Stable => "Stable",
            GrowthClass::Low => "Low",
            GrowthClass::Moderate => "Moderate",
            GrowthClass::High => "High",
            GrowthClass::Severe => "Severe",
        };
        f.write_str(label)
    }
}

/// Named tier for a composite risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskCategory::Unknown => "Unknown",
            RiskCategory::Low => "Low",
            RiskCategory::Medium => "Medium",
            RiskCategory::High => "High",
            RiskCategory::Critical => "Critical",
        };
        f.write_str(label)
    }
}

// ============================================================================
// SCORING
// ============================================================================

/// Enrich matched pairs in place with remaining-wall, remaining-life,
/// growth class and risk scoring.
///
/// Every derived field depends only on the matcher's base fields, so
/// reapplying the scorer to an already-scored set is a no-op.
pub fn score_matches(matches: &mut [MatchRecord], config: &AnalysisConfig) {
    for m in matches {
        m.remaining_wall_pct = 100.0 - m.later.depth_pct;
        m.remaining_life_years = remaining_life(m.later.depth_pct, m.depth_growth_rate, config);
        m.growth_class = classify_growth(m.depth_growth_rate, config);
        m.risk_score = risk_score(m.later.depth_pct, m.depth_growth_rate, config);
        m.risk_category = classify_risk(m.risk_score);
    }
}

/// Years until the anomaly reaches the repair threshold at its current
/// rate. NaN for stable or shrinking anomalies (they are not progressing
/// toward the threshold); 0 when the depth is already at or past it.
fn remaining_life(depth: f64, rate: f64, config: &AnalysisConfig) -> f64 {
    if rate.is_nan() || depth.is_nan() || rate <= 0.0 {
        return f64::NAN;
    }
    let remaining_capacity = config.wall_loss_repair_threshold - depth;
    if remaining_capacity <= 0.0 {
        0.0
    } else {
        remaining_capacity / rate
    }
}

/// Classify a growth rate into its named band (%/yr):
/// <0 Apparent Shrinkage, 0 Stable, (0,1] Low, (1,3] Moderate,
/// (3,5] High, >5 Severe.
pub fn classify_growth(rate: f64, config: &AnalysisConfig) -> GrowthClass {
    if rate.is_nan() {
        GrowthClass::Unknown
    } else if rate < 0.0 {
        GrowthClass::ApparentShrinkage
    } else if rate == 0.0 {
        GrowthClass::Stable
    } else if rate <= 1.0 {
        GrowthClass::Low
    } else if rate <= 3.0 {
        GrowthClass::Moderate
    } else if rate <= config.max_plausible_growth_rate {
        GrowthClass::High
    } else {
        GrowthClass::Severe
    }
}

/// Composite risk score in [0, 100] with two equally-weighted components:
/// depth (saturating at the repair threshold) and growth rate (saturating
/// at the plausible-growth cap). Missing values contribute zero.
pub fn risk_score(depth: f64, rate: f64, config: &AnalysisConfig) -> f64 {
    let depth = if depth.is_nan() { 0.0 } else { depth };
    let rate = if rate.is_nan() || rate < 0.0 { 0.0 } else { rate };

    let depth_score = (depth * 50.0 / config.wall_loss_repair_threshold).min(50.0);
    let rate_score = (rate * 50.0 / config.max_plausible_growth_rate).min(50.0);
    depth_score + rate_score
}

/// Risk tier: >=70 Critical, >=50 High, >=30 Medium, else Low.
pub fn classify_risk(score: f64) -> RiskCategory {
    if score.is_nan() {
        RiskCategory::Unknown
    } else if score >= 70.0 {
        RiskCategory::Critical
    } else if score >= 50.0 {
        RiskCategory::High
    } else if score >= 30.0 {
        RiskCategory::Medium
    } else {
        RiskCategory::Low
    }
}

// ============================================================================
// TREND FITTING
// ============================================================================

/// Fit depth-over-year trends for triple-tracked anomalies in place.
///
/// With two or more known depths an ordinary least-squares line yields the
/// slope, R² and projected depths at 2030/2035. With all three depths a
/// quadratic is also fitted; a positive leading coefficient flags the
/// anomaly as accelerating.
pub fn predict_growth_trends(triples: &mut [TripleMatch]) {
    for triple in triples {
        let mut years = Vec::with_capacity(3);
        let mut depths = Vec::with_capacity(3);
        for (year, depth) in triple.year_depths() {
            if !depth.is_nan() {
                years.push(year as f64);
                depths.push(depth);
            }
        }

        if years.len() >= 2 {
            if let Some(fit) = linear_fit(&years, &depths) {
                triple.linear_rate = fit.slope;
                triple.linear_r2 = fit.r_squared;
                triple.predicted_2030 = fit.predict(2030.0);
                triple.predicted_2035 = fit.predict(2035.0);
            }
        }
        if years.len() == 3 {
            if let Some(leading) = quadratic_leading_coefficient(&years, &depths) {
                triple.is_accelerating = leading > 0.0;
            }
        }
    }
}

struct LinearFit {
    slope: f64,
    intercept_at_mean: f64,
    x_mean: f64,
    r_squared: f64,
}

impl LinearFit {
    fn predict(&self, x: f64) -> f64 {
        self.intercept_at_mean + self.slope * (x - self.x_mean)
    }
}

/// Ordinary least squares via the normal equations, with the x axis
/// centered for conditioning (years are ~2e3, so x² terms would otherwise
/// dwarf the rest of the system).
fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    let n = xs.len();
    let x_mean = xs.iter().mean();

    let design = DMatrix::from_fn(n, 2, |r, c| if c == 0 { xs[r] - x_mean } else { 1.0 });
    let y = DVector::from_column_slice(ys);
    let xtx = design.transpose() * &design;
    let xty = design.transpose() * &y;
    let beta = xtx.try_inverse()? * xty;

    let slope = beta[0];
    let intercept_at_mean = beta[1];

    let y_mean = ys.iter().mean();
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for r in 0..n {
        let predicted = intercept_at_mean + slope * (xs[r] - x_mean);
        ss_res += (ys[r] - predicted).powi(2);
        ss_tot += (ys[r] - y_mean).powi(2);
    }
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        f64::NAN
    };

    Some(LinearFit {
        slope,
        intercept_at_mean,
        x_mean,
        r_squared,
    })
}

/// Leading coefficient of the least-squares quadratic. Shift-invariant, so
/// the centered x axis changes nothing about the sign test.
fn quadratic_leading_coefficient(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len();
    let x_mean = xs.iter().mean();

    let design = DMatrix::from_fn(n, 3, |r, c| {
        let x = xs[r] - x_mean;
        match c {
            0 => x * x,
            1 => x,
            _ => 1.0,
        }
    });
    let y = DVector::from_column_slice(ys);
    let xtx = design.transpose() * &design;
    let xty = design.transpose() * &y;
    let beta = xtx.try_inverse()? * xty;
    Some(beta[0])
}

// ============================================================================
// SUMMARIES
// ============================================================================

/// Population-level growth-rate summary over one match set.
#[derive(Debug, Clone, Serialize)]
pub struct GrowthSummary {
    pub count: usize,
    pub mean_rate: f64,
    pub median_rate: f64,
    pub std_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub pct_negative: f64,
    pub pct_high: f64,
    pub pct_severe: f64,
}

/// Aggregate growth statistics over pairs with a defined rate. `None`
/// when no rate survives the NaN filter.
pub fn growth_summary(matches: &[MatchRecord], config: &AnalysisConfig) -> Option<GrowthSummary> {
    let rates: Vec<f64> = matches
        .iter()
        .map(|m| m.depth_growth_rate)
        .filter(|r| !r.is_nan())
        .collect();
    if rates.is_empty() {
        return None;
    }

    let count = rates.len();
    let mut data = Data::new(rates.clone());
    Some(GrowthSummary {
        count,
        mean_rate: rates.iter().mean(),
        median_rate: data.median(),
        std_rate: rates.iter().std_dev(),
        min_rate: rates.iter().copied().fold(f64::INFINITY, f64::min),
        max_rate: rates.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        pct_negative: 100.0 * rates.iter().filter(|r| **r < 0.0).count() as f64 / count as f64,
        pct_high: 100.0 * rates.iter().filter(|r| **r > 3.0).count() as f64 / count as f64,
        pct_severe: 100.0
            * rates
                .iter()
                .filter(|r| **r > config.max_plausible_growth_rate)
                .count() as f64
            / count as f64,
    })
}

/// The `n` highest-risk matched anomalies, ordered by descending risk
/// score with later-run row order breaking ties.
pub fn top_concerns<'a>(matches: &'a [MatchRecord], n: usize) -> Vec<&'a MatchRecord> {
    let mut ranked: Vec<&MatchRecord> = matches
        .iter()
        .filter(|m| !m.risk_score.is_nan())
        .collect();
    ranked.sort_by(|a, b| {
        b.risk_score
            .partial_cmp(&a.risk_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.later.row_idx.cmp(&b.later.row_idx))
    });
    ranked.truncate(n);
    ranked
}

// ============================================================================
// TESTS
// ============================================================================
