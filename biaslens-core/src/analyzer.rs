//! Baseline-and-zone statistical analyzer.
//!
//! Aggregates findings into an overall score, classifies scores against a
//! [`Baseline`] into green / yellow / red zones, and walks score histories to
//! flag drift and summarize trend direction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BaselineDefaults;
use crate::error::{InsufficientDataError, Result, StateError, ValidationError};
use crate::stats;
use crate::types::{Baseline, Evaluation, Finding, ScorePoint, Zone, ZoneThresholds};

/// Fewest completed evaluations a baseline can be built from.
pub const MIN_BASELINE_SAMPLES: usize = 2;
/// Default |z| above which a score counts as drift.
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 2.0;
/// Default |slope| (score points per evaluation) below which a trend is stable.
pub const DEFAULT_STABLE_SLOPE: f64 = 0.5;

/// Severity-weighted mean of the findings' severity scores.
///
/// Critical findings weigh four times as much as low ones, so the worst
/// patterns dominate. The result always lies between the smallest and largest
/// input score.
pub fn compute_overall_score(findings: &[Finding]) -> Result<f64> {
    if findings.is_empty() {
        return Err(InsufficientDataError::NoFindings.into());
    }
    let (weighted_sum, total_weight) = findings.iter().fold((0.0, 0.0), |(sum, weight), f| {
        let w = f.severity.weight();
        (sum + f.severity_score * w, weight + w)
    });
    let min = findings
        .iter()
        .map(|f| f.severity_score)
        .fold(f64::INFINITY, f64::min);
    let max = findings
        .iter()
        .map(|f| f.severity_score)
        .fold(f64::NEG_INFINITY, f64::max);
    // Rounding in the division can step a hair outside the inputs.
    Ok((weighted_sum / total_weight).clamp(min, max))
}

/// Classify `score` against `baseline`.
///
/// Thresholds are inclusive upper bounds: `score <= green_zone_max` is green,
/// `score <= yellow_zone_max` is yellow, anything above is red. A zero-variance
/// baseline without threshold overrides is green only at its mean, up to
/// rounding noise.
pub fn classify_zone(score: f64, baseline: &Baseline) -> Zone {
    if baseline.is_degenerate() {
        return if stats::approx_eq(score, baseline.mean) {
            Zone::Green
        } else {
            Zone::Red
        };
    }
    if score <= baseline.green_zone_max {
        Zone::Green
    } else if score <= baseline.yellow_zone_max {
        Zone::Yellow
    } else {
        Zone::Red
    }
}

/// Build a baseline from raw overall scores.
pub fn baseline_from_scores(
    name: impl Into<String>,
    scores: &[f64],
    overrides: ZoneThresholds,
) -> Result<Baseline> {
    if scores.len() < MIN_BASELINE_SAMPLES {
        return Err(InsufficientDataError::BaselineSamples {
            required: MIN_BASELINE_SAMPLES,
            got: scores.len(),
        }
        .into());
    }
    let mean = stats::mean(scores);
    let std_dev = stats::population_std_dev(scores, mean);
    build_baseline(name.into(), mean, std_dev, scores.len(), overrides)
}

/// Build a baseline over the overall scores of completed evaluations.
pub fn create_baseline(
    name: impl Into<String>,
    evaluations: &[Evaluation],
    overrides: ZoneThresholds,
) -> Result<Baseline> {
    if evaluations.len() < MIN_BASELINE_SAMPLES {
        return Err(InsufficientDataError::BaselineSamples {
            required: MIN_BASELINE_SAMPLES,
            got: evaluations.len(),
        }
        .into());
    }
    let scores = evaluations
        .iter()
        .map(|e| match (e.is_completed(), e.overall_score) {
            (true, Some(score)) => Ok(score),
            _ => Err(StateError::NotCompleted {
                id: e.id,
                status: e.status,
            }),
        })
        .collect::<std::result::Result<Vec<f64>, StateError>>()?;
    baseline_from_scores(name, &scores, overrides)
}

/// The baseline used before any reference evaluations exist.
pub fn default_baseline(defaults: &BaselineDefaults) -> Result<Baseline> {
    build_baseline(
        defaults.name.clone(),
        defaults.mean,
        defaults.std_dev,
        0,
        ZoneThresholds {
            green_zone_max: defaults.green_zone_max,
            yellow_zone_max: defaults.yellow_zone_max,
        },
    )
}

fn build_baseline(
    name: String,
    mean: f64,
    std_dev: f64,
    sample_size: usize,
    overrides: ZoneThresholds,
) -> Result<Baseline> {
    let green_zone_max = overrides.green_zone_max.unwrap_or(mean + 0.5 * std_dev);
    let yellow_zone_max = overrides.yellow_zone_max.unwrap_or(mean + 1.5 * std_dev);
    if green_zone_max > yellow_zone_max {
        return Err(ValidationError::InvalidThresholds {
            green: green_zone_max,
            yellow: yellow_zone_max,
        }
        .into());
    }
    tracing::debug!(
        baseline = %name,
        mean,
        std_dev,
        sample_size,
        green_zone_max,
        yellow_zone_max,
        "Baseline computed"
    );
    Ok(Baseline {
        id: Uuid::new_v4(),
        name,
        mean,
        std_dev,
        sample_size,
        green_zone_max,
        yellow_zone_max,
        created_at: Utc::now(),
    })
}

/// Outcome of checking one score for drift against a baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftCheck {
    pub has_drift: bool,
    /// `None` when the baseline has zero variance.
    pub z_score: Option<f64>,
    /// Absolute distance from the baseline mean.
    pub deviation: f64,
    pub message: String,
}

/// Check whether `score` deviates from `baseline` by more than `threshold` σ.
pub fn detect_drift(score: f64, baseline: &Baseline, threshold: f64) -> DriftCheck {
    let deviation = (score - baseline.mean).abs();
    match stats::z_score(score, baseline.mean, baseline.std_dev) {
        Some(z) => {
            let has_drift = z.abs() > threshold;
            let message = if has_drift {
                format!(
                    "Score {score:.2} is {:.2} standard deviations from baseline mean {:.2}",
                    z.abs(),
                    baseline.mean
                )
            } else {
                "No significant drift detected".to_string()
            };
            DriftCheck {
                has_drift,
                z_score: Some(z),
                deviation,
                message,
            }
        }
        None => {
            let has_drift = !stats::approx_eq(score, baseline.mean);
            let message = if has_drift {
                format!(
                    "Score {score:.2} differs from constant baseline of {:.2}",
                    baseline.mean
                )
            } else {
                "No significant drift detected".to_string()
            };
            DriftCheck {
                has_drift,
                z_score: None,
                deviation,
                message,
            }
        }
    }
}

/// One classified point of a score history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: chrono::DateTime<Utc>,
    pub score: f64,
    pub zone: Zone,
    pub z_score: Option<f64>,
}

/// A score that drifted beyond the configured z-score magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftAlert {
    pub timestamp: chrono::DateTime<Utc>,
    pub score: f64,
    pub z_score: Option<f64>,
    pub deviation: f64,
    pub message: String,
}

/// Direction of a score history's least-squares slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    InsufficientData,
    Stable,
    Increasing,
    Decreasing,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::InsufficientData => write!(f, "insufficient_data"),
            TrendDirection::Stable => write!(f, "stable"),
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
        }
    }
}

/// Slope-based summary of where a score history is heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub direction: TrendDirection,
    pub slope: f64,
    pub start_score: Option<f64>,
    pub end_score: Option<f64>,
    pub change: f64,
}

impl TrendSummary {
    pub fn from_scores(scores: &[f64], stable_slope: f64) -> Self {
        if scores.len() < 2 {
            return Self {
                direction: TrendDirection::InsufficientData,
                slope: 0.0,
                start_score: scores.first().copied(),
                end_score: scores.last().copied(),
                change: 0.0,
            };
        }
        let slope = stats::index_slope(scores);
        let direction = if slope.abs() < stable_slope {
            TrendDirection::Stable
        } else if slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };
        let start = scores[0];
        let end = scores[scores.len() - 1];
        Self {
            direction,
            slope,
            start_score: Some(start),
            end_score: Some(end),
            change: end - start,
        }
    }
}

/// Longitudinal view of a score series against a baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub baseline_name: String,
    pub time_series: Vec<TrendPoint>,
    pub drift_alerts: Vec<DriftAlert>,
    pub trend: TrendSummary,
    /// Zone of the most recent point, if any.
    pub current_zone: Option<Zone>,
}

/// Walk `series` chronologically, classifying every point and raising a
/// drift alert whenever |z| exceeds `drift_threshold`.
pub fn compute_trends(series: &[ScorePoint], baseline: &Baseline, drift_threshold: f64) -> TrendReport {
    compute_trends_with(series, baseline, drift_threshold, DEFAULT_STABLE_SLOPE)
}

/// [`compute_trends`] with an explicit slope band for the `stable` direction.
pub fn compute_trends_with(
    series: &[ScorePoint],
    baseline: &Baseline,
    drift_threshold: f64,
    stable_slope: f64,
) -> TrendReport {
    let mut ordered = series.to_vec();
    ordered.sort_by_key(|p| p.timestamp);

    let mut time_series = Vec::with_capacity(ordered.len());
    let mut drift_alerts = Vec::new();

    for point in &ordered {
        let drift = detect_drift(point.score, baseline, drift_threshold);
        time_series.push(TrendPoint {
            timestamp: point.timestamp,
            score: point.score,
            zone: classify_zone(point.score, baseline),
            z_score: drift.z_score,
        });
        if drift.has_drift {
            tracing::info!(
                baseline = %baseline.name,
                score = point.score,
                z_score = ?drift.z_score,
                "Drift detected"
            );
            drift_alerts.push(DriftAlert {
                timestamp: point.timestamp,
                score: point.score,
                z_score: drift.z_score,
                deviation: drift.deviation,
                message: drift.message,
            });
        }
    }

    let scores: Vec<f64> = ordered.iter().map(|p| p.score).collect();
    TrendReport {
        baseline_name: baseline.name.clone(),
        current_zone: time_series.last().map(|p| p.zone),
        time_series,
        drift_alerts,
        trend: TrendSummary::from_scores(&scores, stable_slope),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BiasLensError;
    use crate::types::{BiasType, EvaluationStatus, SeverityBucket};
    use chrono::{Duration, TimeZone};

    fn finding(score: f64) -> Finding {
        Finding {
            id: Uuid::new_v4(),
            evaluation_id: None,
            bias_type: BiasType::Anchoring,
            severity_score: score,
            severity: SeverityBucket::from_score(score),
            confidence_level: 0.5,
            detection_count: 10,
            iteration_count: 20,
            detection_proportion: 0.5,
            example_instances: Vec::new(),
            pattern_description: String::new(),
        }
    }

    fn baseline(mean: f64, std_dev: f64) -> Baseline {
        build_baseline("test".into(), mean, std_dev, 10, ZoneThresholds::default()).unwrap()
    }

    fn completed(score: f64) -> Evaluation {
        let mut eval = Evaluation::new("sys", &[BiasType::Anchoring], 10).unwrap();
        eval.transition(EvaluationStatus::Running).unwrap();
        eval.transition(EvaluationStatus::Completed).unwrap();
        eval.overall_score = Some(score);
        eval
    }

    #[test]
    fn test_overall_score_weighted() {
        // low (10, w=1) and critical (90, w=4): (10 + 360) / 5 = 74
        let score = compute_overall_score(&[finding(10.0), finding(90.0)]).unwrap();
        assert!((score - 74.0).abs() < 1e-9);
    }

    #[test]
    fn test_overall_score_single() {
        let score = compute_overall_score(&[finding(42.0)]).unwrap();
        assert_eq!(score, 42.0);
    }

    #[test]
    fn test_overall_score_empty() {
        let err = compute_overall_score(&[]).unwrap_err();
        assert!(matches!(
            err,
            BiasLensError::InsufficientData(InsufficientDataError::NoFindings)
        ));
    }

    #[test]
    fn test_classify_zone_scenario() {
        let b = baseline(50.0, 10.0);
        assert_eq!(b.green_zone_max, 55.0);
        assert_eq!(b.yellow_zone_max, 65.0);
        assert_eq!(classify_zone(54.0, &b), Zone::Green);
        assert_eq!(classify_zone(55.0, &b), Zone::Green);
        assert_eq!(classify_zone(60.0, &b), Zone::Yellow);
        assert_eq!(classify_zone(65.0, &b), Zone::Yellow);
        assert_eq!(classify_zone(70.0, &b), Zone::Red);
    }

    #[test]
    fn test_classify_zone_degenerate() {
        let b = baseline(40.0, 0.0);
        assert!(b.is_degenerate());
        assert_eq!(classify_zone(40.0, &b), Zone::Green);
        assert_eq!(classify_zone(39.0, &b), Zone::Red);
        assert_eq!(classify_zone(41.0, &b), Zone::Red);
    }

    #[test]
    fn test_flat_reference_scores_classify_their_own_score_green() {
        for n in 2..=6 {
            for cents in 0..=10_000u32 {
                let v = f64::from(cents) / 100.0;
                let b = baseline_from_scores("flat", &vec![v; n], ZoneThresholds::default())
                    .unwrap();
                assert_eq!(b.std_dev, 0.0, "v={v} n={n}");
                assert!(b.is_degenerate(), "v={v} n={n}");
                assert_eq!(classify_zone(v, &b), Zone::Green, "v={v} n={n}");
                assert_eq!(classify_zone(v + 0.01, &b), Zone::Red, "v={v} n={n}");
                assert!(!detect_drift(v, &b, 2.0).has_drift, "v={v} n={n}");
            }
        }
    }

    #[test]
    fn test_degenerate_rule_tolerates_rounding_in_mean() {
        let b = baseline(0.8699999999999999, 1.11e-16);
        assert!(b.is_degenerate());
        assert_eq!(classify_zone(0.87, &b), Zone::Green);
        assert!(detect_drift(0.87, &b, 2.0).z_score.is_none());
    }

    #[test]
    fn test_classify_zone_overridden_flat_baseline() {
        let b = build_baseline(
            "flat".into(),
            40.0,
            0.0,
            3,
            ZoneThresholds {
                green_zone_max: Some(45.0),
                yellow_zone_max: Some(60.0),
            },
        )
        .unwrap();
        assert!(!b.is_degenerate());
        assert_eq!(classify_zone(30.0, &b), Zone::Green);
        assert_eq!(classify_zone(50.0, &b), Zone::Yellow);
    }

    #[test]
    fn test_baseline_scenario() {
        let b = baseline_from_scores("ref", &[40.0, 50.0, 60.0], ZoneThresholds::default()).unwrap();
        assert!((b.mean - 50.0).abs() < 1e-12);
        assert!((b.std_dev - 8.16).abs() < 0.01);
        assert_eq!(b.sample_size, 3);
        assert!((b.green_zone_max - (50.0 + 0.5 * b.std_dev)).abs() < 1e-12);
        assert!((b.yellow_zone_max - (50.0 + 1.5 * b.std_dev)).abs() < 1e-12);
    }

    #[test]
    fn test_baseline_requires_two_samples() {
        let err = baseline_from_scores("ref", &[40.0], ZoneThresholds::default()).unwrap_err();
        assert!(matches!(
            err,
            BiasLensError::InsufficientData(InsufficientDataError::BaselineSamples {
                required: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_baseline_rejects_inverted_overrides() {
        let err = baseline_from_scores(
            "ref",
            &[40.0, 60.0],
            ZoneThresholds {
                green_zone_max: Some(70.0),
                yellow_zone_max: Some(60.0),
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BiasLensError::Validation(ValidationError::InvalidThresholds { .. })
        ));
    }

    #[test]
    fn test_create_baseline_from_evaluations() {
        let evals = vec![completed(40.0), completed(50.0), completed(60.0)];
        let b = create_baseline("prod", &evals, ZoneThresholds::default()).unwrap();
        assert_eq!(b.name, "prod");
        assert_eq!(b.sample_size, 3);
    }

    #[test]
    fn test_create_baseline_rejects_pending() {
        let pending = Evaluation::new("sys", &[BiasType::Anchoring], 10).unwrap();
        let evals = vec![completed(40.0), pending];
        let err = create_baseline("prod", &evals, ZoneThresholds::default()).unwrap_err();
        assert!(matches!(
            err,
            BiasLensError::State(StateError::NotCompleted {
                status: EvaluationStatus::Pending,
                ..
            })
        ));
    }

    #[test]
    fn test_default_baseline() {
        let b = default_baseline(&BaselineDefaults::default()).unwrap();
        assert_eq!(b.green_zone_max, 37.5);
        assert_eq!(b.yellow_zone_max, 52.5);
        assert_eq!(b.sample_size, 0);
    }

    #[test]
    fn test_detect_drift() {
        let b = baseline(50.0, 10.0);
        let check = detect_drift(75.0, &b, 2.0);
        assert!(check.has_drift);
        assert_eq!(check.z_score, Some(2.5));
        assert_eq!(check.deviation, 25.0);

        let check = detect_drift(70.0, &b, 2.0);
        assert!(!check.has_drift, "exactly 2σ is not beyond the threshold");

        let check = detect_drift(20.0, &b, 2.0);
        assert!(check.has_drift);
        assert_eq!(check.z_score, Some(-3.0));
    }

    #[test]
    fn test_detect_drift_zero_variance() {
        let b = baseline(50.0, 0.0);
        let check = detect_drift(50.0, &b, 2.0);
        assert!(!check.has_drift);
        assert!(check.z_score.is_none());
        let check = detect_drift(51.0, &b, 2.0);
        assert!(check.has_drift);
        assert_eq!(check.deviation, 1.0);
    }

    #[test]
    fn test_compute_trends() {
        let b = baseline(50.0, 10.0);
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        // Deliberately out of order.
        let series = vec![
            ScorePoint {
                timestamp: t0 + Duration::days(2),
                score: 80.0,
            },
            ScorePoint {
                timestamp: t0,
                score: 50.0,
            },
            ScorePoint {
                timestamp: t0 + Duration::days(1),
                score: 60.0,
            },
        ];
        let report = compute_trends(&series, &b, 2.0);

        let scores: Vec<f64> = report.time_series.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![50.0, 60.0, 80.0]);
        assert_eq!(report.time_series[0].zone, Zone::Green);
        assert_eq!(report.time_series[1].zone, Zone::Yellow);
        assert_eq!(report.current_zone, Some(Zone::Red));

        assert_eq!(report.drift_alerts.len(), 1);
        let alert = &report.drift_alerts[0];
        assert_eq!(alert.score, 80.0);
        assert_eq!(alert.z_score, Some(3.0));
        assert_eq!(alert.deviation, 30.0);

        assert_eq!(report.trend.direction, TrendDirection::Increasing);
        assert!((report.trend.slope - 15.0).abs() < 1e-9);
        assert_eq!(report.trend.change, 30.0);
    }

    #[test]
    fn test_compute_trends_custom_threshold() {
        let b = baseline(50.0, 10.0);
        let t0 = Utc::now();
        let series = vec![ScorePoint {
            timestamp: t0,
            score: 65.0,
        }];
        assert!(compute_trends(&series, &b, 2.0).drift_alerts.is_empty());
        assert_eq!(compute_trends_with(&series, &b, 1.0, 0.5).drift_alerts.len(), 1);
    }

    #[test]
    fn test_trend_summary_directions() {
        assert_eq!(
            TrendSummary::from_scores(&[40.0], 0.5).direction,
            TrendDirection::InsufficientData
        );
        assert_eq!(
            TrendSummary::from_scores(&[40.0, 40.2, 40.1], 0.5).direction,
            TrendDirection::Stable
        );
        assert_eq!(
            TrendSummary::from_scores(&[60.0, 50.0, 40.0], 0.5).direction,
            TrendDirection::Decreasing
        );
    }
}
