//! Fundamental types for the BiasLens pipeline: bias taxonomy, severity and
//! zone scales, and the Evaluation / Finding / Baseline / Recommendation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{StateError, ValidationError};

/// Smallest number of probe trials per bias type.
pub const MIN_ITERATIONS: u32 = 10;
/// Largest number of probe trials per bias type.
pub const MAX_ITERATIONS: u32 = 100;
/// Upper bound for any confidence level.
pub const MAX_CONFIDENCE: f64 = 0.99;
/// Longest recommendation list the recommender will emit.
pub const MAX_RECOMMENDATIONS: usize = 7;
/// Longest accepted target system name.
pub const MAX_TARGET_LEN: usize = 200;

/// Check that an iteration count lies in `MIN_ITERATIONS..=MAX_ITERATIONS`.
pub fn validate_iteration_count(iteration_count: u32) -> Result<(), ValidationError> {
    if (MIN_ITERATIONS..=MAX_ITERATIONS).contains(&iteration_count) {
        Ok(())
    } else {
        Err(ValidationError::IterationCountOutOfRange {
            value: iteration_count,
            min: MIN_ITERATIONS,
            max: MAX_ITERATIONS,
        })
    }
}

/// The cognitive-bias categories a probe battery tests for.
///
/// Variant order is the canonical order used for tie-breaking and listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasType {
    /// Over-weighting the first piece of information seen.
    Anchoring,
    /// Losses weighted more heavily than equivalent gains.
    LossAversion,
    /// Past, unrecoverable investment influencing forward decisions.
    SunkCost,
    /// Dismissing evidence that contradicts an initial position.
    ConfirmationBias,
    /// Probability estimates skewed by recent or memorable examples.
    AvailabilityHeuristic,
}

impl BiasType {
    pub const ALL: [BiasType; 5] = [
        BiasType::Anchoring,
        BiasType::LossAversion,
        BiasType::SunkCost,
        BiasType::ConfirmationBias,
        BiasType::AvailabilityHeuristic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BiasType::Anchoring => "anchoring",
            BiasType::LossAversion => "loss_aversion",
            BiasType::SunkCost => "sunk_cost",
            BiasType::ConfirmationBias => "confirmation_bias",
            BiasType::AvailabilityHeuristic => "availability_heuristic",
        }
    }

    /// Human-readable title, e.g. "Loss Aversion".
    pub fn label(&self) -> &'static str {
        match self {
            BiasType::Anchoring => "Anchoring",
            BiasType::LossAversion => "Loss Aversion",
            BiasType::SunkCost => "Sunk Cost",
            BiasType::ConfirmationBias => "Confirmation Bias",
            BiasType::AvailabilityHeuristic => "Availability Heuristic",
        }
    }
}

impl fmt::Display for BiasType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BiasType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        BiasType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownBiasType { name: s.to_string() })
    }
}

/// Qualitative label derived from a 0-100 severity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityBucket {
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityBucket {
    pub const ALL: [SeverityBucket; 4] = [
        SeverityBucket::Low,
        SeverityBucket::Medium,
        SeverityBucket::High,
        SeverityBucket::Critical,
    ];

    /// Step function with lower-inclusive boundaries at 25, 50 and 75.
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            SeverityBucket::Critical
        } else if score >= 50.0 {
            SeverityBucket::High
        } else if score >= 25.0 {
            SeverityBucket::Medium
        } else {
            SeverityBucket::Low
        }
    }

    /// Aggregation weight: worse buckets dominate the overall score.
    pub fn weight(&self) -> f64 {
        match self {
            SeverityBucket::Low => 1.0,
            SeverityBucket::Medium => 2.0,
            SeverityBucket::High => 3.0,
            SeverityBucket::Critical => 4.0,
        }
    }
}

impl fmt::Display for SeverityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityBucket::Low => write!(f, "low"),
            SeverityBucket::Medium => write!(f, "medium"),
            SeverityBucket::High => write!(f, "high"),
            SeverityBucket::Critical => write!(f, "critical"),
        }
    }
}

/// Classification of an overall score relative to a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Green => write!(f, "green"),
            Zone::Yellow => write!(f, "yellow"),
            Zone::Red => write!(f, "red"),
        }
    }
}

/// Lifecycle status of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl EvaluationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EvaluationStatus::Completed | EvaluationStatus::Failed)
    }

    /// `pending -> running -> {completed, failed}`; nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: EvaluationStatus) -> bool {
        matches!(
            (self, next),
            (EvaluationStatus::Pending, EvaluationStatus::Running)
                | (EvaluationStatus::Running, EvaluationStatus::Completed)
                | (EvaluationStatus::Running, EvaluationStatus::Failed)
        )
    }
}

impl fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationStatus::Pending => write!(f, "pending"),
            EvaluationStatus::Running => write!(f, "running"),
            EvaluationStatus::Completed => write!(f, "completed"),
            EvaluationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One diagnostic run against a target AI system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub target_system: String,
    pub bias_types: Vec<BiasType>,
    pub iteration_count: u32,
    pub status: EvaluationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub zone_status: Option<Zone>,
    /// Name of the baseline the zone was classified against.
    #[serde(default)]
    pub baseline_name: Option<String>,
    /// Error recorded when the evaluation moved to `failed`.
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl Evaluation {
    /// Create a validated `pending` evaluation.
    ///
    /// Duplicate bias types are dropped, keeping first-seen order.
    pub fn new(
        target_system: impl Into<String>,
        bias_types: &[BiasType],
        iteration_count: u32,
    ) -> Result<Self, ValidationError> {
        let target_system = target_system.into();
        let trimmed = target_system.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidTarget {
                reason: "name must not be empty".into(),
            });
        }
        if trimmed.chars().count() > MAX_TARGET_LEN {
            return Err(ValidationError::InvalidTarget {
                reason: format!("name exceeds {MAX_TARGET_LEN} characters"),
            });
        }

        let mut unique: Vec<BiasType> = Vec::with_capacity(bias_types.len());
        for bias in bias_types {
            if !unique.contains(bias) {
                unique.push(*bias);
            }
        }
        if unique.is_empty() {
            return Err(ValidationError::NoBiasTypes);
        }
        if unique.len() > BiasType::ALL.len() {
            return Err(ValidationError::TooManyBiasTypes {
                count: unique.len(),
                max: BiasType::ALL.len(),
            });
        }
        validate_iteration_count(iteration_count)?;

        Ok(Self {
            id: Uuid::new_v4(),
            target_system: trimmed.to_string(),
            bias_types: unique,
            iteration_count,
            status: EvaluationStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            overall_score: None,
            zone_status: None,
            baseline_name: None,
            failure_reason: None,
        })
    }

    /// Move to `next`, stamping `completed_at` when a terminal state is reached.
    pub fn transition(&mut self, next: EvaluationStatus) -> Result<(), StateError> {
        if !self.status.can_transition_to(next) {
            return Err(StateError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == EvaluationStatus::Completed
    }
}

/// Result of one bias-type probe battery. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    #[serde(default)]
    pub evaluation_id: Option<Uuid>,
    pub bias_type: BiasType,
    pub severity_score: f64,
    pub severity: SeverityBucket,
    pub confidence_level: f64,
    pub detection_count: u32,
    pub iteration_count: u32,
    pub detection_proportion: f64,
    pub example_instances: Vec<String>,
    pub pattern_description: String,
}

impl Finding {
    /// Attach this finding to its owning evaluation.
    pub fn with_evaluation(mut self, evaluation_id: Uuid) -> Self {
        self.evaluation_id = Some(evaluation_id);
        self
    }
}

/// Optional explicit zone thresholds replacing the mean/σ derived ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneThresholds {
    #[serde(default)]
    pub green_zone_max: Option<f64>,
    #[serde(default)]
    pub yellow_zone_max: Option<f64>,
}

impl ZoneThresholds {
    pub fn is_empty(&self) -> bool {
        self.green_zone_max.is_none() && self.yellow_zone_max.is_none()
    }
}

/// Mean / standard-deviation summary of reference overall scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub id: Uuid,
    pub name: String,
    pub mean: f64,
    pub std_dev: f64,
    pub sample_size: usize,
    pub green_zone_max: f64,
    pub yellow_zone_max: f64,
    pub created_at: DateTime<Utc>,
}

impl Baseline {
    /// Zero variance with thresholds still sitting on the mean.
    pub fn is_degenerate(&self) -> bool {
        crate::stats::is_zero_spread(self.std_dev, self.mean)
            && crate::stats::approx_eq(self.green_zone_max, self.mean)
            && crate::stats::approx_eq(self.yellow_zone_max, self.mean)
    }
}

/// Expected payoff of a remediation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Impact::Low => write!(f, "low"),
            Impact::Medium => write!(f, "medium"),
            Impact::High => write!(f, "high"),
        }
    }
}

/// Effort needed to put a remediation action in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Moderate,
    Complex,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Moderate => write!(f, "moderate"),
            Difficulty::Complex => write!(f, "complex"),
        }
    }
}

/// Which description fields a recommendation carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationMode {
    Technical,
    Simplified,
    #[default]
    Both,
}

impl RecommendationMode {
    pub fn includes_technical(&self) -> bool {
        matches!(self, RecommendationMode::Technical | RecommendationMode::Both)
    }

    pub fn includes_simplified(&self) -> bool {
        matches!(self, RecommendationMode::Simplified | RecommendationMode::Both)
    }
}

impl fmt::Display for RecommendationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationMode::Technical => write!(f, "technical"),
            RecommendationMode::Simplified => write!(f, "simplified"),
            RecommendationMode::Both => write!(f, "both"),
        }
    }
}

impl FromStr for RecommendationMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "technical" => Ok(RecommendationMode::Technical),
            "simplified" => Ok(RecommendationMode::Simplified),
            "both" => Ok(RecommendationMode::Both),
            _ => Err(ValidationError::InvalidMode { mode: s.to_string() }),
        }
    }
}

/// A ranked remediation action derived from findings. Never a source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub evaluation_id: Option<Uuid>,
    pub bias_type: BiasType,
    pub priority: f64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simplified_description: Option<String>,
    pub estimated_impact: Impact,
    pub implementation_difficulty: Difficulty,
}

/// One (timestamp, overall score) observation for longitudinal analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorePoint {
    pub timestamp: DateTime<Utc>,
    pub score: f64,
}
