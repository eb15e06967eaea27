//! Recommendation prioritization engine.
//!
//! Each finding is looked up in the [`knowledge`] base by bias type and
//! severity bucket; every matching action is scored and the best
//! [`MAX_RECOMMENDATIONS`] survive.

pub mod knowledge;

use std::cmp::Ordering;

use crate::error::{InsufficientDataError, Result};
use crate::types::{Finding, MAX_RECOMMENDATIONS, Recommendation, RecommendationMode};

pub use knowledge::{ACTIONS, ActionTemplate, actions_for};

/// Priority of one action for one finding, in `0..=10`.
///
/// Severity contributes up to 6 points, confidence up to ~3 and the action's
/// base weight up to 1.
pub fn priority(severity_score: f64, confidence_level: f64, base_priority: u8) -> f64 {
    let weighted = severity_score * 0.6 + confidence_level * 30.0;
    (weighted / 10.0 + f64::from(base_priority) * 0.1).clamp(0.0, 10.0)
}

struct Candidate<'a> {
    finding: &'a Finding,
    action: &'static ActionTemplate,
    priority: f64,
}

impl Candidate<'_> {
    fn rank(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| {
                other
                    .finding
                    .severity_score
                    .total_cmp(&self.finding.severity_score)
            })
            .then_with(|| self.finding.bias_type.cmp(&other.finding.bias_type))
            .then_with(|| other.action.base_priority.cmp(&self.action.base_priority))
            .then_with(|| self.action.title.cmp(other.action.title))
    }

    fn into_recommendation(self, mode: RecommendationMode) -> Recommendation {
        Recommendation {
            evaluation_id: self.finding.evaluation_id,
            bias_type: self.finding.bias_type,
            priority: self.priority,
            title: self.action.title.to_string(),
            technical_description: mode
                .includes_technical()
                .then(|| self.action.technical.to_string()),
            simplified_description: mode
                .includes_simplified()
                .then(|| self.action.simplified.to_string()),
            estimated_impact: self.action.impact,
            implementation_difficulty: self.action.difficulty,
        }
    }
}

/// Maps findings to a ranked, truncated list of remediation actions.
#[derive(Debug, Clone)]
pub struct Recommender {
    max_recommendations: usize,
}

impl Default for Recommender {
    fn default() -> Self {
        Self::new()
    }
}

impl Recommender {
    pub fn new() -> Self {
        Self {
            max_recommendations: MAX_RECOMMENDATIONS,
        }
    }

    /// Emit at most `max` recommendations. Values above
    /// [`MAX_RECOMMENDATIONS`] are capped.
    pub fn with_max_recommendations(max: usize) -> Self {
        Self {
            max_recommendations: max.min(MAX_RECOMMENDATIONS),
        }
    }

    pub fn max_recommendations(&self) -> usize {
        self.max_recommendations
    }

    /// Rank every applicable action for `findings` by descending priority.
    ///
    /// Equal priorities fall back to the finding's severity (descending),
    /// bias-type order, the action's base priority (descending) and title.
    pub fn generate(
        &self,
        findings: &[Finding],
        mode: RecommendationMode,
    ) -> Result<Vec<Recommendation>> {
        if findings.is_empty() {
            return Err(InsufficientDataError::NoFindings.into());
        }

        let mut candidates: Vec<Candidate<'_>> = findings
            .iter()
            .flat_map(|finding| {
                actions_for(finding.bias_type, finding.severity).map(move |action| Candidate {
                    finding,
                    action,
                    priority: priority(
                        finding.severity_score,
                        finding.confidence_level,
                        action.base_priority,
                    ),
                })
            })
            .collect();
        candidates.sort_by(|a, b| a.rank(b));
        candidates.truncate(self.max_recommendations);

        tracing::debug!(
            findings = findings.len(),
            recommendations = candidates.len(),
            %mode,
            "Recommendations generated"
        );

        Ok(candidates
            .into_iter()
            .map(|c| c.into_recommendation(mode))
            .collect())
    }

    /// [`Recommender::generate`] with a mode parsed from text.
    pub fn generate_named(&self, findings: &[Finding], mode: &str) -> Result<Vec<Recommendation>> {
        let mode: RecommendationMode = mode.parse()?;
        self.generate(findings, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BiasLensError, ValidationError};
    use crate::types::{BiasType, SeverityBucket};
    use uuid::Uuid;

    fn finding(bias_type: BiasType, severity_score: f64, confidence_level: f64) -> Finding {
        Finding {
            id: Uuid::new_v4(),
            evaluation_id: Some(Uuid::nil()),
            bias_type,
            severity_score,
            severity: SeverityBucket::from_score(severity_score),
            confidence_level,
            detection_count: 30,
            iteration_count: 50,
            detection_proportion: 0.6,
            example_instances: Vec::new(),
            pattern_description: String::new(),
        }
    }

    #[test]
    fn test_priority_formula() {
        // (80*0.6 + 0.5*30)/10 + 9*0.1 = (48 + 15)/10 + 0.9 = 7.2
        assert!((priority(80.0, 0.5, 9) - 7.2).abs() < 1e-9);
        assert!(priority(100.0, 0.99, 10) <= 10.0);
        assert!(priority(0.0, 0.0, 1) > 0.0);
    }

    #[test]
    fn test_generate_empty() {
        let err = Recommender::new()
            .generate(&[], RecommendationMode::Both)
            .unwrap_err();
        assert!(matches!(
            err,
            BiasLensError::InsufficientData(InsufficientDataError::NoFindings)
        ));
    }

    #[test]
    fn test_generate_caps_and_orders() {
        let findings: Vec<Finding> = BiasType::ALL
            .iter()
            .map(|b| finding(*b, 90.0, 0.8))
            .collect();
        let recs = Recommender::new()
            .generate(&findings, RecommendationMode::Both)
            .unwrap();
        assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
        for pair in recs.windows(2) {
            assert!(pair[0].priority >= pair[1].priority);
        }
        assert!(recs.iter().all(|r| r.evaluation_id == Some(Uuid::nil())));
    }

    #[test]
    fn test_generate_tie_break_is_deterministic() {
        // Both top actions carry base priority 9, so the first two tie.
        let findings = vec![
            finding(BiasType::LossAversion, 60.0, 0.5),
            finding(BiasType::Anchoring, 60.0, 0.5),
        ];
        let recs = Recommender::new()
            .generate(&findings, RecommendationMode::Both)
            .unwrap();
        assert_eq!(recs[0].priority, recs[1].priority);
        assert_eq!(recs[0].bias_type, BiasType::Anchoring);
        assert_eq!(recs[0].title, "Implement multi-perspective prompting");
        assert_eq!(recs[1].bias_type, BiasType::LossAversion);
        let again = Recommender::new()
            .generate(&findings, RecommendationMode::Both)
            .unwrap();
        assert_eq!(recs, again);
    }

    #[test]
    fn test_higher_severity_ranks_first() {
        let findings = vec![
            finding(BiasType::Anchoring, 30.0, 0.3),
            finding(BiasType::ConfirmationBias, 85.0, 0.7),
        ];
        let recs = Recommender::new()
            .generate(&findings, RecommendationMode::Both)
            .unwrap();
        assert_eq!(recs[0].bias_type, BiasType::ConfirmationBias);
        // critical confirmation (3) + medium anchoring (2)
        assert_eq!(recs.len(), 5);
    }

    #[test]
    fn test_mode_controls_descriptions() {
        let findings = vec![finding(BiasType::LossAversion, 55.0, 0.4)];
        let recommender = Recommender::new();

        let technical = recommender
            .generate(&findings, RecommendationMode::Technical)
            .unwrap();
        assert!(technical.iter().all(|r| r.technical_description.is_some()
            && r.simplified_description.is_none()));

        let simplified = recommender
            .generate(&findings, RecommendationMode::Simplified)
            .unwrap();
        assert!(simplified.iter().all(|r| r.technical_description.is_none()
            && r.simplified_description.is_some()));

        let both = recommender.generate_named(&findings, "both").unwrap();
        assert!(both.iter().all(|r| r.technical_description.is_some()
            && r.simplified_description.is_some()));
    }

    #[test]
    fn test_generate_named_rejects_bad_mode() {
        let findings = vec![finding(BiasType::Anchoring, 50.0, 0.5)];
        let err = Recommender::new()
            .generate_named(&findings, "verbose")
            .unwrap_err();
        assert!(matches!(
            err,
            BiasLensError::Validation(ValidationError::InvalidMode { .. })
        ));
    }

    #[test]
    fn test_max_recommendations_capped() {
        assert_eq!(Recommender::with_max_recommendations(50).max_recommendations(), 7);
        let findings = vec![finding(BiasType::Anchoring, 90.0, 0.9)];
        let recs = Recommender::with_max_recommendations(2)
            .generate(&findings, RecommendationMode::Both)
            .unwrap();
        assert_eq!(recs.len(), 2);
    }
}
