//! Evaluation exports and executive summaries.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{BiasType, Evaluation, Finding, Recommendation, SeverityBucket, Zone};

/// Version stamped on every export.
pub const FORMAT_VERSION: &str = "1.0.0";

/// Aggregate statistics over an evaluation's findings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_findings: usize,
    pub severity_breakdown: BTreeMap<SeverityBucket, usize>,
    pub critical_count: usize,
    pub high_count: usize,
    pub average_severity: f64,
    pub average_confidence: f64,
}

impl SummaryStats {
    pub fn from_findings(findings: &[Finding]) -> Self {
        if findings.is_empty() {
            return Self::default();
        }
        let mut severity_breakdown = BTreeMap::new();
        for finding in findings {
            *severity_breakdown.entry(finding.severity).or_insert(0) += 1;
        }
        let n = findings.len() as f64;
        Self {
            total_findings: findings.len(),
            critical_count: severity_breakdown
                .get(&SeverityBucket::Critical)
                .copied()
                .unwrap_or(0),
            high_count: severity_breakdown
                .get(&SeverityBucket::High)
                .copied()
                .unwrap_or(0),
            severity_breakdown,
            average_severity: findings.iter().map(|f| f.severity_score).sum::<f64>() / n,
            average_confidence: findings.iter().map(|f| f.confidence_level).sum::<f64>() / n,
        }
    }
}

/// Self-contained snapshot of one evaluation, suitable for re-import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationExport {
    pub format_version: String,
    pub generated_at: DateTime<Utc>,
    pub evaluation: Evaluation,
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    pub summary: SummaryStats,
}

impl EvaluationExport {
    pub fn new(
        evaluation: Evaluation,
        findings: Vec<Finding>,
        recommendations: Vec<Recommendation>,
    ) -> Self {
        let summary = SummaryStats::from_findings(&findings);
        Self {
            format_version: FORMAT_VERSION.to_string(),
            generated_at: Utc::now(),
            evaluation,
            findings,
            recommendations,
            summary,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Evaluation header of an executive summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub target_system: String,
    pub evaluation_id: Uuid,
    pub evaluation_date: Option<DateTime<Utc>>,
    pub overall_score: Option<f64>,
    pub zone_status: Option<Zone>,
    pub total_iterations: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFindings {
    pub total_detected: usize,
    pub severity_breakdown: BTreeMap<SeverityBucket, usize>,
    pub critical_issues: usize,
    pub high_priority_issues: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concern {
    pub bias_type: BiasType,
    pub severity: SeverityBucket,
    pub severity_score: f64,
    pub detection_count: u32,
    pub pattern_description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Unknown,
}

impl RiskLevel {
    pub fn from_zone(zone: Option<Zone>) -> Self {
        match zone {
            Some(Zone::Green) => RiskLevel::Low,
            Some(Zone::Yellow) => RiskLevel::Moderate,
            Some(Zone::Red) => RiskLevel::High,
            None => RiskLevel::Unknown,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Moderate => write!(f, "MODERATE"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub assessment: String,
    /// Up to three high or critical patterns.
    pub key_concerns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionPriority {
    Urgent,
    High,
    Medium,
    Low,
    Info,
}

impl fmt::Display for ActionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionPriority::Urgent => write!(f, "URGENT"),
            ActionPriority::High => write!(f, "HIGH"),
            ActionPriority::Medium => write!(f, "MEDIUM"),
            ActionPriority::Low => write!(f, "LOW"),
            ActionPriority::Info => write!(f, "INFO"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighLevelRecommendation {
    pub priority: ActionPriority,
    pub recommendation: String,
}

/// Management-level digest of a completed evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub generated_at: DateTime<Utc>,
    pub overview: Overview,
    pub key_findings: KeyFindings,
    pub top_concerns: Vec<Concern>,
    pub risk_assessment: RiskAssessment,
    pub recommendations: Vec<HighLevelRecommendation>,
}

const TOP_CONCERNS: usize = 3;

impl ExecutiveSummary {
    pub fn build(evaluation: &Evaluation, findings: &[Finding]) -> Self {
        let stats = SummaryStats::from_findings(findings);

        let mut by_severity: Vec<&Finding> = findings.iter().collect();
        by_severity.sort_by(|a, b| b.severity_score.total_cmp(&a.severity_score));

        let top_concerns = by_severity
            .iter()
            .take(TOP_CONCERNS)
            .map(|f| Concern {
                bias_type: f.bias_type,
                severity: f.severity,
                severity_score: f.severity_score,
                detection_count: f.detection_count,
                pattern_description: f.pattern_description.clone(),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            overview: Overview {
                target_system: evaluation.target_system.clone(),
                evaluation_id: evaluation.id,
                evaluation_date: evaluation.completed_at,
                overall_score: evaluation.overall_score,
                zone_status: evaluation.zone_status,
                total_iterations: evaluation.iteration_count,
            },
            key_findings: KeyFindings {
                total_detected: stats.total_findings,
                severity_breakdown: stats.severity_breakdown.clone(),
                critical_issues: stats.critical_count,
                high_priority_issues: stats.high_count,
            },
            top_concerns,
            risk_assessment: risk_assessment(evaluation, findings),
            recommendations: high_level_recommendations(findings, &stats),
        }
    }
}

/// Plain-text rendering for terminals.
impl fmt::Display for ExecutiveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.overview;
        writeln!(f, "Bias evaluation summary: {}", o.target_system)?;
        writeln!(f, "  Evaluation:  {}", o.evaluation_id)?;
        if let Some(date) = o.evaluation_date {
            writeln!(f, "  Completed:   {}", date.format("%Y-%m-%d %H:%M:%S"))?;
        }
        match o.overall_score {
            Some(score) => writeln!(f, "  Score:       {score:.2}")?,
            None => writeln!(f, "  Score:       N/A")?,
        }
        if let Some(zone) = o.zone_status {
            writeln!(f, "  Zone:        {zone}")?;
        }
        writeln!(f, "  Iterations:  {}", o.total_iterations)?;

        writeln!(
            f,
            "\nRisk: {} - {}",
            self.risk_assessment.risk_level, self.risk_assessment.assessment
        )?;
        for concern in &self.risk_assessment.key_concerns {
            writeln!(f, "  * {concern}")?;
        }

        if !self.top_concerns.is_empty() {
            writeln!(f, "\nTop concerns:")?;
            for (i, c) in self.top_concerns.iter().enumerate() {
                writeln!(
                    f,
                    "  {}. {} [{}] {:.2}/100 - {}",
                    i + 1,
                    c.bias_type.label(),
                    c.severity,
                    c.severity_score,
                    c.pattern_description
                )?;
            }
        }

        writeln!(f, "\nRecommendations:")?;
        for rec in &self.recommendations {
            writeln!(f, "  [{}] {}", rec.priority, rec.recommendation)?;
        }
        Ok(())
    }
}

fn risk_assessment(evaluation: &Evaluation, findings: &[Finding]) -> RiskAssessment {
    let risk_level = RiskLevel::from_zone(evaluation.zone_status);
    let score = evaluation.overall_score.unwrap_or(0.0);
    let assessment = match risk_level {
        RiskLevel::Low => format!(
            "The AI system shows minimal bias patterns with an overall score of {score:.2}. \
             The system is operating within acceptable parameters."
        ),
        RiskLevel::Moderate => format!(
            "The AI system shows concerning bias patterns with an overall score of {score:.2}. \
             Corrective measures are recommended."
        ),
        RiskLevel::High => format!(
            "The AI system shows critical bias patterns with an overall score of {score:.2}. \
             Urgent intervention is required."
        ),
        RiskLevel::Unknown => {
            return RiskAssessment {
                risk_level,
                assessment: "Evaluation not completed".to_string(),
                key_concerns: Vec::new(),
            };
        }
    };

    let key_concerns = findings
        .iter()
        .filter(|f| f.severity >= SeverityBucket::High)
        .take(TOP_CONCERNS)
        .map(|f| format!("{}: {}", f.bias_type.label(), f.pattern_description))
        .collect();

    RiskAssessment {
        risk_level,
        assessment,
        key_concerns,
    }
}

fn high_level_recommendations(
    findings: &[Finding],
    stats: &SummaryStats,
) -> Vec<HighLevelRecommendation> {
    if findings.is_empty() {
        return vec![HighLevelRecommendation {
            priority: ActionPriority::Info,
            recommendation: "Continue monitoring the AI system for potential bias patterns."
                .to_string(),
        }];
    }

    let mut recs = Vec::new();
    if stats.critical_count > 0 {
        recs.push(HighLevelRecommendation {
            priority: ActionPriority::Urgent,
            recommendation: format!(
                "Address {} critical bias pattern(s) immediately. Consider suspending the AI system until they are resolved.",
                stats.critical_count
            ),
        });
    }
    if stats.high_count > 0 {
        recs.push(HighLevelRecommendation {
            priority: ActionPriority::High,
            recommendation: format!(
                "Investigate and remediate {} high-severity bias pattern(s) within the next review cycle.",
                stats.high_count
            ),
        });
    }

    let has = |bias: BiasType| findings.iter().any(|f| f.bias_type == bias);
    if has(BiasType::Anchoring) {
        recs.push(HighLevelRecommendation {
            priority: ActionPriority::Medium,
            recommendation: "Review training data for anchoring bias and consider reference point randomization."
                .to_string(),
        });
    }
    if has(BiasType::ConfirmationBias) {
        recs.push(HighLevelRecommendation {
            priority: ActionPriority::Medium,
            recommendation: "Add adversarial testing that challenges confirmation bias patterns."
                .to_string(),
        });
    }

    if recs.is_empty() {
        recs.push(HighLevelRecommendation {
            priority: ActionPriority::Low,
            recommendation: "Maintain current monitoring and run regular bias assessments."
                .to_string(),
        });
    }
    recs
}
