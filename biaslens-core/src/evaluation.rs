//! Evaluation lifecycle orchestration.
//!
//! [`EvaluationService`] drives `pending -> running -> {completed, failed}` over
//! an [`EvaluationStore`], serializing execution per evaluation id through an
//! [`ExecutionGuard`] and memoizing recommendations in a [`RecommendationCache`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::analyzer::{self, DEFAULT_STABLE_SLOPE, TrendReport};
use crate::cache::RecommendationCache;
use crate::detector::Detector;
use crate::error::{BiasLensError, ErrorKind, Result, StateError, ValidationError};
use crate::recommender::Recommender;
use crate::report::{EvaluationExport, ExecutiveSummary};
use crate::store::EvaluationStore;
use crate::types::{
    Baseline, BiasType, Evaluation, EvaluationStatus, Finding, Recommendation,
    RecommendationMode, ScorePoint, Zone, ZoneThresholds,
};

/// Set of evaluation ids currently being executed.
#[derive(Debug, Default)]
pub struct ExecutionGuard {
    in_flight: Mutex<HashSet<Uuid>>,
}

/// Held while an evaluation executes; releases the id on drop.
#[derive(Debug)]
pub struct ExecutionPermit<'a> {
    guard: &'a ExecutionGuard,
    id: Uuid,
}

impl ExecutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or fail with `AlreadyRunning` if another caller holds it.
    pub fn acquire(&self, id: Uuid) -> std::result::Result<ExecutionPermit<'_>, StateError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(id) {
            return Err(StateError::AlreadyRunning { id });
        }
        Ok(ExecutionPermit { guard: self, id })
    }

    pub fn is_running(&self, id: Uuid) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }
}

impl ExecutionPermit<'_> {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for ExecutionPermit<'_> {
    fn drop(&mut self) {
        self.guard
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// A completed evaluation together with the findings it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub evaluation: Evaluation,
    pub findings: Vec<Finding>,
}

/// Orchestrates detection, analysis and recommendation over a store.
pub struct EvaluationService {
    store: Arc<dyn EvaluationStore>,
    detector: Detector,
    recommender: Recommender,
    cache: RecommendationCache,
    guard: ExecutionGuard,
    stable_slope: f64,
}

impl EvaluationService {
    pub fn new(store: Arc<dyn EvaluationStore>) -> Self {
        Self {
            store,
            detector: Detector::new(),
            recommender: Recommender::new(),
            cache: RecommendationCache::new(),
            guard: ExecutionGuard::new(),
            stable_slope: DEFAULT_STABLE_SLOPE,
        }
    }

    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_recommender(mut self, recommender: Recommender) -> Self {
        self.recommender = recommender;
        self
    }

    /// Slope band under which trends report as stable.
    pub fn with_stable_slope(mut self, stable_slope: f64) -> Self {
        self.stable_slope = stable_slope;
        self
    }

    pub fn store(&self) -> &dyn EvaluationStore {
        self.store.as_ref()
    }

    pub fn cache(&self) -> &RecommendationCache {
        &self.cache
    }

    pub fn guard(&self) -> &ExecutionGuard {
        &self.guard
    }

    /// Validate and persist a new `pending` evaluation.
    pub fn create_evaluation(
        &self,
        target_system: &str,
        bias_types: &[BiasType],
        iteration_count: u32,
    ) -> Result<Evaluation> {
        let evaluation = Evaluation::new(target_system, bias_types, iteration_count)?;
        self.store.save_evaluation(&evaluation)?;
        tracing::info!(
            evaluation_id = %evaluation.id,
            target = %evaluation.target_system,
            bias_types = evaluation.bias_types.len(),
            iteration_count,
            "Evaluation created"
        );
        Ok(evaluation)
    }

    /// Run a pending evaluation to completion.
    ///
    /// Only one caller may execute a given id at a time; others get
    /// `AlreadyRunning`. Cancellation is checked before each bias type. Any
    /// failure after the evaluation enters `running` leaves it `failed` with
    /// the error recorded.
    pub fn execute(
        &self,
        id: Uuid,
        baseline: &Baseline,
        rng: &mut dyn RngCore,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome> {
        let _permit = self.guard.acquire(id)?;

        let mut evaluation = self.store.get_evaluation(id)?;
        if evaluation.status != EvaluationStatus::Pending {
            return Err(StateError::NotPending {
                id,
                status: evaluation.status,
            }
            .into());
        }
        evaluation.transition(EvaluationStatus::Running)?;
        self.store.save_evaluation(&evaluation)?;
        tracing::info!(evaluation_id = %id, baseline = %baseline.name, "Evaluation running");

        let result = self
            .run_pipeline(&evaluation, baseline, rng, cancel)
            .and_then(|run| self.persist_completion(&evaluation, baseline, run));

        match result {
            Ok(outcome) => {
                self.cache.invalidate(id);
                tracing::info!(
                    evaluation_id = %id,
                    overall_score = outcome.evaluation.overall_score,
                    zone = ?outcome.evaluation.zone_status,
                    findings = outcome.findings.len(),
                    "Evaluation completed"
                );
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(evaluation_id = %id, error = %err, "Evaluation failed");
                evaluation.failure_reason = Some(err.to_string());
                evaluation.transition(EvaluationStatus::Failed)?;
                if let Err(save_err) = self.store.save_evaluation(&evaluation) {
                    tracing::warn!(
                        evaluation_id = %id,
                        error = %save_err,
                        "Could not record evaluation failure"
                    );
                }
                Err(err)
            }
        }
    }

    /// Write findings, then the completed record. A failed record write
    /// removes the findings again so no reader sees them without a result.
    fn persist_completion(
        &self,
        running: &Evaluation,
        baseline: &Baseline,
        (findings, overall_score, zone): (Vec<Finding>, f64, Zone),
    ) -> Result<ExecutionOutcome> {
        let mut evaluation = running.clone();
        evaluation.overall_score = Some(overall_score);
        evaluation.zone_status = Some(zone);
        evaluation.baseline_name = Some(baseline.name.clone());
        evaluation.transition(EvaluationStatus::Completed)?;

        self.store.save_findings(evaluation.id, &findings)?;
        if let Err(err) = self.store.save_evaluation(&evaluation) {
            if let Err(cleanup_err) = self.store.save_findings(evaluation.id, &[]) {
                tracing::warn!(
                    evaluation_id = %evaluation.id,
                    error = %cleanup_err,
                    "Could not discard findings of unrecorded completion"
                );
            }
            return Err(err);
        }
        Ok(ExecutionOutcome {
            evaluation,
            findings,
        })
    }

    fn run_pipeline(
        &self,
        evaluation: &Evaluation,
        baseline: &Baseline,
        rng: &mut dyn RngCore,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Finding>, f64, Zone)> {
        let mut findings = Vec::with_capacity(evaluation.bias_types.len());
        for bias_type in &evaluation.bias_types {
            if cancel.is_cancelled() {
                return Err(BiasLensError::Cancelled { id: evaluation.id });
            }
            let finding = self
                .detector
                .detect(*bias_type, evaluation.iteration_count, rng)?
                .with_evaluation(evaluation.id);
            findings.push(finding);
        }
        let overall_score = analyzer::compute_overall_score(&findings)?;
        let zone = analyzer::classify_zone(overall_score, baseline);
        Ok((findings, overall_score, zone))
    }

    /// Build and persist a baseline over distinct completed evaluations.
    ///
    /// Baselines are immutable: an existing name yields `AlreadyExists`.
    pub fn create_baseline(
        &self,
        name: &str,
        evaluation_ids: &[Uuid],
        overrides: ZoneThresholds,
    ) -> Result<Baseline> {
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidBaselineName {
                reason: "name must not be empty".into(),
            }
            .into());
        }
        let mut seen = HashSet::with_capacity(evaluation_ids.len());
        if let Some(dup) = evaluation_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(ValidationError::DuplicateEvaluation { id: *dup }.into());
        }
        let evaluations = evaluation_ids
            .iter()
            .map(|id| self.store.get_evaluation(*id))
            .collect::<Result<Vec<_>>>()?;
        let baseline = analyzer::create_baseline(name, &evaluations, overrides)?;
        self.store.insert_baseline(&baseline)?;
        tracing::info!(
            baseline = %baseline.name,
            mean = baseline.mean,
            std_dev = baseline.std_dev,
            sample_size = baseline.sample_size,
            "Baseline created"
        );
        Ok(baseline)
    }

    /// Chronological (completion time, score) series of a target's completed evaluations.
    pub fn score_series(&self, target_system: &str) -> Result<Vec<ScorePoint>> {
        let mut series: Vec<ScorePoint> = self
            .store
            .list_evaluations()?
            .into_iter()
            .filter(|e| e.target_system == target_system && e.is_completed())
            .filter_map(|e| {
                e.overall_score.map(|score| ScorePoint {
                    timestamp: e.completed_at.unwrap_or(e.created_at),
                    score,
                })
            })
            .collect();
        series.sort_by_key(|p| p.timestamp);
        Ok(series)
    }

    /// Trend and drift report for a target against `baseline`.
    pub fn trends(
        &self,
        target_system: &str,
        baseline: &Baseline,
        drift_threshold: f64,
    ) -> Result<TrendReport> {
        let series = self.score_series(target_system)?;
        Ok(analyzer::compute_trends_with(
            &series,
            baseline,
            drift_threshold,
            self.stable_slope,
        ))
    }

    fn completed_evaluation(&self, id: Uuid) -> Result<Evaluation> {
        let evaluation = self.store.get_evaluation(id)?;
        if !evaluation.is_completed() {
            return Err(StateError::NotCompleted {
                id,
                status: evaluation.status,
            }
            .into());
        }
        Ok(evaluation)
    }

    /// Ranked recommendations for a completed evaluation, memoized by `(id, mode)`.
    pub fn recommendations(
        &self,
        id: Uuid,
        mode: RecommendationMode,
    ) -> Result<Arc<Vec<Recommendation>>> {
        self.completed_evaluation(id)?;
        self.cache.get_or_try_insert(id, mode, || {
            let findings = self.store.get_findings(id)?;
            self.recommender.generate(&findings, mode)
        })
    }

    /// Executive summary of a completed evaluation.
    pub fn summary(&self, id: Uuid) -> Result<ExecutiveSummary> {
        let evaluation = self.completed_evaluation(id)?;
        let findings = self.store.get_findings(id)?;
        Ok(ExecutiveSummary::build(&evaluation, &findings))
    }

    /// Snapshot an evaluation with its findings and recommendations.
    ///
    /// Evaluations that are not completed export without recommendations.
    pub fn export(&self, id: Uuid, mode: RecommendationMode) -> Result<EvaluationExport> {
        let evaluation = self.store.get_evaluation(id)?;
        let findings = self.store.get_findings(id)?;
        let recommendations = if evaluation.is_completed() && !findings.is_empty() {
            self.recommendations(id, mode)?.as_ref().clone()
        } else {
            Vec::new()
        };
        Ok(EvaluationExport::new(evaluation, findings, recommendations))
    }

    /// Persist an exported evaluation and its findings.
    ///
    /// Only ids unknown to the store are accepted; stored evaluations and
    /// their findings are never replaced. Recommendations in the export are
    /// not stored; they are regenerated on demand from the findings.
    pub fn import(&self, export: &EvaluationExport) -> Result<Evaluation> {
        let evaluation = &export.evaluation;
        if let Some(stray) = export
            .findings
            .iter()
            .find(|f| f.evaluation_id.is_some_and(|owner| owner != evaluation.id))
        {
            return Err(ValidationError::ForeignFinding {
                finding: stray.id,
                evaluation: evaluation.id,
            }
            .into());
        }

        let _permit = self.guard.acquire(evaluation.id)?;
        match self.store.get_evaluation(evaluation.id) {
            Ok(_) => {
                return Err(StateError::AlreadyExists {
                    what: "evaluation",
                    id: evaluation.id.to_string(),
                }
                .into());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        self.store.save_findings(evaluation.id, &export.findings)?;
        self.store.save_evaluation(evaluation)?;
        self.cache.invalidate(evaluation.id);
        tracing::info!(
            evaluation_id = %evaluation.id,
            findings = export.findings.len(),
            "Evaluation imported"
        );
        Ok(evaluation.clone())
    }

    /// Remove an evaluation and its findings. Refused while it is executing.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let _permit = self.guard.acquire(id)?;
        self.store.delete_evaluation(id)?;
        self.cache.invalidate(id);
        tracing::info!(evaluation_id = %id, "Evaluation deleted");
        Ok(())
    }

    /// Findings of an evaluation, highest severity first.
    pub fn findings(&self, id: Uuid) -> Result<Vec<Finding>> {
        self.store.get_evaluation(id)?;
        let mut findings = self.store.get_findings(id)?;
        findings.sort_by(|a, b| b.severity_score.total_cmp(&a.severity_score));
        Ok(findings)
    }

    /// The finding for one bias type of an evaluation.
    pub fn finding(&self, id: Uuid, bias_type: BiasType) -> Result<Finding> {
        self.findings(id)?
            .into_iter()
            .find(|f| f.bias_type == bias_type)
            .ok_or_else(|| BiasLensError::not_found("finding", format!("{id}/{bias_type}")))
    }

    /// One page of evaluations, newest first, optionally for a single target.
    pub fn list(&self, target_system: Option<&str>, page: Page) -> Result<EvaluationPage> {
        page.validate()?;
        let mut all: Vec<Evaluation> = self
            .store
            .list_evaluations()?
            .into_iter()
            .filter(|e| target_system.is_none_or(|t| e.target_system == t))
            .collect();
        all.reverse();
        let total = all.len();
        let evaluations = all.into_iter().skip(page.offset).take(page.limit).collect();
        Ok(EvaluationPage {
            evaluations,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }
}

/// Largest page `list` hands out.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Pagination window for [`EvaluationService::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
        }
    }
}

impl Page {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            return Err(ValidationError::PageLimitOutOfRange {
                value: self.limit,
                max: MAX_PAGE_LIMIT,
            });
        }
        Ok(())
    }
}

/// One page of evaluations plus the unpaginated total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationPage {
    pub evaluations: Vec<Evaluation>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}
