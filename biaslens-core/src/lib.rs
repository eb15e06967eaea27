//! # BiasLens Core
//!
//! Core library for BiasLens, a cognitive-bias diagnostics pipeline for AI systems.
//! Provides the probe detector, the baseline/zone analyzer, the remediation
//! recommender, the evaluation lifecycle, persistence, reports and configuration.

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod detector;
pub mod error;
pub mod evaluation;
pub mod persistence;
pub mod recommender;
pub mod report;
pub mod stats;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root.
pub use analyzer::{
    DriftAlert, DriftCheck, TrendDirection, TrendReport, TrendSummary, classify_zone,
    compute_overall_score, compute_trends, create_baseline, detect_drift,
};
pub use cache::{CacheMetrics, RecommendationCache};
pub use config::{BiasLensConfig, load_config};
pub use detector::{Detector, ProbeStrategy, TrialOutcome};
pub use error::{BiasLensError, ErrorKind, Result};
pub use evaluation::{EvaluationPage, EvaluationService, ExecutionGuard, ExecutionOutcome, Page};
pub use recommender::Recommender;
pub use report::{EvaluationExport, ExecutiveSummary, SummaryStats};
pub use store::{EvaluationStore, InMemoryStore, JsonFileStore};
pub use types::{
    Baseline, BiasType, Difficulty, Evaluation, EvaluationStatus, Finding, Impact,
    Recommendation, RecommendationMode, ScorePoint, SeverityBucket, Zone, ZoneThresholds,
};
