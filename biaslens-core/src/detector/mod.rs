//! Per-probe detection and severity engine.
//!
//! A [`Detector`] holds one [`ProbeStrategy`] per bias type. The default table
//! is filled with [`SimulatedProbe`]s; a real model-backed probe can replace any
//! single entry through [`Detector::with_strategy`] without touching scoring.
//!
//! All randomness comes from the caller-supplied generator, so the same seed
//! always reproduces the same [`Finding`], ids included.

pub mod probes;

pub use probes::{PROBE_SPECS, ProbeSpec, SimulatedProbe};

use rand::RngCore;
use rand::seq::index;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Result, ValidationError};
use crate::types::{BiasType, Finding, MAX_CONFIDENCE, SeverityBucket, validate_iteration_count};

/// Most example instances attached to a single finding.
pub const MAX_EXAMPLES: usize = 3;

/// Raw per-trial statistics produced by one probe battery.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub values: Vec<f64>,
    pub threshold: f64,
}

impl TrialOutcome {
    pub fn new(values: Vec<f64>, threshold: f64) -> Self {
        Self { values, threshold }
    }

    /// Indices of trials whose statistic is strictly above the threshold.
    pub fn detected_indices(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > self.threshold)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn detection_count(&self) -> u32 {
        self.values.iter().filter(|v| **v > self.threshold).count() as u32
    }

    /// Mean statistic over every trial.
    pub fn mean_value(&self) -> f64 {
        crate::stats::mean(&self.values)
    }

    /// Mean statistic over detecting trials; the threshold itself when none fired.
    pub fn detected_mean(&self) -> f64 {
        let detected: Vec<f64> = self
            .values
            .iter()
            .copied()
            .filter(|v| *v > self.threshold)
            .collect();
        if detected.is_empty() {
            self.threshold
        } else {
            crate::stats::mean(&detected)
        }
    }
}

/// A probe battery for one bias type.
pub trait ProbeStrategy: Send + Sync {
    /// The bias type this strategy probes for.
    fn bias_type(&self) -> BiasType;

    /// Run `iteration_count` trials and report each trial's statistic.
    fn run_trials(&self, iteration_count: u32, rng: &mut dyn RngCore) -> TrialOutcome;

    /// Free-text pattern description for the whole battery.
    fn describe(&self, outcome: &TrialOutcome) -> String;

    /// Describe a single representative trial.
    fn example(&self, outcome: &TrialOutcome, trial: usize, rng: &mut dyn RngCore) -> String;
}

/// Map how far a statistic exceeds its threshold onto 0-100.
///
/// At or below the threshold maps to 0, twice the threshold maps to 100.
pub fn severity_score(statistic: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 || !statistic.is_finite() {
        return 0.0;
    }
    let excess = ((statistic - threshold) / threshold).clamp(0.0, 1.0);
    excess * 100.0
}

/// `proportion * (1 - 1/sqrt(n))`, kept within `[0, 0.99]`.
pub fn confidence_level(detection_proportion: f64, iteration_count: u32) -> f64 {
    if iteration_count == 0 {
        return 0.0;
    }
    let adjustment = 1.0 - 1.0 / (iteration_count as f64).sqrt();
    (detection_proportion * adjustment).clamp(0.0, MAX_CONFIDENCE)
}

/// Runs probe batteries and turns their outcomes into findings.
#[derive(Clone)]
pub struct Detector {
    strategies: HashMap<BiasType, Arc<dyn ProbeStrategy>>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    /// A detector with the simulated probe for every bias type.
    pub fn new() -> Self {
        let strategies = BiasType::ALL
            .into_iter()
            .map(|bias| {
                let strategy: Arc<dyn ProbeStrategy> = Arc::new(SimulatedProbe::new(bias));
                (bias, strategy)
            })
            .collect();
        Self { strategies }
    }

    /// Replace the strategy for the bias type it reports.
    pub fn with_strategy(mut self, strategy: Arc<dyn ProbeStrategy>) -> Self {
        self.strategies.insert(strategy.bias_type(), strategy);
        self
    }

    /// Run the probe battery for `bias_type` and score it.
    pub fn detect(
        &self,
        bias_type: BiasType,
        iteration_count: u32,
        rng: &mut dyn RngCore,
    ) -> Result<Finding> {
        validate_iteration_count(iteration_count)?;
        let strategy =
            self.strategies
                .get(&bias_type)
                .ok_or_else(|| ValidationError::UnknownBiasType {
                    name: bias_type.to_string(),
                })?;

        let outcome = strategy.run_trials(iteration_count, rng);
        let detection_count = outcome.detection_count().min(iteration_count);
        let detection_proportion = detection_count as f64 / iteration_count as f64;
        let severity_score = severity_score(outcome.detected_mean(), outcome.threshold);
        let confidence_level = confidence_level(detection_proportion, iteration_count);

        let id = random_id(rng);
        let example_instances = pick_examples(strategy.as_ref(), &outcome, rng);
        let pattern_description = strategy.describe(&outcome);

        tracing::debug!(
            bias_type = %bias_type,
            iteration_count,
            detection_count,
            severity_score,
            confidence_level,
            "Probe battery scored"
        );

        Ok(Finding {
            id,
            evaluation_id: None,
            bias_type,
            severity_score,
            severity: SeverityBucket::from_score(severity_score),
            confidence_level,
            detection_count,
            iteration_count,
            detection_proportion,
            example_instances,
            pattern_description,
        })
    }

    /// Like [`Detector::detect`], but takes the bias type by name.
    pub fn detect_named(
        &self,
        bias_type: &str,
        iteration_count: u32,
        rng: &mut dyn RngCore,
    ) -> Result<Finding> {
        let bias_type: BiasType = bias_type.parse()?;
        self.detect(bias_type, iteration_count, rng)
    }
}

fn random_id(rng: &mut dyn RngCore) -> Uuid {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

/// Describe up to [`MAX_EXAMPLES`] detecting trials, in trial order.
fn pick_examples(
    strategy: &dyn ProbeStrategy,
    outcome: &TrialOutcome,
    rng: &mut dyn RngCore,
) -> Vec<String> {
    let detected = outcome.detected_indices();
    if detected.is_empty() {
        return Vec::new();
    }
    let amount = detected.len().min(MAX_EXAMPLES);
    let mut chosen: Vec<usize> = index::sample(rng, detected.len(), amount)
        .into_iter()
        .map(|i| detected[i])
        .collect();
    chosen.sort_unstable();
    chosen
        .into_iter()
        .map(|trial| strategy.example(outcome, trial, rng))
        .collect()
}
