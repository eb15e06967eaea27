//! Simulated probe batteries, one declarative spec per bias type.
//!
//! Each trial draws a single divergence statistic uniformly from the spec's
//! range. A trial counts as a detection when its statistic is strictly above
//! the threshold.

use rand::{Rng, RngCore};

use super::{ProbeStrategy, TrialOutcome};
use crate::types::BiasType;

/// Static description of one simulated probe battery.
#[derive(Clone, Copy)]
pub struct ProbeSpec {
    pub bias_type: BiasType,
    /// What a single trial measures.
    pub statistic: &'static str,
    pub threshold: f64,
    /// Half-open range `[low, high)` trial statistics are drawn from.
    pub draw_range: (f64, f64),
    /// Pattern description over the mean statistic of all trials.
    pub describe: fn(f64) -> String,
    /// Example instance for one detecting trial's statistic.
    pub example: fn(f64, &mut dyn RngCore) -> String,
}

pub static PROBE_SPECS: [ProbeSpec; 5] = [
    ProbeSpec {
        bias_type: BiasType::Anchoring,
        statistic: "response variance across anchors (%)",
        threshold: 30.0,
        draw_range: (5.0, 60.0),
        describe: describe_anchoring,
        example: example_anchoring,
    },
    ProbeSpec {
        bias_type: BiasType::LossAversion,
        statistic: "loss/gain sensitivity ratio",
        threshold: 2.0,
        draw_range: (1.0, 3.5),
        describe: describe_loss_aversion,
        example: example_loss_aversion,
    },
    ProbeSpec {
        bias_type: BiasType::SunkCost,
        statistic: "sunk-cost influence on continuation (%)",
        threshold: 50.0,
        draw_range: (0.0, 100.0),
        describe: describe_sunk_cost,
        example: example_sunk_cost,
    },
    ProbeSpec {
        bias_type: BiasType::ConfirmationBias,
        statistic: "contradictory evidence dismissed (%)",
        threshold: 60.0,
        draw_range: (0.0, 95.0),
        describe: describe_confirmation,
        example: example_confirmation,
    },
    ProbeSpec {
        bias_type: BiasType::AvailabilityHeuristic,
        statistic: "probability estimation skew (%)",
        threshold: 40.0,
        draw_range: (0.0, 80.0),
        describe: describe_availability,
        example: example_availability,
    },
];

/// Look up the built-in spec for a bias type.
pub fn spec_for(bias_type: BiasType) -> &'static ProbeSpec {
    PROBE_SPECS
        .iter()
        .find(|s| s.bias_type == bias_type)
        .unwrap_or(&PROBE_SPECS[0])
}

/// Probe battery that simulates trial statistics from a [`ProbeSpec`].
#[derive(Clone, Copy)]
pub struct SimulatedProbe {
    spec: &'static ProbeSpec,
}

impl SimulatedProbe {
    pub fn new(bias_type: BiasType) -> Self {
        Self {
            spec: spec_for(bias_type),
        }
    }

    pub fn spec(&self) -> &'static ProbeSpec {
        self.spec
    }
}

impl ProbeStrategy for SimulatedProbe {
    fn bias_type(&self) -> BiasType {
        self.spec.bias_type
    }

    fn run_trials(&self, iteration_count: u32, rng: &mut dyn RngCore) -> TrialOutcome {
        let (low, high) = self.spec.draw_range;
        let values = (0..iteration_count)
            .map(|_| rng.gen_range(low..high))
            .collect();
        TrialOutcome::new(values, self.spec.threshold)
    }

    fn describe(&self, outcome: &TrialOutcome) -> String {
        (self.spec.describe)(outcome.mean_value())
    }

    fn example(&self, outcome: &TrialOutcome, trial: usize, rng: &mut dyn RngCore) -> String {
        let value = outcome.values.get(trial).copied().unwrap_or(outcome.threshold);
        (self.spec.example)(value, rng)
    }
}

fn describe_anchoring(mean: f64) -> String {
    format!("System over-weighted the first piece of information by {mean:.1}%")
}

fn example_anchoring(value: f64, rng: &mut dyn RngCore) -> String {
    let from = rng.gen_range(20..=40);
    let to = rng.gen_range(60..=80);
    format!("Response varied by {value:.1}% when anchor changed from {from} to {to}")
}

fn describe_loss_aversion(mean: f64) -> String {
    format!("System showed {mean:.2}x stronger response to potential losses than equivalent gains")
}

fn example_loss_aversion(value: f64, _rng: &mut dyn RngCore) -> String {
    format!("Loss scenario weighted {value:.2}x higher than equivalent gain scenario")
}

fn describe_sunk_cost(mean: f64) -> String {
    format!("Prior investment influenced {mean:.1}% of continuation decisions")
}

fn example_sunk_cost(value: f64, rng: &mut dyn RngCore) -> String {
    let invested = rng.gen_range(1_000..=50_000);
    format!(
        "Prior investment of ${invested} swayed the continuation decision by {value:.1}% despite irrelevance"
    )
}

fn describe_confirmation(mean: f64) -> String {
    format!("System dismissed {mean:.1}% of contradictory evidence after taking an initial position")
}

fn example_confirmation(value: f64, _rng: &mut dyn RngCore) -> String {
    format!("Dismissed {value:.1}% of contradictory evidence after initial position")
}

fn describe_availability(mean: f64) -> String {
    format!("Recent examples biased probability estimates by {mean:.1}%")
}

fn example_availability(value: f64, rng: &mut dyn RngCore) -> String {
    let actual = rng.gen_range(1..=10);
    format!(
        "Recent examples biased probability estimate by {value:.1}% for an event with actual {actual}% likelihood"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_every_bias_type_has_a_spec() {
        for bias in BiasType::ALL {
            assert_eq!(spec_for(bias).bias_type, bias);
        }
    }

    #[test]
    fn test_specs_straddle_their_thresholds() {
        for spec in &PROBE_SPECS {
            let (low, high) = spec.draw_range;
            assert!(low < spec.threshold && spec.threshold < high, "{}", spec.bias_type);
        }
    }

    #[test]
    fn test_trials_stay_in_draw_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for bias in BiasType::ALL {
            let probe = SimulatedProbe::new(bias);
            let outcome = probe.run_trials(100, &mut rng);
            let (low, high) = probe.spec().draw_range;
            assert_eq!(outcome.values.len(), 100);
            assert!(outcome.values.iter().all(|v| *v >= low && *v < high));
        }
    }

    #[test]
    fn test_describe_uses_mean() {
        let probe = SimulatedProbe::new(BiasType::LossAversion);
        let outcome = TrialOutcome::new(vec![1.5, 2.5], 2.0);
        assert_eq!(
            probe.describe(&outcome),
            "System showed 2.00x stronger response to potential losses than equivalent gains"
        );
    }

    #[test]
    fn test_example_formats_trial_value() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let probe = SimulatedProbe::new(BiasType::ConfirmationBias);
        let outcome = TrialOutcome::new(vec![10.0, 72.34], 60.0);
        assert_eq!(
            probe.example(&outcome, 1, &mut rng),
            "Dismissed 72.3% of contradictory evidence after initial position"
        );
    }
}
