//! Declarative remediation knowledge base keyed by `(bias type, severity bucket)`.

use crate::types::{BiasType, Difficulty, Impact, SeverityBucket};

use SeverityBucket::{Critical, High, Low, Medium};

const EVERY_BUCKET: &[SeverityBucket] = &[Low, Medium, High, Critical];
const MEDIUM_AND_UP: &[SeverityBucket] = &[Medium, High, Critical];
const HIGH_AND_UP: &[SeverityBucket] = &[High, Critical];

/// One remediation action and the findings it applies to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionTemplate {
    pub bias_type: BiasType,
    pub buckets: &'static [SeverityBucket],
    pub title: &'static str,
    pub technical: &'static str,
    pub simplified: &'static str,
    pub impact: Impact,
    pub difficulty: Difficulty,
    /// Fixed weight in `1..=10`, unique within a bias type.
    pub base_priority: u8,
}

impl ActionTemplate {
    pub fn applies_to(&self, bias_type: BiasType, bucket: SeverityBucket) -> bool {
        self.bias_type == bias_type && self.buckets.contains(&bucket)
    }
}

pub static ACTIONS: &[ActionTemplate] = &[
    // Anchoring
    ActionTemplate {
        bias_type: BiasType::Anchoring,
        buckets: EVERY_BUCKET,
        title: "Implement multi-perspective prompting",
        technical: "Restructure prompts to present multiple baseline values before eliciting a response. Use ensemble methods that aggregate responses from different anchor points to reduce single-anchor dependency.",
        simplified: "Present multiple starting points to prevent over-reliance on the first value, like getting several estimates before deciding.",
        impact: Impact::High,
        difficulty: Difficulty::Easy,
        base_priority: 9,
    },
    ActionTemplate {
        bias_type: BiasType::Anchoring,
        buckets: MEDIUM_AND_UP,
        title: "Add anchor randomization layer",
        technical: "Randomly vary initial context values across inference calls during preprocessing. Monitor response variance and flag high-variance outputs for review.",
        simplified: "Change the starting information randomly to see if answers stay consistent, and flag cases where they move too much.",
        impact: Impact::Medium,
        difficulty: Difficulty::Moderate,
        base_priority: 7,
    },
    ActionTemplate {
        bias_type: BiasType::Anchoring,
        buckets: HIGH_AND_UP,
        title: "Enable anchor-free reasoning mode",
        technical: "Add an alternative reasoning pipeline that derives responses from first principles without reference points, and compare its outputs against the anchored mode.",
        simplified: "Work problems out from scratch without an initial reference point and use that as a comparison.",
        impact: Impact::High,
        difficulty: Difficulty::Complex,
        base_priority: 6,
    },
    // Loss aversion
    ActionTemplate {
        bias_type: BiasType::LossAversion,
        buckets: EVERY_BUCKET,
        title: "Implement gain-loss normalization",
        technical: "Add a preprocessing layer that equalizes the salience of gain and loss framing, calibrated so equivalent scenarios receive equal weight regardless of framing.",
        simplified: "Make sure the system treats potential gains and losses equally when they are the same size.",
        impact: Impact::High,
        difficulty: Difficulty::Moderate,
        base_priority: 9,
    },
    ActionTemplate {
        bias_type: BiasType::LossAversion,
        buckets: HIGH_AND_UP,
        title: "Add framing diversity training",
        technical: "Augment training data with equivalent gain/loss scenarios and fine-tune the model to recognize and neutralize asymmetric loss sensitivity.",
        simplified: "Teach the system to notice when it is too sensitive to losses compared to gains.",
        impact: Impact::Medium,
        difficulty: Difficulty::Complex,
        base_priority: 7,
    },
    ActionTemplate {
        bias_type: BiasType::LossAversion,
        buckets: MEDIUM_AND_UP,
        title: "Enable risk-neutral evaluation mode",
        technical: "Use a utility-based decision framework that models risk preferences explicitly, with configurable risk tolerance parameters.",
        simplified: "Add settings that control how much the system cares about avoiding losses versus seeking gains.",
        impact: Impact::Medium,
        difficulty: Difficulty::Moderate,
        base_priority: 6,
    },
    // Sunk cost
    ActionTemplate {
        bias_type: BiasType::SunkCost,
        buckets: EVERY_BUCKET,
        title: "Implement prospective-only analysis",
        technical: "Exclude historical cost information from forward-looking evaluations with input filters that strip sunk cost references.",
        simplified: "Decide based only on future costs and benefits, ignoring money already spent.",
        impact: Impact::High,
        difficulty: Difficulty::Easy,
        base_priority: 8,
    },
    ActionTemplate {
        bias_type: BiasType::SunkCost,
        buckets: MEDIUM_AND_UP,
        title: "Add sunk cost detection layer",
        technical: "Classify decision contexts that mention past investments, flag them, and provide an alternative analysis that excludes sunk costs.",
        simplified: "Detect when past spending is mentioned and show what the decision would be without it.",
        impact: Impact::Medium,
        difficulty: Difficulty::Moderate,
        base_priority: 7,
    },
    ActionTemplate {
        bias_type: BiasType::SunkCost,
        buckets: HIGH_AND_UP,
        title: "Enable zero-based decision mode",
        technical: "Add a reasoning mode that evaluates scenarios as if starting from scratch and present it side by side with the sunk-cost-aware analysis.",
        simplified: "Show what the decision would be if starting fresh today, next to the current approach.",
        impact: Impact::High,
        difficulty: Difficulty::Moderate,
        base_priority: 6,
    },
    // Confirmation bias
    ActionTemplate {
        bias_type: BiasType::ConfirmationBias,
        buckets: EVERY_BUCKET,
        title: "Implement adversarial evidence search",
        technical: "Add a dedicated search phase for evidence contradicting the initial hypothesis and weight contradictory evidence at least equally in final reasoning.",
        simplified: "Actively look for information that disagrees with the first conclusion and give it fair consideration.",
        impact: Impact::High,
        difficulty: Difficulty::Moderate,
        base_priority: 9,
    },
    ActionTemplate {
        bias_type: BiasType::ConfirmationBias,
        buckets: HIGH_AND_UP,
        title: "Enable red team reasoning mode",
        technical: "Use dual-process reasoning where a second pass argues against the initial conclusion, then synthesize the output from the thesis-antithesis analysis.",
        simplified: "Have the system argue against its own first answer, then combine both perspectives.",
        impact: Impact::High,
        difficulty: Difficulty::Complex,
        base_priority: 8,
    },
    ActionTemplate {
        bias_type: BiasType::ConfirmationBias,
        buckets: MEDIUM_AND_UP,
        title: "Add evidence diversity metrics",
        technical: "Track the ratio of confirming to contradicting evidence in the reasoning chain and alert when it exceeds a threshold such as 3:1.",
        simplified: "Monitor whether the system only looks at evidence that supports its initial idea.",
        impact: Impact::Medium,
        difficulty: Difficulty::Easy,
        base_priority: 6,
    },
    // Availability heuristic
    ActionTemplate {
        bias_type: BiasType::AvailabilityHeuristic,
        buckets: EVERY_BUCKET,
        title: "Implement base rate integration",
        technical: "Augment reasoning with explicit statistical base rates from reliable sources, weighted above anecdotal examples in probability estimates.",
        simplified: "Use actual statistics instead of memorable examples when estimating likelihood.",
        impact: Impact::High,
        difficulty: Difficulty::Moderate,
        base_priority: 9,
    },
    ActionTemplate {
        bias_type: BiasType::AvailabilityHeuristic,
        buckets: HIGH_AND_UP,
        title: "Add recency weighting correction",
        technical: "Apply temporal discounting that reduces the influence of recent examples on probability judgments, calibrated against known frequency distributions.",
        simplified: "Reduce the influence of recent dramatic examples on probability estimates.",
        impact: Impact::Medium,
        difficulty: Difficulty::Moderate,
        base_priority: 7,
    },
    ActionTemplate {
        bias_type: BiasType::AvailabilityHeuristic,
        buckets: MEDIUM_AND_UP,
        title: "Enable statistical grounding mode",
        technical: "Require every probability estimate to reference empirical frequency data and flag estimates based solely on examples or intuition.",
        simplified: "Make the system cite real data for probability claims instead of guessing from examples.",
        impact: Impact::High,
        difficulty: Difficulty::Easy,
        base_priority: 8,
    },
];

/// Every action registered for `(bias_type, bucket)`, in table order.
pub fn actions_for(
    bias_type: BiasType,
    bucket: SeverityBucket,
) -> impl Iterator<Item = &'static ActionTemplate> {
    ACTIONS
        .iter()
        .filter(move |action| action.applies_to(bias_type, bucket))
}
