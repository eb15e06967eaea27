//! Property-based tests for the scoring pipeline using proptest.

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use biaslens_core::analyzer::baseline_from_scores;
use biaslens_core::detector::{confidence_level, severity_score};
use biaslens_core::types::MAX_RECOMMENDATIONS;
use biaslens_core::{
    BiasType, Detector, Finding, RecommendationMode, Recommender, SeverityBucket, Zone,
    ZoneThresholds, classify_zone, compute_overall_score,
};

fn finding(bias_type: BiasType, score: f64, confidence: f64) -> Finding {
    Finding {
        id: Uuid::nil(),
        evaluation_id: None,
        bias_type,
        severity_score: score,
        severity: SeverityBucket::from_score(score),
        confidence_level: confidence,
        detection_count: 0,
        iteration_count: 10,
        detection_proportion: 0.0,
        example_instances: Vec::new(),
        pattern_description: String::new(),
    }
}

fn bias_type() -> impl Strategy<Value = BiasType> {
    (0usize..BiasType::ALL.len()).prop_map(|i| BiasType::ALL[i])
}

// --- Detector properties ---

proptest! {
    #[test]
    fn bucket_is_a_step_function(score in 0.0f64..=100.0) {
        let expected = if score < 25.0 {
            SeverityBucket::Low
        } else if score < 50.0 {
            SeverityBucket::Medium
        } else if score < 75.0 {
            SeverityBucket::High
        } else {
            SeverityBucket::Critical
        };
        prop_assert_eq!(SeverityBucket::from_score(score), expected);
    }

    #[test]
    fn confidence_is_bounded(p in 0.0f64..=1.0, n in 10u32..=100) {
        let c = confidence_level(p, n);
        prop_assert!((0.0..=0.99).contains(&c));
    }

    #[test]
    fn severity_is_bounded(stat in -1000.0f64..1000.0, threshold in 0.1f64..100.0) {
        let s = severity_score(stat, threshold);
        prop_assert!((0.0..=100.0).contains(&s));
        if stat <= threshold {
            prop_assert_eq!(s, 0.0);
        }
    }

    #[test]
    fn detected_findings_respect_invariants(
        seed in any::<u64>(),
        bias in bias_type(),
        n in 10u32..=100,
    ) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let f = Detector::new().detect(bias, n, &mut rng).unwrap();
        prop_assert!((0.0..=100.0).contains(&f.severity_score));
        prop_assert!((0.0..=0.99).contains(&f.confidence_level));
        prop_assert!(f.detection_count <= n);
        prop_assert!(f.example_instances.len() <= 3);
        prop_assert_eq!(f.severity, SeverityBucket::from_score(f.severity_score));
    }
}

// --- Analyzer properties ---

proptest! {
    #[test]
    fn overall_score_within_input_range(
        scores in prop::collection::vec(0.0f64..=100.0, 1..10)
    ) {
        let findings: Vec<Finding> = scores
            .iter()
            .map(|s| finding(BiasType::Anchoring, *s, 0.5))
            .collect();
        let overall = compute_overall_score(&findings).unwrap();
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(overall >= min && overall <= max);
    }

    #[test]
    fn zone_is_monotonic(
        a in 0.0f64..100.0,
        b in 1.0f64..60.0,
        s1 in 0.0f64..150.0,
        s2 in 0.0f64..150.0,
    ) {
        // Two distinct samples always give a positive spread.
        let baseline = baseline_from_scores("p", &[a, a + b], ZoneThresholds::default()).unwrap();
        let (lo, hi) = if s1 <= s2 { (s1, s2) } else { (s2, s1) };
        prop_assert!(classify_zone(lo, &baseline) <= classify_zone(hi, &baseline));
    }

    #[test]
    fn constant_reference_scores_are_green_at_their_value(
        v in 0.0f64..=100.0,
        n in 2usize..10,
    ) {
        let baseline = baseline_from_scores("flat", &vec![v; n], ZoneThresholds::default()).unwrap();
        prop_assert_eq!(baseline.std_dev, 0.0);
        prop_assert_eq!(classify_zone(v, &baseline), Zone::Green);
    }
}

// --- Recommender properties ---

proptest! {
    #[test]
    fn recommendations_capped_and_ordered(
        inputs in prop::collection::vec((bias_type(), 0.0f64..=100.0, 0.0f64..=0.99), 1..8)
    ) {
        let findings: Vec<Finding> = inputs
            .iter()
            .map(|(bias, score, conf)| finding(*bias, *score, *conf))
            .collect();
        let recs = Recommender::new()
            .generate(&findings, RecommendationMode::Both)
            .unwrap();
        prop_assert!(!recs.is_empty());
        prop_assert!(recs.len() <= MAX_RECOMMENDATIONS);
        for pair in recs.windows(2) {
            prop_assert!(pair[0].priority >= pair[1].priority);
        }
        for rec in &recs {
            prop_assert!((0.0..=10.0).contains(&rec.priority));
        }
    }
}
