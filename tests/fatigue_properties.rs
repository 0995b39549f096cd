//! Property tests for numeric invariants.

use proptest::prelude::*;

use vessel::domain::models::{
    EmbeddingVector, FatigueConfig, ModelSelection, SubspaceMethod, TokenProbabilities,
};
use vessel::FatigueDetector;

fn vector(dim: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-100.0f64..100.0, dim)
}

fn trajectory() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1usize..6).prop_flat_map(|dim| prop::collection::vec(vector(dim), 1..12))
}

proptest! {
    #[test]
    fn score_stays_in_unit_interval(
        points in trajectory(),
        window in 1usize..8,
        singular in any::<bool>(),
    ) {
        let mut detector = FatigueDetector::new(FatigueConfig {
            window_size: window,
            model: ModelSelection::B,
            subspace_method: if singular { SubspaceMethod::SingularValues } else { SubspaceMethod::VarianceRatio },
            ..FatigueConfig::default()
        });
        for p in points {
            let sample = detector.detect(&EmbeddingVector::new(p), None, None);
            prop_assert!((0.0..=1.0).contains(&sample.score));
            prop_assert!(!sample.hard_flag || sample.soft_flag);
            prop_assert!(detector.embeddings().len() <= window);
            prop_assert!(detector.scores().len() <= window);
        }
    }

    #[test]
    fn model_a_score_stays_in_unit_interval(
        points in trajectory(),
        probs in prop::collection::vec(0.0f64..1.0, 1..6),
        vocab in 2usize..50_000,
    ) {
        let mut detector = FatigueDetector::new(FatigueConfig {
            model: ModelSelection::A,
            ..FatigueConfig::default()
        });
        let probabilities = TokenProbabilities::single(probs, vocab);
        for p in points {
            let sample = detector.detect(&EmbeddingVector::new(p), None, Some(&probabilities));
            prop_assert!((0.0..=1.0).contains(&sample.score));
        }
    }

    #[test]
    fn cosine_is_symmetric_and_bounded(a in vector(4), b in vector(4)) {
        let a = EmbeddingVector::new(a);
        let b = EmbeddingVector::new(b);
        let ab = a.cosine_similarity(&b);
        prop_assert!((ab - b.cosine_similarity(&a)).abs() < 1e-12);
        prop_assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&ab));
    }
}
