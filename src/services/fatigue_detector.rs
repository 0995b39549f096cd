//! Fatigue detection over a sliding window of turn embeddings.
//!
//! The detector owns three bounded FIFOs (embeddings, turn-to-turn
//! velocities, scores). Scoring is split from recording: [`FatigueDetector::evaluate`]
//! is read-only so a turn can be scored, validated and retried without
//! touching history, and [`FatigueDetector::record`] appends only once the
//! turn is committed.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::domain::models::embedding::symmetric_eigenvalues;
use crate::domain::models::{
    EmbeddingVector, FatigueConfig, FatigueModel, FatigueSample, FatigueThresholds,
    ModelSelection, SubspaceMethod, TokenProbabilities, NEAR_ZERO,
};

/// Component names reported in [`FatigueSample::components`].
pub mod component {
    pub const SIMILARITY: &str = "similarity";
    pub const ENTROPY_DEFICIT: &str = "entropy_deficit";
    pub const STAGNATION: &str = "stagnation";
    pub const NOVELTY: &str = "novelty";
    pub const DIRECTIONAL_PERSISTENCE: &str = "directional_persistence";
    pub const SUBSPACE_COMPRESSION: &str = "subspace_compression";
    pub const CURVATURE_COLLAPSE: &str = "curvature_collapse";
}

/// Number of leading dimensions (or singular values) counted as the
/// compressed subspace.
const SUBSPACE_RANK: usize = 3;

/// Sliding-window fatigue detector for one conversation.
#[derive(Debug, Clone)]
pub struct FatigueDetector {
    config: FatigueConfig,
    embeddings: VecDeque<EmbeddingVector>,
    velocities: VecDeque<EmbeddingVector>,
    scores: VecDeque<f64>,
    turns: usize,
}

impl Default for FatigueDetector {
    fn default() -> Self {
        Self::new(FatigueConfig::default())
    }
}

impl FatigueDetector {
    /// Create a detector. A window size of zero is raised to one.
    pub fn new(mut config: FatigueConfig) -> Self {
        config.window_size = config.window_size.max(1);
        let cap = config.window_size;
        Self {
            config,
            embeddings: VecDeque::with_capacity(cap),
            velocities: VecDeque::with_capacity(cap),
            scores: VecDeque::with_capacity(cap),
            turns: 0,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &FatigueConfig {
        &self.config
    }

    /// Configured window size `k`.
    pub fn window_size(&self) -> usize {
        self.config.window_size
    }

    /// Embeddings currently in the window, oldest first.
    pub fn embeddings(&self) -> &VecDeque<EmbeddingVector> {
        &self.embeddings
    }

    /// Velocities currently in the window, oldest first.
    pub fn velocities(&self) -> &VecDeque<EmbeddingVector> {
        &self.velocities
    }

    /// Scores currently in the window, oldest first.
    pub fn scores(&self) -> &VecDeque<f64> {
        &self.scores
    }

    /// Index the next evaluated turn will carry.
    pub fn next_turn_index(&self) -> usize {
        self.turns
    }

    /// Most recently recorded embedding.
    pub fn last_embedding(&self) -> Option<&EmbeddingVector> {
        self.embeddings.back()
    }

    /// Score a turn with the configured thresholds. Does not modify history.
    pub fn evaluate(
        &self,
        embedding: &EmbeddingVector,
        previous: Option<&EmbeddingVector>,
        probabilities: Option<&TokenProbabilities>,
    ) -> FatigueSample {
        self.evaluate_with_thresholds(embedding, previous, probabilities, self.config.thresholds())
    }

    /// Score a turn against explicit thresholds. Does not modify history.
    ///
    /// `previous` is used as the comparison set only while the window is
    /// empty.
    pub fn evaluate_with_thresholds(
        &self,
        embedding: &EmbeddingVector,
        previous: Option<&EmbeddingVector>,
        probabilities: Option<&TokenProbabilities>,
        thresholds: FatigueThresholds,
    ) -> FatigueSample {
        let history = self.comparison_set(embedding, previous);
        let probabilities = probabilities.filter(|p| !p.is_empty());

        let model = match self.config.model {
            ModelSelection::A => FatigueModel::A,
            ModelSelection::B => FatigueModel::B,
            ModelSelection::Auto if probabilities.is_some() => FatigueModel::A,
            ModelSelection::Auto => FatigueModel::B,
        };

        let (raw, components) = match model {
            FatigueModel::A => self.score_model_a(embedding, &history, probabilities),
            FatigueModel::B => self.score_model_b(embedding, &history),
        };

        let score = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };
        let sample = FatigueSample {
            turn_index: self.turns,
            score,
            model_used: model,
            components,
            soft_flag: score > thresholds.soft,
            hard_flag: score > thresholds.hard,
        };

        debug!(
            turn_index = sample.turn_index,
            model = %model,
            score = sample.score,
            soft = sample.soft_flag,
            hard = sample.hard_flag,
            "Fatigue evaluated"
        );
        sample
    }

    /// Append a committed turn to the window.
    ///
    /// `previous` is pushed first when the window is empty, matching how
    /// [`Self::evaluate`] used it.
    pub fn record(
        &mut self,
        embedding: &EmbeddingVector,
        previous: Option<&EmbeddingVector>,
        sample: &FatigueSample,
    ) {
        if self.embeddings.is_empty() {
            if let Some(prev) = previous {
                push_bounded(&mut self.embeddings, prev.clone(), self.config.window_size);
            }
        }
        if let Some(last) = self.embeddings.back() {
            if let Some(velocity) = embedding.displacement_from(last) {
                push_bounded(&mut self.velocities, velocity, self.config.window_size);
            }
        }
        push_bounded(&mut self.embeddings, embedding.clone(), self.config.window_size);
        push_bounded(&mut self.scores, sample.score, self.config.window_size);
        self.turns += 1;
    }

    /// Evaluate and record in one step.
    pub fn detect(
        &mut self,
        embedding: &EmbeddingVector,
        previous: Option<&EmbeddingVector>,
        probabilities: Option<&TokenProbabilities>,
    ) -> FatigueSample {
        let sample = self.evaluate(embedding, previous, probabilities);
        self.record(embedding, previous, &sample);
        sample
    }

    /// Clear all history; the next call behaves as on a fresh detector.
    pub fn reset(&mut self) {
        self.embeddings.clear();
        self.velocities.clear();
        self.scores.clear();
        self.turns = 0;
    }

    fn comparison_set<'a>(
        &'a self,
        embedding: &EmbeddingVector,
        previous: Option<&'a EmbeddingVector>,
    ) -> Vec<&'a EmbeddingVector> {
        let set: Vec<&EmbeddingVector> = if self.embeddings.is_empty() {
            previous.into_iter().collect()
        } else {
            self.embeddings.iter().collect()
        };
        set.into_iter()
            .filter(|e| e.dimension() == embedding.dimension())
            .collect()
    }

    /// `N` is the stagnation form: cosine to the history centroid, so that a
    /// repeated embedding raises the score. Novelty is reported as `1 - N`.
    fn score_model_a(
        &self,
        embedding: &EmbeddingVector,
        history: &[&EmbeddingVector],
        probabilities: Option<&TokenProbabilities>,
    ) -> (f64, BTreeMap<String, f64>) {
        let similarity = if history.is_empty() {
            0.0
        } else {
            let total: f64 = history.iter().map(|h| embedding.cosine_similarity(h)).sum();
            total / history.len() as f64
        };
        let entropy_deficit = probabilities.map_or(0.0, TokenProbabilities::entropy_deficit);
        let stagnation = EmbeddingVector::centroid(history.iter().copied())
            .map_or(0.0, |c| embedding.cosine_similarity(&c).clamp(0.0, 1.0));

        let w = self.config.weights_a;
        let score = w.blend(similarity, entropy_deficit, stagnation);
        let components = BTreeMap::from([
            (component::SIMILARITY.to_string(), similarity),
            (component::ENTROPY_DEFICIT.to_string(), entropy_deficit),
            (component::STAGNATION.to_string(), stagnation),
            (component::NOVELTY.to_string(), 1.0 - stagnation),
        ]);
        (score, components)
    }

    fn score_model_b(
        &self,
        embedding: &EmbeddingVector,
        history: &[&EmbeddingVector],
    ) -> (f64, BTreeMap<String, f64>) {
        let mut components = BTreeMap::from([
            (component::DIRECTIONAL_PERSISTENCE.to_string(), 0.0),
            (component::SUBSPACE_COMPRESSION.to_string(), 0.0),
            (component::CURVATURE_COLLAPSE.to_string(), 0.0),
        ]);
        if history.is_empty() {
            return (0.0, components);
        }

        let mut velocities: Vec<&EmbeddingVector> = if self.embeddings.is_empty() {
            Vec::new()
        } else {
            self.velocities
                .iter()
                .filter(|v| v.dimension() == embedding.dimension())
                .collect()
        };
        let current = history
            .last()
            .and_then(|last| embedding.displacement_from(last));
        if let Some(v) = current.as_ref() {
            velocities.push(v);
        }

        let persistence = directional_persistence(&velocities);
        let compression = match self.config.subspace_method {
            SubspaceMethod::VarianceRatio => variance_ratio(embedding, history),
            SubspaceMethod::SingularValues => singular_value_ratio(embedding, history),
        };
        let collapse = curvature_collapse(&velocities);

        components.insert(component::DIRECTIONAL_PERSISTENCE.to_string(), persistence);
        components.insert(component::SUBSPACE_COMPRESSION.to_string(), compression);
        components.insert(component::CURVATURE_COLLAPSE.to_string(), collapse);

        let w = self.config.weights_b;
        (w.blend(persistence, compression, collapse), components)
    }
}

fn push_bounded<T>(deque: &mut VecDeque<T>, value: T, cap: usize) {
    while deque.len() >= cap {
        deque.pop_front();
    }
    deque.push_back(value);
}

/// Cosine of the two most recent velocities. A reversal is negative and
/// pulls the blended score down.
fn directional_persistence(velocities: &[&EmbeddingVector]) -> f64 {
    match velocities {
        [.., a, b] => a.cosine_similarity(b),
        _ => 0.0,
    }
}

/// `1 / (1 + κ)` with `κ = ‖Δ²v‖ / ‖v1 - v0‖³` over the last three
/// velocities.
fn curvature_collapse(velocities: &[&EmbeddingVector]) -> f64 {
    let [.., v0, v1, v2] = velocities else {
        return 0.0;
    };
    let (Some(d1), Some(d0)) = (v2.displacement_from(v1), v1.displacement_from(v0)) else {
        return 0.0;
    };
    let Some(d2) = d1.displacement_from(&d0) else {
        return 0.0;
    };
    let first = d0.norm();
    let second = d2.norm();
    let kappa = if first <= NEAR_ZERO {
        if second <= NEAR_ZERO {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        second / first.powi(3)
    };
    if kappa.is_finite() {
        1.0 / (1.0 + kappa)
    } else {
        0.0
    }
}

fn window_rows<'a>(embedding: &'a EmbeddingVector, history: &[&'a EmbeddingVector]) -> Vec<&'a [f64]> {
    history
        .iter()
        .map(|h| h.as_slice())
        .chain(std::iter::once(embedding.as_slice()))
        .collect()
}

/// Share of total per-dimension variance held by the top dimensions.
fn variance_ratio(embedding: &EmbeddingVector, history: &[&EmbeddingVector]) -> f64 {
    let rows = window_rows(embedding, history);
    let n = rows.len() as f64;
    let mut variances: Vec<f64> = (0..embedding.dimension())
        .map(|d| {
            let mean = rows.iter().map(|r| r[d]).sum::<f64>() / n;
            rows.iter().map(|r| (r[d] - mean).powi(2)).sum::<f64>() / n
        })
        .collect();
    let total: f64 = variances.iter().sum();
    if total <= NEAR_ZERO {
        return 1.0;
    }
    variances.sort_by(|a, b| b.total_cmp(a));
    let top: f64 = variances.iter().take(SUBSPACE_RANK).sum();
    (top / total).clamp(0.0, 1.0)
}

/// Share of the singular-value sum held by the top singular values of the
/// centred window, via the eigenvalues of its Gram matrix.
fn singular_value_ratio(embedding: &EmbeddingVector, history: &[&EmbeddingVector]) -> f64 {
    let rows = window_rows(embedding, history);
    let n = rows.len();
    let dim = embedding.dimension();
    let means: Vec<f64> = (0..dim)
        .map(|d| rows.iter().map(|r| r[d]).sum::<f64>() / n as f64)
        .collect();
    let centred: Vec<Vec<f64>> = rows
        .iter()
        .map(|r| r.iter().zip(&means).map(|(x, m)| x - m).collect())
        .collect();
    let gram: Vec<Vec<f64>> = centred
        .iter()
        .map(|a| {
            centred
                .iter()
                .map(|b| a.iter().zip(b).map(|(x, y)| x * y).sum())
                .collect()
        })
        .collect();

    let mut singular: Vec<f64> = symmetric_eigenvalues(gram)
        .into_iter()
        .map(|l| l.max(0.0).sqrt())
        .collect();
    let total: f64 = singular.iter().sum();
    if total <= NEAR_ZERO {
        return 1.0;
    }
    singular.sort_by(|a, b| b.total_cmp(a));
    let top: f64 = singular.iter().take(SUBSPACE_RANK).sum();
    (top / total).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_point(step: f64, dim: usize) -> EmbeddingVector {
        let mut v = vec![0.0; dim];
        v[0] = 10.0;
        v[1] = step;
        EmbeddingVector::new(v)
    }

    fn model_b_detector() -> FatigueDetector {
        FatigueDetector::new(FatigueConfig {
            model: ModelSelection::B,
            ..FatigueConfig::default()
        })
    }

    #[test]
    fn test_first_turn_has_zero_components() {
        let mut detector = FatigueDetector::default();
        let sample = detector.detect(&line_point(0.0, 8), None, None);
        assert_eq!(sample.model_used, FatigueModel::B);
        assert_eq!(sample.score, 0.0);
        assert_eq!(sample.component(component::DIRECTIONAL_PERSISTENCE), Some(0.0));
        assert_eq!(sample.component(component::CURVATURE_COLLAPSE), Some(0.0));
        assert!(!sample.soft_flag && !sample.hard_flag);
    }

    #[test]
    fn test_same_embedding_twice_trips_soft_flag_under_model_a() {
        let mut detector = FatigueDetector::new(FatigueConfig {
            model: ModelSelection::A,
            ..FatigueConfig::default()
        });
        let e = EmbeddingVector::new(vec![0.2, 0.4, -0.1, 0.9]);
        let first = detector.detect(&e, None, None);
        let second = detector.detect(&e, None, None);
        assert_eq!(first.score, 0.0);
        assert!((second.score - 0.7).abs() < 1e-9);
        assert!(second.soft_flag);
        assert!(!second.hard_flag);
    }

    #[test]
    fn test_model_a_with_peaked_probabilities_trips_hard_flag() {
        let mut detector = FatigueDetector::default();
        let e = EmbeddingVector::new(vec![1.0, 2.0, 3.0]);
        let peaked = TokenProbabilities::single(vec![0.999, 0.001], 50_000);
        detector.detect(&e, None, Some(&peaked));
        let sample = detector.detect(&e, None, Some(&peaked));
        assert_eq!(sample.model_used, FatigueModel::A);
        assert!(sample.hard_flag);
    }

    #[test]
    fn test_model_b_straight_line_reaches_hard_flag() {
        let mut detector = model_b_detector();
        let seed = line_point(0.0, 8);
        let s1 = detector.detect(&line_point(1.0, 8), Some(&seed), None);
        let s2 = detector.detect(&line_point(2.0, 8), None, None);
        let s3 = detector.detect(&line_point(3.0, 8), None, None);

        assert!((s1.score - 0.35).abs() < 1e-9);
        assert!((s2.score - 0.70).abs() < 1e-9);
        assert!((s3.score - 1.0).abs() < 1e-9);
        assert!(s1.score <= s2.score && s2.score <= s3.score);
        assert!(s3.hard_flag);
    }

    #[test]
    fn test_evaluate_does_not_touch_history() {
        let mut detector = model_b_detector();
        detector.detect(&line_point(0.0, 4), None, None);
        let before = detector.embeddings().len();
        let _ = detector.evaluate(&line_point(1.0, 4), None, None);
        assert_eq!(detector.embeddings().len(), before);
        assert_eq!(detector.next_turn_index(), 1);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut detector = FatigueDetector::default();
        for i in 0..20 {
            detector.detect(&line_point(f64::from(i), 4), None, None);
        }
        assert_eq!(detector.embeddings().len(), 5);
        assert_eq!(detector.velocities().len(), 5);
        assert_eq!(detector.scores().len(), 5);
    }

    #[test]
    fn test_reset_behaves_like_fresh() {
        let mut detector = FatigueDetector::default();
        for i in 0..4 {
            detector.detect(&line_point(f64::from(i), 4), None, None);
        }
        detector.reset();
        let mut fresh = FatigueDetector::default();
        let e = line_point(7.0, 4);
        assert_eq!(detector.detect(&e, None, None), fresh.detect(&e, None, None));
    }

    #[test]
    fn test_dimension_change_is_not_an_error() {
        let mut detector = FatigueDetector::default();
        detector.detect(&EmbeddingVector::new(vec![1.0, 0.0]), None, None);
        let sample = detector.detect(&EmbeddingVector::new(vec![1.0, 0.0, 0.0]), None, None);
        assert_eq!(sample.score, 0.0);
    }

    #[test]
    fn test_curvature_of_turning_path_is_below_one() {
        let a = EmbeddingVector::new(vec![1.0, 0.0]);
        let b = EmbeddingVector::new(vec![0.0, 1.0]);
        let c = EmbeddingVector::new(vec![-1.0, 0.5]);
        let cc = curvature_collapse(&[&a, &b, &c]);
        // d0 = (-1, 1), d2 = (0, -1.5): κ = 1.5 / 2^1.5
        let kappa = 1.5 / 2f64.sqrt().powi(3);
        assert!((cc - 1.0 / (1.0 + kappa)).abs() < 1e-12);
    }

    #[test]
    fn test_curvature_divides_by_earlier_difference() {
        let v0 = EmbeddingVector::new(vec![1.0, 0.0]);
        let v1 = EmbeddingVector::new(vec![2.0, 0.0]);
        let v2 = EmbeddingVector::new(vec![2.0, 0.0]);
        assert!((curvature_collapse(&[&v0, &v1, &v2]) - 0.5).abs() < 1e-12);

        // Stalled then moving: only the earlier difference is zero.
        assert_eq!(curvature_collapse(&[&v1, &v2, &v0]), 0.0);
    }

    #[test]
    fn test_reversed_velocities_have_negative_persistence() {
        let forward = EmbeddingVector::new(vec![1.0, 0.0]);
        let back = EmbeddingVector::new(vec![-1.0, 0.0]);
        assert!((directional_persistence(&[&forward, &back]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_oscillation_scores_below_straight_line() {
        let mut straight = model_b_detector();
        let mut oscillating = model_b_detector();
        for step in [0.0, 1.0, 2.0] {
            straight.detect(&line_point(step, 4), None, None);
        }
        for step in [0.0, 1.0, 0.0] {
            oscillating.detect(&line_point(step, 4), None, None);
        }
        let s = straight.detect(&line_point(3.0, 4), None, None);
        let o = oscillating.detect(&line_point(1.0, 4), None, None);
        assert!(o.component(component::DIRECTIONAL_PERSISTENCE).unwrap() < 0.0);
        assert!(o.score < s.score);
    }

    #[test]
    fn test_singular_value_method_is_bounded() {
        let history = [
            EmbeddingVector::new(vec![1.0, 0.0, 0.0, 0.0, 0.0]),
            EmbeddingVector::new(vec![0.0, 1.0, 0.0, 0.0, 0.0]),
            EmbeddingVector::new(vec![0.0, 0.0, 1.0, 0.0, 0.0]),
            EmbeddingVector::new(vec![0.0, 0.0, 0.0, 1.0, 0.0]),
        ];
        let refs: Vec<&EmbeddingVector> = history.iter().collect();
        let current = EmbeddingVector::new(vec![0.0, 0.0, 0.0, 0.0, 1.0]);
        let ratio = singular_value_ratio(&current, &refs);
        assert!(ratio > 0.0 && ratio < 1.0);
        let flat = variance_ratio(&current, &refs);
        assert!((flat - 0.6).abs() < 1e-9);
        assert!((ratio - 0.75).abs() < 1e-6);
    }
}
