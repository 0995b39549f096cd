//! Fatigue samples and the configuration of the two scoring models.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which scoring model produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FatigueModel {
    /// Probability-aware: similarity, entropy deficit, stagnation.
    A,
    /// Geometry-only: directional persistence, subspace compression,
    /// curvature collapse.
    B,
}

impl fmt::Display for FatigueModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Model selection policy for the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSelection {
    /// Model A when token probabilities are supplied, Model B otherwise.
    #[default]
    Auto,
    /// Always Model A (entropy deficit is 0 without probabilities).
    A,
    /// Always Model B.
    B,
}

/// Coarse classification of a fatigue score against the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueStatus {
    Fresh,
    Soft,
    Hard,
}

impl fmt::Display for FatigueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fresh => "fresh",
            Self::Soft => "soft",
            Self::Hard => "hard",
        };
        write!(f, "{s}")
    }
}

/// Weight tuple `(alpha, beta, gamma)` for one scoring model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FatigueWeights {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl FatigueWeights {
    /// Model A defaults: 0.4 / 0.3 / 0.3.
    pub const MODEL_A: Self = Self {
        alpha: 0.4,
        beta: 0.3,
        gamma: 0.3,
    };

    /// Model B defaults: 0.35 / 0.35 / 0.30.
    pub const MODEL_B: Self = Self {
        alpha: 0.35,
        beta: 0.35,
        gamma: 0.30,
    };

    /// `alpha*x + beta*y + gamma*z`.
    pub fn blend(&self, x: f64, y: f64, z: f64) -> f64 {
        self.alpha * x + self.beta * y + self.gamma * z
    }

    /// True when every weight is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.alpha, self.beta, self.gamma]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
    }
}

/// Soft/hard cut points on the fatigue score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FatigueThresholds {
    pub soft: f64,
    pub hard: f64,
}

impl Default for FatigueThresholds {
    fn default() -> Self {
        Self {
            soft: 0.68,
            hard: 0.84,
        }
    }
}

impl FatigueThresholds {
    /// Classify a score. Both comparisons are strict.
    pub fn classify(&self, score: f64) -> FatigueStatus {
        if score > self.hard {
            FatigueStatus::Hard
        } else if score > self.soft {
            FatigueStatus::Soft
        } else {
            FatigueStatus::Fresh
        }
    }
}

/// Per-token probability distributions for one generated turn.
///
/// Each inner vector is the distribution over candidate tokens at one
/// position. Entries need not sum to one; they are renormalised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenProbabilities {
    pub distributions: Vec<Vec<f64>>,
    /// Vocabulary size used for `H_max = ln(vocabulary_size)`.
    pub vocabulary_size: usize,
}

impl TokenProbabilities {
    /// A single distribution.
    pub fn single(distribution: Vec<f64>, vocabulary_size: usize) -> Self {
        Self {
            distributions: vec![distribution],
            vocabulary_size,
        }
    }

    /// True when there is nothing to score.
    pub fn is_empty(&self) -> bool {
        self.distributions.iter().all(Vec::is_empty)
    }

    /// Mean normalised entropy deficit `1 - H(p)/ln(V)` over positions, in
    /// `[0, 1]`. A peaked distribution drives the value toward 1.
    pub fn entropy_deficit(&self) -> f64 {
        if self.vocabulary_size < 2 {
            return 0.0;
        }
        let h_max = (self.vocabulary_size as f64).ln();
        let deficits: Vec<f64> = self
            .distributions
            .iter()
            .filter_map(|p| shannon_entropy(p))
            .map(|h| (1.0 - h / h_max).clamp(0.0, 1.0))
            .collect();
        if deficits.is_empty() {
            return 0.0;
        }
        deficits.iter().sum::<f64>() / deficits.len() as f64
    }
}

/// Shannon entropy (natural log) of a renormalised distribution. Negative and
/// non-finite entries are ignored; `None` if nothing positive remains.
pub fn shannon_entropy(p: &[f64]) -> Option<f64> {
    let total: f64 = p.iter().filter(|x| x.is_finite() && **x > 0.0).sum();
    if total <= 0.0 {
        return None;
    }
    Some(
        p.iter()
            .filter(|x| x.is_finite() && **x > 0.0)
            .map(|x| {
                let q = x / total;
                -q * q.ln()
            })
            .sum(),
    )
}

/// One turn's fatigue measurement. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueSample {
    pub turn_index: usize,
    /// Clamped to `[0, 1]`.
    pub score: f64,
    pub model_used: FatigueModel,
    pub components: BTreeMap<String, f64>,
    pub soft_flag: bool,
    pub hard_flag: bool,
}

impl FatigueSample {
    /// Status derived from the flags.
    pub fn status(&self) -> FatigueStatus {
        if self.hard_flag {
            FatigueStatus::Hard
        } else if self.soft_flag {
            FatigueStatus::Soft
        } else {
            FatigueStatus::Fresh
        }
    }

    /// Look up a named component.
    pub fn component(&self, name: &str) -> Option<f64> {
        self.components.get(name).copied()
    }
}
