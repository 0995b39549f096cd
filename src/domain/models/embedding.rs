//! Embedding vectors and the vector math shared by the fatigue detector and
//! the pod space.
//!
//! An [`EmbeddingVector`] is produced once per turn and never mutated. All
//! operations that combine two vectors tolerate a dimensionality mismatch by
//! returning a neutral value (`0.0` similarity, `None` difference) rather than
//! failing, because the embedding backend is allowed to change mid-session.

use serde::{Deserialize, Serialize};

/// Below this magnitude a norm or variance is treated as zero.
pub const NEAR_ZERO: f64 = 1e-12;

/// A fixed-length real-valued representation of one turn's text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingVector(Vec<f64>);

impl EmbeddingVector {
    /// Wrap raw components.
    pub fn new(components: Vec<f64>) -> Self {
        Self(components)
    }

    /// Borrow the components.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of dimensions.
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// True when the vector has no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        norm(&self.0)
    }

    /// Cosine similarity; `0.0` on dimension mismatch or a zero-length vector.
    pub fn cosine_similarity(&self, other: &Self) -> f64 {
        cosine_similarity(&self.0, &other.0)
    }

    /// Displacement `self - earlier`, or `None` if the dimensions differ.
    pub fn displacement_from(&self, earlier: &Self) -> Option<Self> {
        if self.dimension() != earlier.dimension() {
            return None;
        }
        Some(Self(
            self.0
                .iter()
                .zip(&earlier.0)
                .map(|(a, b)| a - b)
                .collect(),
        ))
    }

    /// Component-wise mean of the given vectors. Vectors whose dimension does
    /// not match the first one are skipped.
    pub fn centroid<'a, I>(vectors: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut iter = vectors.into_iter();
        let first = iter.next()?;
        let mut sum = first.0.clone();
        let mut count = 1.0;
        for v in iter.filter(|v| v.dimension() == first.dimension()) {
            for (acc, x) in sum.iter_mut().zip(&v.0) {
                *acc += x;
            }
            count += 1.0;
        }
        Some(Self(sum.into_iter().map(|x| x / count).collect()))
    }

    /// Return an L2-normalised copy (zero vectors are returned unchanged).
    pub fn normalized(&self) -> Self {
        let n = self.norm();
        if n <= NEAR_ZERO {
            return self.clone();
        }
        Self(self.0.iter().map(|x| x / n).collect())
    }
}

impl From<Vec<f64>> for EmbeddingVector {
    fn from(components: Vec<f64>) -> Self {
        Self(components)
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(components: Vec<f32>) -> Self {
        Self(components.into_iter().map(f64::from).collect())
    }
}

/// Euclidean norm of a slice.
pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Dot product; `None` on dimension mismatch.
pub fn dot(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    Some(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// Cosine similarity clamped to `[-1, 1]`.
///
/// Returns `0.0` when the slices differ in length, are empty, or either has
/// zero norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let Some(d) = dot(a, b) else {
        return 0.0;
    };
    let denom = norm(a) * norm(b);
    if denom <= NEAR_ZERO {
        return 0.0;
    }
    (d / denom).clamp(-1.0, 1.0)
}

/// Eigenvalues of a small symmetric matrix by cyclic Jacobi rotation.
///
/// The input must be square and symmetric. Used on Gram matrices of at most a
/// handful of rows, so convergence within the sweep limit is not a concern.
pub fn symmetric_eigenvalues(mut a: Vec<Vec<f64>>) -> Vec<f64> {
    let n = a.len();
    for _ in 0..64 {
        let off: f64 = (0..n)
            .flat_map(|p| (p + 1..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();
        if off < 1e-24 {
            break;
        }
        for p in 0..n {
            for q in p + 1..n {
                if a[p][q].abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + theta.mul_add(theta, 1.0).sqrt());
                let c = 1.0 / t.mul_add(t, 1.0).sqrt();
                let s = t * c;
                for row in a.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
                for k in 0..n {
                    let (pk, qk) = (a[p][k], a[q][k]);
                    a[p][k] = c * pk - s * qk;
                    a[q][k] = s * pk + c * qk;
                }
            }
        }
    }
    (0..n).map(|i| a[i][i]).collect()
}
