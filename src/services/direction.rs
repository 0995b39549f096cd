//! The human's sustained direction across a conversation.
//!
//! τ_dir is a unit vector that follows user messages slowly, at the human's
//! pace: a reflective pulse (low τ_h) keeps it steady, an exploring pulse
//! lets it shift. Responses are measured against it, and pod detection
//! amplifies the part of an embedding that lies along it.

use crate::domain::models::embedding::dot;
use crate::domain::models::{EmbeddingVector, NEAR_ZERO};

/// EMA weight on the existing direction at τ_h = 1.
const BASE_ALPHA: f64 = 0.85;
/// Alignment reported before a direction exists.
pub const NEUTRAL_ALIGNMENT: f64 = 0.5;
/// Pulse assumed when pulse estimation is off.
pub const RESTING_PULSE: f64 = 0.5;

/// Slow-moving estimate of what the user keeps returning to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectionTracker {
    direction: Option<EmbeddingVector>,
}

impl DirectionTracker {
    /// Current unit direction, if established.
    pub fn direction(&self) -> Option<&EmbeddingVector> {
        self.direction.as_ref()
    }

    /// Tracker after observing a user message at pulse `tau_h`. Pure, so
    /// a turn that aborts leaves the committed tracker unchanged.
    pub fn advanced(&self, user: &EmbeddingVector, tau_h: f64) -> Self {
        let next = match self.direction.as_ref() {
            Some(current) if current.dimension() == user.dimension() => {
                let alpha = BASE_ALPHA + (1.0 - BASE_ALPHA) * (1.0 - tau_h.clamp(0.0, 1.0));
                EmbeddingVector::new(
                    current
                        .as_slice()
                        .iter()
                        .zip(user.as_slice())
                        .map(|(d, u)| alpha * d + (1.0 - alpha) * u)
                        .collect(),
                )
            }
            _ => user.clone(),
        };
        Self {
            direction: Some(next.normalized()),
        }
    }

    /// Cosine-like alignment `e·τ / |e|` of an embedding with the direction,
    /// in `[-1, 1]`. Neutral until a direction exists or when `e` is zero.
    pub fn alignment(&self, embedding: &EmbeddingVector) -> f64 {
        let Some(direction) = self.usable(embedding) else {
            return NEUTRAL_ALIGNMENT;
        };
        let norm = embedding.norm();
        if norm <= NEAR_ZERO {
            return NEUTRAL_ALIGNMENT;
        }
        dot(embedding.as_slice(), direction.as_slice()).unwrap_or(0.0) / norm
    }

    /// `e' = e + λ(e·τ)τ`. Returns `e` unchanged without a direction.
    pub fn modulate(&self, embedding: &EmbeddingVector, strength: f64) -> EmbeddingVector {
        let Some(direction) = self.usable(embedding) else {
            return embedding.clone();
        };
        let pull = strength * dot(embedding.as_slice(), direction.as_slice()).unwrap_or(0.0);
        EmbeddingVector::new(
            embedding
                .as_slice()
                .iter()
                .zip(direction.as_slice())
                .map(|(e, t)| e + pull * t)
                .collect(),
        )
    }

    /// Forget the direction.
    pub fn reset(&mut self) {
        self.direction = None;
    }

    fn usable(&self, embedding: &EmbeddingVector) -> Option<&EmbeddingVector> {
        self.direction
            .as_ref()
            .filter(|d| d.dimension() == embedding.dimension())
    }
}
