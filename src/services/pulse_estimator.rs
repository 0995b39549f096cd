//! Human pulse (τ_h) estimation from the user's side of the conversation.
//!
//! τ_h summarises how the human is pacing the exchange: short latencies,
//! novel messages and changes of direction push it up, long reflective pauses
//! pull it down. Estimation is pure; the caller commits the new state only
//! once the turn succeeds.

use chrono::{DateTime, Utc};

use crate::domain::models::{EmbeddingVector, FatigueThresholds, PodThresholds};

const W_LATENCY: f64 = 0.45;
const W_LENGTH: f64 = 0.15;
const W_NOVELTY: f64 = 0.25;
const W_DIRECTION: f64 = 0.15;
const SMOOTHING: f64 = 0.7;
const INITIAL_TAU: f64 = 0.5;
/// Neutral value for a feature with insufficient history.
const NEUTRAL: f64 = 0.5;
const LATENCY_SCALE_SECS: f64 = 30.0;
const LENGTH_CAP_CHARS: f64 = 500.0;

/// Estimator state between turns.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseState {
    pub tau: f64,
    pub last_time: Option<DateTime<Utc>>,
    pub last_user: Option<EmbeddingVector>,
    pub prev_user: Option<EmbeddingVector>,
}

impl Default for PulseState {
    fn default() -> Self {
        Self {
            tau: INITIAL_TAU,
            last_time: None,
            last_user: None,
            prev_user: None,
        }
    }
}

/// Result of estimating one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseReading {
    /// Estimated τ_h in `(0, 1]`.
    pub tau: f64,
    next: PulseState,
}

/// EMA-smoothed estimator of τ_h.
#[derive(Debug, Clone, Default)]
pub struct PulseEstimator {
    state: PulseState,
}

impl PulseEstimator {
    /// Current τ_h.
    pub fn tau(&self) -> f64 {
        self.state.tau
    }

    /// Current state.
    pub fn state(&self) -> &PulseState {
        &self.state
    }

    /// Estimate τ_h for a new user message without changing state.
    pub fn estimate(
        &self,
        message: &str,
        embedding: &EmbeddingVector,
        at: DateTime<Utc>,
    ) -> PulseReading {
        let s = &self.state;

        let latency = s.last_time.map_or(NEUTRAL, |last| {
            let secs = at.signed_duration_since(last).num_milliseconds().max(0) as f64 / 1000.0;
            (-secs / LATENCY_SCALE_SECS).exp()
        });

        let length = (message.chars().count() as f64 / LENGTH_CAP_CHARS).min(1.0);

        let novelty = s.last_user.as_ref().map_or(NEUTRAL, |last| {
            if embedding.norm() > 0.0 && last.norm() > 0.0 {
                1.0 - embedding.cosine_similarity(last).max(0.0)
            } else {
                NEUTRAL
            }
        });

        let direction = match (&s.prev_user, &s.last_user) {
            (Some(prev), Some(last)) => {
                match (last.displacement_from(prev), embedding.displacement_from(last)) {
                    (Some(v_prev), Some(v_curr)) if v_prev.norm() > 0.0 && v_curr.norm() > 0.0 => {
                        1.0 - v_prev.cosine_similarity(&v_curr).max(0.0)
                    }
                    _ => NEUTRAL,
                }
            }
            _ => NEUTRAL,
        };

        let z = W_LATENCY * latency + W_LENGTH * length + W_NOVELTY * novelty + W_DIRECTION * direction;
        let raw = 1.0 / (1.0 + (-z).exp());
        let tau = SMOOTHING * raw + (1.0 - SMOOTHING) * s.tau;

        PulseReading {
            tau,
            next: PulseState {
                tau,
                last_time: Some(at),
                last_user: Some(embedding.clone()),
                prev_user: s.last_user.clone(),
            },
        }
    }

    /// Adopt the state produced by [`Self::estimate`].
    pub fn commit(&mut self, reading: PulseReading) {
        self.state = reading.next;
    }

    /// Back to the neutral pulse.
    pub fn reset(&mut self) {
        self.state = PulseState::default();
    }
}

/// Scale thresholds by the pulse: a reflective human (low τ_h) raises fatigue
/// thresholds and lowers the pod escape threshold.
pub fn modulate_thresholds(
    tau: f64,
    fatigue: FatigueThresholds,
    pods: PodThresholds,
) -> (FatigueThresholds, PodThresholds) {
    let m = 1.2 - 0.4 * tau.clamp(0.0, 1.0);
    (
        FatigueThresholds {
            soft: (fatigue.soft * m).min(0.95),
            hard: (fatigue.hard * m).min(0.98),
        },
        PodThresholds {
            high_similarity: (pods.high_similarity * m).min(0.98),
            fatigue_similarity: (pods.fatigue_similarity * (2.0 - m)).max(0.30),
        },
    )
}
