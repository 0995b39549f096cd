//! Per-session rhythm recording and signature computation.

use chrono::Utc;

use crate::domain::models::{
    BreathingEvent, BreathingKind, DominantRhythm, FatigueSample, FatigueStatus, FatigueThresholds,
    FatigueTrend, RhythmSample, RhythmSignature, TurnEvent,
};

/// Difference between half-means needed to call a trend.
const TREND_MARGIN: f64 = 0.05;
/// τ_h change between consecutive turns that counts as a pause or
/// acceleration.
const BREATH_DELTA: f64 = 0.15;

/// Records how each committed turn "breathed" and summarises the session.
#[derive(Debug, Clone, Default)]
pub struct RhythmRecorder {
    samples: Vec<RhythmSample>,
    thresholds: FatigueThresholds,
}

impl RhythmRecorder {
    /// Recorder that classifies against the given fatigue thresholds.
    pub fn new(thresholds: FatigueThresholds) -> Self {
        Self {
            samples: Vec::new(),
            thresholds,
        }
    }

    /// Record one committed turn.
    pub fn record(&mut self, fatigue: &FatigueSample, tau_h: Option<f64>, events: Vec<TurnEvent>) {
        self.samples.push(RhythmSample {
            turn: self.samples.len(),
            recorded_at: Utc::now(),
            tau_h,
            fatigue: fatigue.score,
            status: fatigue.status(),
            components: fatigue.components.clone(),
            events,
        });
    }

    /// Samples so far.
    pub fn samples(&self) -> &[RhythmSample] {
        &self.samples
    }

    /// Drop all samples.
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Summarise the session so far.
    pub fn signature(&self) -> RhythmSignature {
        if self.samples.is_empty() {
            return RhythmSignature::empty();
        }

        let fatigue: Vec<f64> = self.samples.iter().map(|s| s.fatigue).collect();
        let taus: Vec<f64> = self.samples.iter().filter_map(|s| s.tau_h).collect();

        let mean_fatigue = mean(&fatigue);
        let peak_fatigue = fatigue.iter().copied().fold(0.0, f64::max);
        let fatigue_trend = trend(&fatigue);
        let (mean_tau_h, tau_h_variance) = if taus.is_empty() {
            (None, None)
        } else {
            let m = mean(&taus);
            let var = taus.iter().map(|t| (t - m).powi(2)).sum::<f64>() / taus.len() as f64;
            (Some(m), Some(var))
        };
        let curvature_integral = if taus.is_empty() {
            total_variation(&fatigue)
        } else {
            total_variation(&taus)
        };

        let dominant_rhythm = match (mean_tau_h, tau_h_variance) {
            (Some(m), Some(v)) if m < 0.4 && v < 0.02 => DominantRhythm::Reflective,
            (Some(m), _) if m > 0.65 => DominantRhythm::Exploratory,
            (Some(_), Some(v)) if v > 0.03 => DominantRhythm::ReflectiveWithBurst,
            _ => match fatigue_trend {
                FatigueTrend::Rising if peak_fatigue > self.thresholds.soft => {
                    DominantRhythm::Fatiguing
                }
                FatigueTrend::Falling => DominantRhythm::Recovered,
                _ => DominantRhythm::Steady,
            },
        };

        RhythmSignature {
            turns: self.samples.len(),
            mean_fatigue,
            peak_fatigue,
            fatigue_trend,
            mean_tau_h,
            tau_h_variance,
            breathing_events: self.breathing_events(),
            dominant_rhythm,
            curvature_integral,
        }
    }

    fn breathing_events(&self) -> Vec<BreathingEvent> {
        let mut events = Vec::new();
        let mut previous: Option<&RhythmSample> = None;
        for sample in &self.samples {
            if let (Some(prev_tau), Some(tau)) = (previous.and_then(|p| p.tau_h), sample.tau_h) {
                let delta = tau - prev_tau;
                if delta < -BREATH_DELTA {
                    events.push(breath(sample.turn, BreathingKind::Pause, Some(delta)));
                } else if delta > BREATH_DELTA {
                    events.push(breath(sample.turn, BreathingKind::Acceleration, Some(delta)));
                }
            }

            // Onsets are transitions, so the first sample never has one.
            match (previous.map(|p| p.status), sample.status) {
                (Some(FatigueStatus::Fresh), FatigueStatus::Soft) => events.push(breath(
                    sample.turn,
                    BreathingKind::SoftFatigueOnset,
                    Some(sample.fatigue),
                )),
                (Some(FatigueStatus::Fresh | FatigueStatus::Soft), FatigueStatus::Hard) => {
                    events.push(breath(
                        sample.turn,
                        BreathingKind::HardFatigueOnset,
                        Some(sample.fatigue),
                    ));
                }
                _ => {}
            }

            events.extend(
                sample
                    .events
                    .iter()
                    .map(|e| breath(sample.turn, BreathingKind::Turn(*e), None)),
            );
            previous = Some(sample);
        }
        events
    }
}

fn breath(turn: usize, kind: BreathingKind, value: Option<f64>) -> BreathingEvent {
    BreathingEvent { turn, kind, value }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn trend(values: &[f64]) -> FatigueTrend {
    if values.len() < 2 {
        return FatigueTrend::Stable;
    }
    let (first, second) = values.split_at(values.len() / 2);
    let (a, b) = (mean(first), mean(second));
    if b > a + TREND_MARGIN {
        FatigueTrend::Rising
    } else if a > b + TREND_MARGIN {
        FatigueTrend::Falling
    } else {
        FatigueTrend::Stable
    }
}

fn total_variation(values: &[f64]) -> f64 {
    values.windows(2).map(|w| (w[1] - w[0]).abs()).sum()
}
