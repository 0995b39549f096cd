//! Rhythm samples and per-session temporal signatures.
//!
//! A rhythm sample records how a turn "breathed" (fatigue, pacing, events)
//! rather than what was said. Signatures summarise a whole session and are
//! kept in the rhythm index across sessions.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fatigue::FatigueStatus;

/// Notable per-turn events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEvent {
    PodUnveiled,
    SoftFatigue,
    HardFatigue,
    ResidualAlerts,
    DegradedParse,
    /// The response drifted from the user's sustained direction.
    LowAlignment,
}

impl fmt::Display for TurnEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PodUnveiled => "pod_unveiled",
            Self::SoftFatigue => "soft_fatigue",
            Self::HardFatigue => "hard_fatigue",
            Self::ResidualAlerts => "residual_alerts",
            Self::DegradedParse => "degraded_parse",
            Self::LowAlignment => "low_alignment",
        })
    }
}

/// One committed turn as seen by the rhythm recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmSample {
    pub turn: usize,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau_h: Option<f64>,
    pub fatigue: f64,
    pub status: FatigueStatus,
    #[serde(default)]
    pub components: BTreeMap<String, f64>,
    #[serde(default)]
    pub events: Vec<TurnEvent>,
}

/// Direction of the fatigue series over a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueTrend {
    Rising,
    Falling,
    Stable,
}

impl fmt::Display for FatigueTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Stable => "stable",
        })
    }
}

/// Kind of a breathing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreathingKind {
    Pause,
    Acceleration,
    SoftFatigueOnset,
    HardFatigueOnset,
    Turn(TurnEvent),
}

/// A significant change in the session's rhythm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreathingEvent {
    pub turn: usize,
    pub kind: BreathingKind,
    /// τ_h delta for pause/acceleration, fatigue score for onsets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// Overall classification of a session's rhythm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DominantRhythm {
    Empty,
    Reflective,
    Exploratory,
    ReflectiveWithBurst,
    Fatiguing,
    Recovered,
    Steady,
}

impl fmt::Display for DominantRhythm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::Reflective => "reflective",
            Self::Exploratory => "exploratory",
            Self::ReflectiveWithBurst => "reflective_with_burst",
            Self::Fatiguing => "fatiguing",
            Self::Recovered => "recovered",
            Self::Steady => "steady",
        })
    }
}

/// Aggregate statistics of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmSignature {
    pub turns: usize,
    pub mean_fatigue: f64,
    pub peak_fatigue: f64,
    pub fatigue_trend: FatigueTrend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_tau_h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau_h_variance: Option<f64>,
    #[serde(default)]
    pub breathing_events: Vec<BreathingEvent>,
    pub dominant_rhythm: DominantRhythm,
    pub curvature_integral: f64,
}

impl RhythmSignature {
    /// Signature of a session with no committed turns.
    pub fn empty() -> Self {
        Self {
            turns: 0,
            mean_fatigue: 0.0,
            peak_fatigue: 0.0,
            fatigue_trend: FatigueTrend::Stable,
            mean_tau_h: None,
            tau_h_variance: None,
            breathing_events: Vec::new(),
            dominant_rhythm: DominantRhythm::Empty,
            curvature_integral: 0.0,
        }
    }
}

/// One session's entry in the rhythm index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmIndexEntry {
    pub session_id: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub signature: RhythmSignature,
}

/// Cross-session rhythm index, ordered by session end time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RhythmIndex {
    #[serde(default)]
    pub sessions: Vec<RhythmIndexEntry>,
}

impl RhythmIndex {
    /// Most recent entry, optionally restricted to one model label.
    pub fn latest(&self, model: Option<&str>) -> Option<&RhythmIndexEntry> {
        self.sessions
            .iter()
            .rev()
            .find(|e| model.map_or(true, |m| e.model == m))
    }
}
