//! Pods: latent content entities that may surface back into a conversation.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::embedding::EmbeddingVector;

/// Opaque pod identifier. Random, carries no ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PodId(Uuid);

impl PodId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// First eight hex characters, for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for PodId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PodId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for PodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PodId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state. The only transition is `Latent -> Unveiled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodState {
    Latent,
    Unveiled,
}

impl fmt::Display for PodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latent => write!(f, "latent"),
            Self::Unveiled => write!(f, "unveiled"),
        }
    }
}

/// Default urgency weight used for tie-breaking.
pub const DEFAULT_URGENCY: f64 = 1.0;

/// A latent content entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    pub id: PodId,
    pub trigger_embedding: EmbeddingVector,
    pub content: String,
    pub state: PodState,
    /// Tie-break weight among equally similar candidates; higher wins.
    pub urgency: f64,
    pub created_at: DateTime<Utc>,
    pub unveiled_at: Option<DateTime<Utc>>,
}

impl Pod {
    /// A new latent pod.
    pub fn new(content: impl Into<String>, trigger_embedding: EmbeddingVector, urgency: f64) -> Self {
        Self {
            id: PodId::new(),
            trigger_embedding,
            content: content.into(),
            state: PodState::Latent,
            urgency,
            created_at: Utc::now(),
            unveiled_at: None,
        }
    }

    /// True while the pod can still surface.
    pub fn is_latent(&self) -> bool {
        self.state == PodState::Latent
    }
}

/// Which activation condition fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationCondition {
    /// Condition A: the conversation arrived near the pod's content.
    SemanticArrival,
    /// Condition B: hard fatigue and the pod is close enough to serve as an
    /// escape route.
    FatigueEscape,
}

impl fmt::Display for ActivationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SemanticArrival => write!(f, "semantic_arrival"),
            Self::FatigueEscape => write!(f, "fatigue_escape"),
        }
    }
}

/// Result of a successful pod detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PodMatch {
    pub id: PodId,
    pub similarity: f64,
    pub condition: ActivationCondition,
}

/// Similarity thresholds for the two activation conditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PodThresholds {
    /// Condition A: similarity strictly above this.
    pub high_similarity: f64,
    /// Condition B: hard fatigue and similarity strictly above this.
    pub fatigue_similarity: f64,
}

impl Default for PodThresholds {
    fn default() -> Self {
        Self {
            high_similarity: 0.85,
            fatigue_similarity: 0.50,
        }
    }
}

/// Persisted form of a pod. State is recorded for inspection only; a restore
/// always yields a latent pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRecord {
    pub content: String,
    pub trigger_embedding: EmbeddingVector,
    #[serde(default = "default_urgency")]
    pub urgency: f64,
    pub created_at: DateTime<Utc>,
    pub state: PodState,
}

fn default_urgency() -> f64 {
    DEFAULT_URGENCY
}

/// Cross-session pod archive: pod id to record.
pub type PodArchive = HashMap<PodId, PodRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_ids_are_unique() {
        let a = PodId::new();
        let b = PodId::new();
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn test_pod_id_round_trips_through_str() {
        let id = PodId::new();
        let parsed: PodId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_archive_keys_serialize_as_strings() {
        let mut archive = PodArchive::new();
        let id = PodId::new();
        archive.insert(
            id,
            PodRecord {
                content: "x".to_string(),
                trigger_embedding: EmbeddingVector::new(vec![1.0]),
                urgency: 1.0,
                created_at: Utc::now(),
                state: PodState::Unveiled,
            },
        );
        let json = serde_json::to_value(&archive).unwrap();
        assert!(json.get(id.to_string()).is_some());
    }

    #[test]
    fn test_record_urgency_defaults() {
        let json = serde_json::json!({
            "content": "c",
            "trigger_embedding": [0.5, 0.5],
            "created_at": "2026-01-01T00:00:00Z",
            "state": "unveiled"
        });
        let record: PodRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.urgency, DEFAULT_URGENCY);
    }
}
