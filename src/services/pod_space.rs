//! Pod space: an unordered set of latent content entities.
//!
//! Pods are keyed by a random [`PodId`]; nothing about the collection encodes
//! creation order. Detection is read-only so the orchestrator can run it on
//! every candidate response, while [`PodSpace::unveil`] is applied only to the
//! committed one.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActivationCondition, EmbeddingVector, FatigueSample, Pod, PodArchive, PodConfig, PodId,
    PodMatch, PodRecord, PodState, PodThresholds, DEFAULT_URGENCY,
};

/// Collection of pods for one session.
#[derive(Debug, Clone, Default)]
pub struct PodSpace {
    pods: HashMap<PodId, Pod>,
    thresholds: PodThresholds,
    dormancy_ttl: Option<Duration>,
}

impl PodSpace {
    /// Empty pod space with the given activation settings.
    pub fn new(config: &PodConfig) -> Self {
        Self {
            pods: HashMap::new(),
            thresholds: config.thresholds(),
            dormancy_ttl: config
                .dormancy_ttl_secs
                .and_then(|secs| i64::try_from(secs).ok())
                .map(Duration::seconds),
        }
    }

    /// Configured activation thresholds.
    pub fn thresholds(&self) -> PodThresholds {
        self.thresholds
    }

    /// Insert a latent pod with the default urgency.
    pub fn create(&mut self, content: impl Into<String>, trigger: EmbeddingVector) -> PodId {
        self.create_with_urgency(content, trigger, DEFAULT_URGENCY)
    }

    /// Insert a latent pod. Non-finite urgency falls back to the default.
    pub fn create_with_urgency(
        &mut self,
        content: impl Into<String>,
        trigger: EmbeddingVector,
        urgency: f64,
    ) -> PodId {
        let urgency = if urgency.is_finite() { urgency } else { DEFAULT_URGENCY };
        let pod = Pod::new(content, trigger, urgency);
        let id = pod.id;
        debug!(pod_id = %id, urgency, "Pod created");
        self.pods.insert(id, pod);
        id
    }

    /// Best latent pod for this turn under the configured thresholds.
    pub fn detect(&self, embedding: &EmbeddingVector, sample: &FatigueSample) -> Option<PodMatch> {
        self.detect_with_thresholds(embedding, sample, self.thresholds)
    }

    /// Best latent pod for this turn under explicit thresholds.
    ///
    /// Highest similarity wins; ties go to higher urgency, then earlier
    /// creation.
    pub fn detect_with_thresholds(
        &self,
        embedding: &EmbeddingVector,
        sample: &FatigueSample,
        thresholds: PodThresholds,
    ) -> Option<PodMatch> {
        let now = Utc::now();
        self.pods
            .values()
            .filter(|p| p.is_latent() && !self.is_expired(p, now))
            .filter_map(|pod| {
                let similarity = embedding.cosine_similarity(&pod.trigger_embedding);
                let condition = if similarity > thresholds.high_similarity {
                    ActivationCondition::SemanticArrival
                } else if sample.hard_flag && similarity > thresholds.fatigue_similarity {
                    ActivationCondition::FatigueEscape
                } else {
                    return None;
                };
                Some((pod, similarity, condition))
            })
            .max_by(|(a, sa, _), (b, sb, _)| {
                sa.total_cmp(sb)
                    .then_with(|| a.urgency.total_cmp(&b.urgency))
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
            })
            .map(|(pod, similarity, condition)| PodMatch {
                id: pod.id,
                similarity,
                condition,
            })
    }

    /// Transition a latent pod to unveiled and hand back its content.
    ///
    /// Unknown or already-unveiled ids are a no-op returning `None`.
    pub fn unveil(&mut self, id: &PodId) -> Option<String> {
        let pod = self.pods.get_mut(id).filter(|p| p.is_latent())?;
        pod.state = PodState::Unveiled;
        pod.unveiled_at = Some(Utc::now());
        info!(pod_id = %id, "Pod unveiled");
        Some(pod.content.clone())
    }

    /// Look up a pod.
    pub fn get(&self, id: &PodId) -> Option<&Pod> {
        self.pods.get(id)
    }

    /// Look up a pod by full id or unique id prefix.
    pub fn resolve(&self, prefix: &str) -> DomainResult<PodId> {
        let prefix = prefix.trim().to_lowercase();
        let mut matches = self
            .pods
            .keys()
            .filter(|id| id.to_string().starts_with(&prefix));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(*id),
            (Some(_), Some(_)) => Err(DomainError::ValidationFailed(format!(
                "pod id prefix '{prefix}' is ambiguous"
            ))),
            (None, _) => Err(DomainError::ValidationFailed(format!(
                "no pod matches '{prefix}'"
            ))),
        }
    }

    /// All pods, newest first.
    pub fn list(&self) -> Vec<&Pod> {
        let mut pods: Vec<&Pod> = self.pods.values().collect();
        pods.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pods
    }

    /// Number of pods.
    pub fn len(&self) -> usize {
        self.pods.len()
    }

    /// True when there are no pods.
    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    /// Number of pods still latent.
    pub fn latent_count(&self) -> usize {
        self.pods.values().filter(|p| p.is_latent()).count()
    }

    /// Remove latent pods past the dormancy TTL. Returns the removed ids.
    pub fn prune_expired(&mut self) -> Vec<PodId> {
        let now = Utc::now();
        let expired: Vec<PodId> = self
            .pods
            .values()
            .filter(|p| p.is_latent() && self.is_expired(p, now))
            .map(|p| p.id)
            .collect();
        for id in &expired {
            self.pods.remove(id);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "Pruned dormant pods");
        }
        expired
    }

    /// Serialize the full pod set.
    pub fn archive(&self) -> PodArchive {
        self.pods
            .values()
            .map(|p| {
                (
                    p.id,
                    PodRecord {
                        content: p.content.clone(),
                        trigger_embedding: p.trigger_embedding.clone(),
                        urgency: p.urgency,
                        created_at: p.created_at,
                        state: p.state,
                    },
                )
            })
            .collect()
    }

    /// Replace the pod set from an archive. Every pod comes back latent.
    pub fn restore(&mut self, archive: PodArchive) {
        self.pods = archive
            .into_iter()
            .map(|(id, record)| {
                (
                    id,
                    Pod {
                        id,
                        trigger_embedding: record.trigger_embedding,
                        content: record.content,
                        state: PodState::Latent,
                        urgency: if record.urgency.is_finite() {
                            record.urgency
                        } else {
                            DEFAULT_URGENCY
                        },
                        created_at: record.created_at,
                        unveiled_at: None,
                    },
                )
            })
            .collect();
        debug!(count = self.pods.len(), "Pods restored");
    }

    fn is_expired(&self, pod: &Pod, now: DateTime<Utc>) -> bool {
        self.dormancy_ttl
            .is_some_and(|ttl| now.signed_duration_since(pod.created_at) > ttl)
    }
}
