//! A conversation session: the single owner and mutator of per-session state.
//!
//! Turns run strictly one at a time (`&mut self`). Every store is updated
//! only after the orchestrator reports `Succeeded`; an abort leaves the
//! session exactly as it was.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{AbortDiagnostics, DomainResult, TurnError};
use crate::domain::models::{
    CommittedTurn, Config, ConversationConfig, DirectionConfig, EmbeddingVector, FatigueSample,
    ParseKind, PersistenceConfig, PodId, RhythmIndexEntry, RhythmSignature, TurnEvent, UnveiledPod,
    ValidationAlert,
};
use crate::domain::ports::{ArchiveStore, Backend, BackendRequest, EmbeddingSource};
use crate::services::conversation_store::ConversationStore;
use crate::services::direction::{DirectionTracker, RESTING_PULSE};
use crate::services::fatigue_detector::FatigueDetector;
use crate::services::pod_space::PodSpace;
use crate::services::pulse_estimator::{modulate_thresholds, PulseEstimator};
use crate::services::recapitulation::{prior_session_memory, recapitulation, rhythm_summary};
use crate::services::response_validator::ResponseValidator;
use crate::services::retry_orchestrator::{RetryOrchestrator, TurnContext};
use crate::services::rhythm::RhythmRecorder;

/// What the caller sees after a committed turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub index: usize,
    pub visible_text: String,
    pub parse: ParseKind,
    pub backend: String,
    pub fatigue: FatigueSample,
    pub residual_alerts: Vec<ValidationAlert>,
    pub unveiled_pod: Option<UnveiledPod>,
    pub tau_h: Option<f64>,
    /// Response alignment with the user's direction, when tracked.
    pub alignment: Option<f64>,
    pub retries: u32,
}

/// One conversation with its detector, pods, store and orchestrator.
pub struct Session {
    id: String,
    role: String,
    backends: Vec<Arc<dyn Backend>>,
    system_prompt: Option<String>,
    detector: FatigueDetector,
    pods: PodSpace,
    store: ConversationStore,
    orchestrator: RetryOrchestrator,
    pulse: Option<PulseEstimator>,
    modulate_thresholds: bool,
    direction: Option<DirectionTracker>,
    direction_config: DirectionConfig,
    rhythm: RhythmRecorder,
    paused: Arc<AtomicBool>,
    conversation: ConversationConfig,
    persistence: PersistenceConfig,
    archive: Option<Arc<dyn ArchiveStore>>,
    previous_rhythm: Option<RhythmIndexEntry>,
    recapitulation: Option<String>,
    /// Notes for the next request; replaced on every commit.
    pending_context: Vec<String>,
}

impl Session {
    /// Build a session for `role` over the ranked `backends`.
    ///
    /// `model_label` is the name the session's ledger and rhythm entry are
    /// filed under.
    pub fn new(
        config: &Config,
        role: impl Into<String>,
        model_label: impl Into<String>,
        backends: Vec<Arc<dyn Backend>>,
        embedder: Arc<dyn EmbeddingSource>,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let detector = FatigueDetector::new(config.fatigue.clone());
        let thresholds = detector.config().thresholds();
        Self {
            store: ConversationStore::new(&id, model_label),
            id,
            role: role.into(),
            backends,
            system_prompt: None,
            detector,
            pods: PodSpace::new(&config.pods),
            orchestrator: RetryOrchestrator::new(
                config.retry.clone(),
                ResponseValidator::new(config.validation.clone()),
                embedder,
            ),
            pulse: config.pulse.enabled.then(PulseEstimator::default),
            modulate_thresholds: config.pulse.enabled && config.pulse.modulate_thresholds,
            direction: config.direction.enabled.then(DirectionTracker::default),
            direction_config: config.direction.clone(),
            rhythm: RhythmRecorder::new(thresholds),
            paused: Arc::new(AtomicBool::new(false)),
            conversation: config.conversation.clone(),
            persistence: config.persistence.clone(),
            archive: None,
            previous_rhythm: None,
            recapitulation: None,
            pending_context: Vec::new(),
        }
    }

    /// Attach an archive: restores pods, reads the latest rhythm entry for
    /// this session's model and builds the recapitulation of that session.
    pub fn with_archive(mut self, archive: Arc<dyn ArchiveStore>) -> DomainResult<Self> {
        self.pods.restore(archive.load_pods()?);
        let pruned = self.pods.prune_expired();
        if !pruned.is_empty() {
            debug!(count = pruned.len(), "Dropped dormant pods on restore");
        }
        self.previous_rhythm = archive
            .load_rhythm_index()?
            .latest(Some(self.store.model()))
            .cloned();

        if let (true, Some(entry)) = (self.conversation.recapitulate, self.previous_rhythm.as_ref()) {
            let memory = archive
                .load_ledger(self.store.model(), &entry.session_id)?
                .and_then(|ledger| {
                    prior_session_memory(
                        &ledger,
                        self.conversation.recap_turns,
                        self.conversation.recap_entry_chars,
                    )
                });
            let rhythm = rhythm_summary(&entry.signature, self.detector.config().soft_threshold);
            self.recapitulation = recapitulation(memory, rhythm);
            if self.recapitulation.is_some() {
                debug!(previous = %entry.session_id, "Recapitulating prior session");
            }
        }

        self.archive = Some(archive);
        Ok(self)
    }

    /// Opaque system prompt sent with every request.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Role whose ranked backends this session uses.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Committed turns.
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Fatigue detector state.
    pub fn detector(&self) -> &FatigueDetector {
        &self.detector
    }

    /// Pods.
    pub fn pods(&self) -> &PodSpace {
        &self.pods
    }

    /// Rhythm recorder.
    pub fn rhythm(&self) -> &RhythmRecorder {
        &self.rhythm
    }

    /// Orchestrator (breaker state, policy).
    pub fn orchestrator(&self) -> &RetryOrchestrator {
        &self.orchestrator
    }

    /// The previous session's rhythm entry for this model, if archived.
    pub fn previous_rhythm(&self) -> Option<&RhythmIndexEntry> {
        self.previous_rhythm.as_ref()
    }

    /// Context carried over from this model's previous session.
    pub fn recapitulation(&self) -> Option<&str> {
        self.recapitulation.as_deref()
    }

    /// Sustained-direction tracker, when enabled.
    pub fn direction(&self) -> Option<&DirectionTracker> {
        self.direction.as_ref()
    }

    /// Shared pause flag, for callers that pause from elsewhere.
    pub fn pause_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.paused)
    }

    /// Refuse new turns until resumed.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Accept turns again.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// True while paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Stash a pod triggered by the embedding of `content`.
    pub async fn add_pod(&mut self, content: &str, urgency: f64) -> DomainResult<PodId> {
        let trigger = self.orchestrator.embedder().embed(content).await?;
        Ok(self.pods.create_with_urgency(content, trigger, urgency))
    }

    /// Clear detector, pulse, direction and breaker history. Committed
    /// turns are kept.
    pub fn reset(&mut self) {
        self.detector.reset();
        if let Some(pulse) = self.pulse.as_mut() {
            pulse.reset();
        }
        if let Some(direction) = self.direction.as_mut() {
            direction.reset();
        }
        self.orchestrator.reset_breaker();
        info!(session_id = %self.id, "Session dynamics reset");
    }

    /// Run one turn and commit it.
    pub async fn turn(&mut self, message: &str) -> Result<TurnReport, TurnError> {
        if self.is_paused() {
            return Err(TurnError::Paused);
        }

        let user_embedding = self.embed_user(message).await?;
        let reading = match (self.pulse.as_ref(), user_embedding.as_ref()) {
            (Some(pulse), Some(embedding)) => Some(pulse.estimate(message, embedding, Utc::now())),
            _ => None,
        };
        let tau_h = reading.as_ref().map(|r| r.tau);
        let next_direction = match (self.direction.as_ref(), user_embedding.as_ref()) {
            (Some(tracker), Some(embedding)) => {
                Some(tracker.advanced(embedding, tau_h.unwrap_or(RESTING_PULSE)))
            }
            _ => None,
        };

        let mut fatigue_thresholds = self.detector.config().thresholds();
        let mut pod_thresholds = self.pods.thresholds();
        if let (true, Some(tau)) = (self.modulate_thresholds, tau_h) {
            (fatigue_thresholds, pod_thresholds) =
                modulate_thresholds(tau, fatigue_thresholds, pod_thresholds);
        }

        let request = BackendRequest {
            message: message.to_string(),
            history: self
                .store
                .history(self.conversation.history_limit, self.conversation.history_entry_chars),
            feedback: None,
            system: self.system_prompt.clone(),
            context: self
                .recapitulation
                .iter()
                .chain(&self.pending_context)
                .cloned()
                .collect(),
        };
        let mut ctx = TurnContext {
            fatigue_thresholds,
            pod_thresholds,
            ..TurnContext::new(&self.detector, &self.pods)
        };
        if let Some(tracker) = next_direction.as_ref() {
            ctx = ctx.with_direction(tracker, self.direction_config.modulation_strength);
        }
        let outcome = self
            .orchestrator
            .run_turn(&self.role, &self.backends, &request, &ctx)
            .await?;

        // Succeeded: commit in one pass.
        let candidate = outcome.candidate;
        self.detector.record(&candidate.embedding, None, &candidate.fatigue);

        let unveiled_pod = candidate.pod_match.and_then(|m| {
            self.pods.unveil(&m.id).map(|content| UnveiledPod {
                id: m.id,
                content,
                condition: m.condition,
                similarity: m.similarity,
            })
        });

        self.pending_context = unveiled_pod
            .iter()
            .map(|pod| format!("[Pod Unveiled, similarity {:.3}]: {}", pod.similarity, pod.content))
            .collect();

        let alignment = next_direction
            .as_ref()
            .map(|tracker| tracker.alignment(&candidate.embedding));
        if let Some(tracker) = next_direction {
            self.direction = Some(tracker);
        }

        let parse = candidate.outcome.kind();
        let mut events = Vec::new();
        if unveiled_pod.is_some() {
            events.push(TurnEvent::PodUnveiled);
        }
        if alignment.is_some_and(|a| a < self.direction_config.low_alignment_threshold) {
            events.push(TurnEvent::LowAlignment);
        }
        if !outcome.residual_alerts.is_empty() {
            events.push(TurnEvent::ResidualAlerts);
        }
        if parse == ParseKind::Degraded {
            events.push(TurnEvent::DegradedParse);
        }

        let index = self.store.append(CommittedTurn {
            index: self.store.len(),
            user_message: message.to_string(),
            result: candidate.outcome.into_turn(),
            parse,
            backend: candidate.backend.clone(),
            model_identifier: candidate.response.model_identifier.clone(),
            fatigue: candidate.fatigue.clone(),
            residual_alerts: outcome.residual_alerts.clone(),
            unveiled_pod: unveiled_pod.clone(),
            tau_h,
            alignment,
            retries: outcome.retries,
            committed_at: Utc::now(),
        });

        if let (Some(pulse), Some(reading)) = (self.pulse.as_mut(), reading) {
            pulse.commit(reading);
        }
        self.rhythm.record(&candidate.fatigue, tau_h, events);

        info!(
            session_id = %self.id,
            turn_index = index,
            backend = %candidate.backend,
            score = candidate.fatigue.score,
            retries = outcome.retries,
            residual = outcome.residual_alerts.len(),
            "Turn committed"
        );

        let every = self.persistence.autosave_every;
        if every > 0 && self.store.len() % every == 0 {
            if let Err(e) = self.save() {
                warn!(session_id = %self.id, error = %e, "Autosave failed");
            }
        }

        let visible_text = self
            .store
            .last()
            .map(|t| t.result.visible_text.clone())
            .unwrap_or_default();
        Ok(TurnReport {
            index,
            visible_text,
            parse,
            backend: candidate.backend,
            fatigue: candidate.fatigue,
            residual_alerts: outcome.residual_alerts,
            unveiled_pod,
            tau_h,
            alignment,
            retries: outcome.retries,
        })
    }

    /// Persist pods and the ledger so far.
    pub fn save(&self) -> DomainResult<()> {
        let Some(archive) = self.archive.as_ref() else {
            return Ok(());
        };
        archive.save_pods(&self.pods.archive())?;
        archive.save_ledger(&self.store.ledger(None))?;
        debug!(session_id = %self.id, turns = self.store.len(), "Session saved");
        Ok(())
    }

    /// Close the session: write the final ledger, pods and rhythm entry.
    pub fn end(&mut self) -> DomainResult<RhythmSignature> {
        let signature = self.rhythm.signature();
        let ended_at = Utc::now();
        if let Some(archive) = self.archive.as_ref() {
            archive.save_pods(&self.pods.archive())?;
            archive.save_ledger(&self.store.ledger(Some(ended_at)))?;
            let mut index = archive.load_rhythm_index()?;
            index.sessions.retain(|e| e.session_id != self.id);
            index.sessions.push(RhythmIndexEntry {
                session_id: self.id.clone(),
                model: self.store.model().to_string(),
                started_at: self.store.started_at(),
                ended_at,
                signature: signature.clone(),
            });
            archive.save_rhythm_index(&index)?;
            info!(
                session_id = %self.id,
                turns = signature.turns,
                rhythm = ?signature.dominant_rhythm,
                "Session archived"
            );
        }
        Ok(signature)
    }

    /// Embedding of the user message, computed only when pulse or direction
    /// tracking needs it.
    async fn embed_user(&self, message: &str) -> Result<Option<EmbeddingVector>, TurnError> {
        if self.pulse.is_none() && self.direction.is_none() {
            return Ok(None);
        }
        let embedding = self
            .orchestrator
            .embedder()
            .embed(message)
            .await
            .map_err(|e| TurnError::Embedding {
                message: e.to_string(),
                diagnostics: AbortDiagnostics::default(),
            })?;
        Ok(Some(embedding))
    }
}
