//! Drives one turn through attempt, validation and retry.
//!
//! ```text
//! Attempting ──ok──▶ Validating ──clean──▶ Succeeded
//!     │                  │
//!     │ fatal/exhausted  │ alerts, budget left
//!     ▼                  ▼
//!  Aborted ◀──breaker── Retrying ──▶ Attempting (with feedback)
//!                        │
//!                        └─ budget spent ──▶ Succeeded (best result + residual alerts)
//! ```
//!
//! The orchestrator reads the detector and pod space but never writes them;
//! the session commits the chosen candidate afterwards.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::errors::{AbortDiagnostics, TurnError};
use crate::domain::models::{
    alert_weight, EmbeddingVector, ErrorClass, FatigueSample, FatigueThresholds, ModelAttempt,
    ParseOutcome, PodMatch, PodThresholds, RetryConfig, ValidationAlert,
};
use crate::domain::ports::{Backend, BackendRequest, BackendResponse, EmbeddingSource};
use crate::services::direction::DirectionTracker;
use crate::services::fatigue_detector::FatigueDetector;
use crate::services::pod_space::PodSpace;
use crate::services::response_validator::ResponseValidator;
use crate::services::turn_parser::parse_turn;

/// Read-only session state a turn is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub detector: &'a FatigueDetector,
    pub pods: &'a PodSpace,
    pub fatigue_thresholds: FatigueThresholds,
    pub pod_thresholds: PodThresholds,
    /// When set, pod detection sees the embedding pulled toward this
    /// direction by `modulation_strength`.
    pub direction: Option<&'a DirectionTracker>,
    pub modulation_strength: f64,
}

impl<'a> TurnContext<'a> {
    /// Context using the detector's and pod space's own thresholds.
    pub fn new(detector: &'a FatigueDetector, pods: &'a PodSpace) -> Self {
        Self {
            detector,
            pods,
            fatigue_thresholds: detector.config().thresholds(),
            pod_thresholds: pods.thresholds(),
            direction: None,
            modulation_strength: 0.0,
        }
    }

    /// Modulate pod detection by a sustained direction.
    pub fn with_direction(mut self, direction: &'a DirectionTracker, strength: f64) -> Self {
        self.direction = Some(direction);
        self.modulation_strength = strength;
        self
    }
}

/// One validated backend response.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub backend: String,
    pub backend_rank: usize,
    pub response: BackendResponse,
    pub outcome: ParseOutcome,
    pub embedding: EmbeddingVector,
    pub fatigue: FatigueSample,
    pub pod_match: Option<PodMatch>,
    pub alerts: Vec<ValidationAlert>,
}

/// A turn that reached `Succeeded`.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub candidate: Candidate,
    pub attempts: Vec<ModelAttempt>,
    pub retries: u32,
    /// Alerts on the chosen candidate; empty for a clean turn.
    pub residual_alerts: Vec<ValidationAlert>,
}

impl TurnOutcome {
    /// True when the chosen candidate had no alerts.
    pub fn is_clean(&self) -> bool {
        self.residual_alerts.is_empty()
    }
}

/// Validation retry loop with backend fallback and a consecutive-failure
/// circuit breaker.
pub struct RetryOrchestrator {
    policy: RetryConfig,
    validator: ResponseValidator,
    embedder: Arc<dyn EmbeddingSource>,
    consecutive_failures: u32,
}

impl RetryOrchestrator {
    /// Create an orchestrator.
    pub fn new(
        policy: RetryConfig,
        validator: ResponseValidator,
        embedder: Arc<dyn EmbeddingSource>,
    ) -> Self {
        Self {
            policy,
            validator,
            embedder,
            consecutive_failures: 0,
        }
    }

    /// Retry policy in force.
    pub fn policy(&self) -> &RetryConfig {
        &self.policy
    }

    /// Embedding source used for candidates.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingSource> {
        &self.embedder
    }

    /// Rolling count of Retrying transitions since the last clean validation.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Clear the rolling failure count.
    pub fn reset_breaker(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Run one turn to `Succeeded` or a typed abort.
    pub async fn run_turn(
        &mut self,
        role: &str,
        backends: &[Arc<dyn Backend>],
        request: &BackendRequest,
        ctx: &TurnContext<'_>,
    ) -> Result<TurnOutcome, TurnError> {
        if backends.is_empty() {
            return Err(TurnError::NoBackends {
                role: role.to_string(),
            });
        }

        let turn_index = ctx.detector.next_turn_index();
        let mut diagnostics = AbortDiagnostics::default();
        let mut feedback: Vec<String> = Vec::new();
        let mut best: Option<Candidate> = None;
        let mut retries: u32 = 0;

        loop {
            let mut attempt_request = request.clone();
            if !feedback.is_empty() {
                attempt_request.feedback = Some(feedback.join("\n\n"));
            }

            let (backend_rank, backend, response) = self
                .attempt(backends, attempt_request, turn_index, &mut diagnostics)
                .await?;

            let candidate = match self
                .validate(backend_rank, backend, response, ctx)
                .await
            {
                Ok(candidate) => candidate,
                Err(message) => {
                    diagnostics.retries = retries;
                    return Err(TurnError::Embedding {
                        message,
                        diagnostics,
                    });
                }
            };
            diagnostics.last_alerts.clone_from(&candidate.alerts);

            if candidate.alerts.is_empty() {
                self.consecutive_failures = 0;
                info!(
                    turn_index,
                    backend = %candidate.backend,
                    score = candidate.fatigue.score,
                    retries,
                    "Turn validated"
                );
                return Ok(TurnOutcome {
                    candidate,
                    attempts: diagnostics.attempts,
                    retries,
                    residual_alerts: Vec::new(),
                });
            }

            let alerts = candidate.alerts.clone();
            let keep_new = best
                .as_ref()
                .map_or(true, |b| alert_weight(&candidate.alerts) <= alert_weight(&b.alerts));
            if keep_new {
                best = Some(candidate);
            }

            if retries >= self.policy.max_retries {
                if let Some(chosen) = best.take() {
                    warn!(
                        turn_index,
                        retries,
                        residual = chosen.alerts.len(),
                        "Retry budget exhausted, using best available result"
                    );
                    return Ok(TurnOutcome {
                        residual_alerts: chosen.alerts.clone(),
                        candidate: chosen,
                        attempts: diagnostics.attempts,
                        retries,
                    });
                }
            }

            retries += 1;
            diagnostics.retries = retries;
            self.consecutive_failures += 1;
            if self.consecutive_failures >= self.policy.consecutive_failure_threshold {
                let consecutive_failures = self.consecutive_failures;
                self.consecutive_failures = 0;
                warn!(
                    turn_index,
                    consecutive_failures,
                    retries,
                    "Circuit breaker tripped"
                );
                return Err(TurnError::CircuitBreaker {
                    consecutive_failures,
                    diagnostics,
                });
            }

            info!(
                turn_index,
                retries,
                alerts = alerts.len(),
                consecutive_failures = self.consecutive_failures,
                "Retrying with validation feedback"
            );
            feedback.push(format_feedback(retries, &alerts));
        }
    }

    /// Walk the ranked backends until one answers.
    async fn attempt(
        &self,
        backends: &[Arc<dyn Backend>],
        request: BackendRequest,
        turn_index: usize,
        diagnostics: &mut AbortDiagnostics,
    ) -> Result<(usize, String, BackendResponse), TurnError> {
        let per_backend = self.policy.per_backend_attempts.max(1);
        let mut errors = Vec::new();
        let mut pending_backoff: Option<Duration> = None;
        let mut failures: u32 = 0;

        for (rank, backend) in backends.iter().enumerate() {
            let name = backend.name().to_string();
            if rank > 0 {
                info!(turn_index, backend = %name, rank, "Falling back to next backend");
            }
            for _ in 0..per_backend {
                if let Some(delay) = pending_backoff.take() {
                    debug!(delay_ms = delay.as_millis() as u64, "Backing off");
                    tokio::time::sleep(delay).await;
                }

                debug!(turn_index, backend = %name, rank, "Invoking backend");
                match backend.invoke(request.clone()).await {
                    Ok(response) => {
                        diagnostics.attempts.push(ModelAttempt::success(rank, &name));
                        return Ok((rank, name, response));
                    }
                    Err(err) => {
                        let message = err.to_string();
                        let class = ErrorClass::classify(&message);
                        warn!(
                            turn_index,
                            backend = %name,
                            rank,
                            error_class = %class,
                            error = %message,
                            "Backend invocation failed"
                        );
                        diagnostics
                            .attempts
                            .push(ModelAttempt::failure(rank, &name, class, &message));
                        diagnostics.last_error = Some(format!("{name}: {message}"));

                        if class == ErrorClass::Fatal {
                            return Err(TurnError::Fatal {
                                backend: name,
                                message,
                                diagnostics: std::mem::take(diagnostics),
                            });
                        }
                        errors.push(format!("{name}: {message}"));
                        pending_backoff = Some(self.backoff_delay(failures, class));
                        failures += 1;
                    }
                }
            }
        }

        warn!(turn_index, failures, "All ranked backends failed");
        Err(TurnError::BackendsExhausted {
            errors,
            diagnostics: std::mem::take(diagnostics),
        })
    }

    /// Parse, embed, score and validate one response.
    async fn validate(
        &self,
        backend_rank: usize,
        backend: String,
        response: BackendResponse,
        ctx: &TurnContext<'_>,
    ) -> Result<Candidate, String> {
        let outcome = parse_turn(&response.text);
        let embedding = self
            .embedder
            .embed(&outcome.turn().visible_text)
            .await
            .map_err(|e| e.to_string())?;
        let fatigue = ctx.detector.evaluate_with_thresholds(
            &embedding,
            None,
            response.token_probabilities.as_ref(),
            ctx.fatigue_thresholds,
        );
        let modulated = ctx
            .direction
            .map(|d| d.modulate(&embedding, ctx.modulation_strength));
        let pod_match = ctx.pods.detect_with_thresholds(
            modulated.as_ref().unwrap_or(&embedding),
            &fatigue,
            ctx.pod_thresholds,
        );
        let alerts = self.validator.validate(outcome.turn(), Some(&fatigue));

        Ok(Candidate {
            backend,
            backend_rank,
            response,
            outcome,
            embedding,
            fatigue,
            pod_match,
            alerts,
        })
    }

    /// `initial * 2^n`, multiplied for overload, capped at the maximum.
    pub fn backoff_delay(&self, failures: u32, class: ErrorClass) -> Duration {
        let base = self
            .policy
            .initial_backoff_ms
            .saturating_mul(1u64 << failures.min(20));
        let ms = if class == ErrorClass::Overload {
            base.saturating_mul(self.policy.overload_multiplier.max(1))
        } else {
            base
        };
        Duration::from_millis(ms.min(self.policy.max_backoff_ms))
    }
}

/// Alerts rendered as feedback for the next attempt.
fn format_feedback(attempt: u32, alerts: &[ValidationAlert]) -> String {
    let lines: Vec<String> = alerts.iter().map(|a| format!("- {a}")).collect();
    format!(
        "Attempt {attempt} was rejected by validation:\n{}",
        lines.join("\n")
    )
}
