//! Retry, fallback and circuit breaker behaviour of the orchestrator.

mod common;

use std::sync::Arc;

use common::{as_backends, echo_backend, numeric_embedder, test_config};
use vessel::adapters::backends::{structured_reply, ScriptedBackend};
use vessel::domain::models::{category, EmbeddingVector, ErrorClass};
use vessel::domain::ports::{BackendError, BackendRequest};
use vessel::services::{DirectionTracker, FatigueDetector, PodSpace, RetryOrchestrator, TurnContext};
use vessel::{ResponseValidator, TurnError};

fn orchestrator() -> RetryOrchestrator {
    let config = test_config();
    RetryOrchestrator::new(
        config.retry,
        ResponseValidator::new(config.validation),
        numeric_embedder(),
    )
}

fn request(message: &str) -> BackendRequest {
    BackendRequest {
        message: message.to_string(),
        ..BackendRequest::default()
    }
}

fn fixtures() -> (FatigueDetector, PodSpace) {
    let config = test_config();
    (FatigueDetector::new(config.fatigue), PodSpace::new(&config.pods))
}

#[tokio::test]
async fn test_fatal_error_aborts_without_fallback() {
    let first = echo_backend("first");
    first.push_error(BackendError::Http {
        status: 401,
        body: "unauthorized".to_string(),
    });
    let second = echo_backend("second");
    let backends = as_backends(&[Arc::clone(&first), Arc::clone(&second)]);

    let (detector, pods) = fixtures();
    let ctx = TurnContext::new(&detector, &pods);
    let err = orchestrator()
        .run_turn("primary", &backends, &request("at 1 0"), &ctx)
        .await
        .unwrap_err();

    match err {
        TurnError::Fatal {
            backend,
            diagnostics,
            ..
        } => {
            assert_eq!(backend, "first");
            assert_eq!(diagnostics.attempts.len(), 1);
            assert_eq!(diagnostics.attempts[0].error_class, Some(ErrorClass::Fatal));
        }
        other => panic!("expected fatal abort, got {other:?}"),
    }
    assert_eq!(second.calls(), 0, "fatal errors must not fall back");
}

#[tokio::test]
async fn test_transient_error_falls_back_to_next_rank() {
    let first = echo_backend("first");
    first.push_error(BackendError::Http {
        status: 429,
        body: "too many requests".to_string(),
    });
    let second = echo_backend("second");
    let backends = as_backends(&[Arc::clone(&first), Arc::clone(&second)]);

    let (detector, pods) = fixtures();
    let ctx = TurnContext::new(&detector, &pods);
    let outcome = orchestrator()
        .run_turn("primary", &backends, &request("at 1 0"), &ctx)
        .await
        .unwrap();

    assert!(outcome.is_clean());
    assert_eq!(outcome.candidate.backend, "second");
    assert_eq!(outcome.candidate.backend_rank, 1);
    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(outcome.attempts[0].error_class, Some(ErrorClass::Overload));
    assert!(outcome.attempts[1].succeeded);
}

#[tokio::test]
async fn test_all_backends_failing_is_exhaustion() {
    let first = echo_backend("first");
    first.push_error(BackendError::Transport("connection refused".to_string()));
    let second = echo_backend("second");
    second.push_error(BackendError::Timeout(5));
    let backends = as_backends(&[first, second]);

    let (detector, pods) = fixtures();
    let ctx = TurnContext::new(&detector, &pods);
    let err = orchestrator()
        .run_turn("primary", &backends, &request("at 1 0"), &ctx)
        .await
        .unwrap_err();

    match err {
        TurnError::BackendsExhausted {
            errors,
            diagnostics,
        } => {
            assert_eq!(errors.len(), 2);
            assert_eq!(diagnostics.attempts.len(), 2);
            assert!(diagnostics.last_error.is_some_and(|e| e.starts_with("second")));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_retry_sends_feedback_and_recovers() {
    let backend = Arc::new(
        ScriptedBackend::new("only").with_responses(["not json at all".to_string(), structured_reply("at 1 0")]),
    );
    let backends = as_backends(&[Arc::clone(&backend)]);

    let (detector, pods) = fixtures();
    let ctx = TurnContext::new(&detector, &pods);
    let mut orchestrator = orchestrator();
    let outcome = orchestrator
        .run_turn("primary", &backends, &request("at 1 0"), &ctx)
        .await
        .unwrap();

    assert!(outcome.is_clean());
    assert_eq!(outcome.retries, 1);
    assert_eq!(orchestrator.consecutive_failures(), 0, "clean validation resets the breaker");

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].feedback.is_none());
    let feedback = requests[1].feedback.as_deref().unwrap();
    assert!(feedback.starts_with("Attempt 1 was rejected by validation:"));
    assert!(feedback.contains(category::MISSING_FIELD));
}

#[tokio::test]
async fn test_retry_budget_exhaustion_returns_best_result() {
    let backend = Arc::new(ScriptedBackend::new("only").with_default("plain text"));
    let backends = as_backends(&[Arc::clone(&backend)]);

    let (detector, pods) = fixtures();
    let ctx = TurnContext::new(&detector, &pods);
    let outcome = orchestrator()
        .run_turn("primary", &backends, &request("hi"), &ctx)
        .await
        .unwrap();

    assert_eq!(outcome.retries, 2);
    assert_eq!(backend.calls(), 3);
    assert!(!outcome.residual_alerts.is_empty());
    assert_eq!(outcome.candidate.outcome.turn().visible_text, "plain text");
}

#[tokio::test]
async fn test_breaker_trips_across_turns() {
    let backend = Arc::new(ScriptedBackend::new("only").with_default("plain text"));
    let backends = as_backends(&[backend]);

    let (detector, pods) = fixtures();
    let ctx = TurnContext::new(&detector, &pods);
    let mut orchestrator = orchestrator();

    // First turn: two retries, then the best degraded result.
    orchestrator
        .run_turn("primary", &backends, &request("hi"), &ctx)
        .await
        .unwrap();
    assert_eq!(orchestrator.consecutive_failures(), 2);

    // Second turn: the first rejection reaches the threshold of three.
    let err = orchestrator
        .run_turn("primary", &backends, &request("hi again"), &ctx)
        .await
        .unwrap_err();
    match err {
        TurnError::CircuitBreaker {
            consecutive_failures,
            diagnostics,
        } => {
            assert_eq!(consecutive_failures, 3);
            assert_eq!(diagnostics.retries, 1);
            assert!(!diagnostics.last_alerts.is_empty());
        }
        other => panic!("expected breaker trip, got {other:?}"),
    }
    assert_eq!(orchestrator.consecutive_failures(), 0, "breaker resets after tripping");
}

#[tokio::test]
async fn test_no_backends() {
    let (detector, pods) = fixtures();
    let ctx = TurnContext::new(&detector, &pods);
    let err = orchestrator()
        .run_turn("critic", &[], &request("hi"), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::NoBackends { role } if role == "critic"));
}

#[tokio::test]
async fn test_direction_modulation_lets_pod_match() {
    let (detector, mut pods) = fixtures();
    let id = pods.create("north", EmbeddingVector::new(vec![1.0, 0.0]));
    let backends = as_backends(&[echo_backend("echo")]);
    // cos((3, 2), (1, 0)) is about 0.83, under the 0.85 arrival threshold.
    let plain = orchestrator()
        .run_turn("primary", &backends, &request("at 3 2"), &TurnContext::new(&detector, &pods))
        .await
        .unwrap();
    assert!(plain.candidate.pod_match.is_none());

    let direction = DirectionTracker::default().advanced(&EmbeddingVector::new(vec![1.0, 0.0]), 0.5);
    let ctx = TurnContext::new(&detector, &pods).with_direction(&direction, 0.3);
    let modulated = orchestrator()
        .run_turn("primary", &backends, &request("at 3 2"), &ctx)
        .await
        .unwrap();
    let matched = modulated.candidate.pod_match.expect("modulated embedding reaches the pod");
    assert_eq!(matched.id, id);
    assert!(matched.similarity > 0.85);
    assert_eq!(modulated.candidate.embedding, EmbeddingVector::new(vec![3.0, 2.0]));
}
