//! End-to-end session behaviour over scripted backends.

mod common;

use std::sync::Arc;

use common::{as_backends, echo_backend, numeric_embedder, temp_dir, test_config};
use vessel::adapters::backends::{structured_reply, ScriptedBackend};
use vessel::domain::models::{
    ActivationCondition, DominantRhythm, FatigueModel, FatigueTrend, LedgerEvent, ParseKind,
    TurnEvent,
};
use vessel::domain::ports::{ArchiveStore, BackendError};
use vessel::infrastructure::persistence::SessionArchive;
use vessel::{Session, TurnError};

fn session_with(backend: Arc<ScriptedBackend>) -> Session {
    Session::new(
        &test_config(),
        "primary",
        "scripted",
        as_backends(&[backend]),
        numeric_embedder(),
    )
}

#[tokio::test]
async fn test_straight_line_conversation_fatigues() {
    common::setup_test_logging();
    let mut session = session_with(echo_backend("echo"));

    let mut scores = Vec::new();
    for step in 0..4 {
        let report = session.turn(&format!("at 10 {step}")).await.unwrap();
        assert_eq!(report.index, step);
        assert_eq!(report.parse, ParseKind::Parsed);
        assert_eq!(report.fatigue.model_used, FatigueModel::B);
        assert!(report.residual_alerts.is_empty());
        scores.push(report.fatigue.score);
    }

    let expected = [0.0, 0.35, 0.70, 1.0];
    for (score, want) in scores.iter().zip(expected) {
        assert!((score - want).abs() < 1e-9, "scores {scores:?}");
    }

    let last = session.store().last().unwrap();
    assert!(last.fatigue.hard_flag);
    assert_eq!(session.store().len(), 4);
    assert!(session.detector().embeddings().len() <= 5);
    assert!(matches!(
        session.store().events().last(),
        Some(LedgerEvent::HardFatigue { turn: 3, .. })
    ));

    let signature = session.rhythm().signature();
    assert_eq!(signature.turns, 4);
    assert_eq!(signature.fatigue_trend, FatigueTrend::Rising);
    assert_eq!(signature.dominant_rhythm, DominantRhythm::Fatiguing);
}

#[tokio::test]
async fn test_aborted_turn_leaves_state_untouched() {
    let backend = echo_backend("echo");
    let mut session = session_with(Arc::clone(&backend));
    session.turn("at 10 0").await.unwrap();

    backend.push_error(BackendError::Http {
        status: 403,
        body: "forbidden".to_string(),
    });
    let err = session.turn("at 10 1").await.unwrap_err();
    assert!(matches!(err, TurnError::Fatal { .. }));

    assert_eq!(session.store().len(), 1);
    assert_eq!(session.detector().embeddings().len(), 1);
    assert_eq!(session.detector().next_turn_index(), 1);
    assert_eq!(session.rhythm().samples().len(), 1);

    // The next turn continues from the committed state.
    let report = session.turn("at 10 1").await.unwrap();
    assert_eq!(report.index, 1);
    assert!((report.fatigue.score - 0.35).abs() < 1e-9);
}

#[tokio::test]
async fn test_paused_session_refuses_turns() {
    let backend = echo_backend("echo");
    let mut session = session_with(Arc::clone(&backend));

    session.pause();
    assert!(matches!(session.turn("at 1 0").await, Err(TurnError::Paused)));
    assert_eq!(backend.calls(), 0);

    session.resume();
    assert!(session.turn("at 1 0").await.is_ok());
}

#[tokio::test]
async fn test_pod_surfaces_on_semantic_arrival_once() {
    let mut session = session_with(echo_backend("echo"));
    let id = session.add_pod("lighthouse 10 0", 1.0).await.unwrap();

    let first = session.turn("at 10 0").await.unwrap();
    let pod = first.unveiled_pod.expect("pod should surface");
    assert_eq!(pod.id, id);
    assert_eq!(pod.condition, ActivationCondition::SemanticArrival);
    assert_eq!(pod.content, "lighthouse 10 0");

    let second = session.turn("at 10 0").await.unwrap();
    assert!(second.unveiled_pod.is_none());
    assert_eq!(session.pods().latent_count(), 0);
    assert!(matches!(
        session.store().events()[0],
        LedgerEvent::PodUnveiled { turn: 0, .. }
    ));
}

#[tokio::test]
async fn test_unveiled_pod_is_carried_into_the_next_request() {
    let backend = echo_backend("echo");
    let mut session = session_with(Arc::clone(&backend));
    session.add_pod("lighthouse 10 0", 1.0).await.unwrap();

    let first = session.turn("at 10 0").await.unwrap();
    assert!(first.unveiled_pod.is_some());
    assert!(backend.requests()[0].context.is_empty());

    session.turn("at 3 7").await.unwrap();
    let carried = backend.requests().last().cloned().unwrap();
    assert_eq!(carried.context.len(), 1);
    assert!(carried.context[0].starts_with("[Pod Unveiled, similarity 1.000]"));
    assert!(format!("{carried:?}").contains("lighthouse"));

    session.turn("at 3 8").await.unwrap();
    assert!(backend.requests().last().unwrap().context.is_empty());
}

#[tokio::test]
async fn test_aborted_turn_keeps_pod_context_for_the_retry() {
    let backend = echo_backend("echo");
    let mut session = session_with(Arc::clone(&backend));
    session.add_pod("lighthouse 10 0", 1.0).await.unwrap();
    session.turn("at 10 0").await.unwrap();

    backend.push_error(BackendError::Http {
        status: 401,
        body: "unauthorized".to_string(),
    });
    assert!(session.turn("at 3 7").await.is_err());

    session.turn("at 3 7").await.unwrap();
    let requests = backend.requests();
    assert!(requests[1].context[0].contains("lighthouse"));
    assert!(requests[2].context[0].contains("lighthouse"));
}

#[tokio::test]
async fn test_drifting_response_records_low_alignment() {
    let mut config = test_config();
    config.direction.enabled = true;
    let backend = echo_backend("echo");
    backend.push_response(structured_reply("drift 0 10"));
    let mut session = Session::new(
        &config,
        "primary",
        "scripted",
        as_backends(&[Arc::clone(&backend)]),
        numeric_embedder(),
    );

    let drifted = session.turn("at 10 0").await.unwrap();
    assert!(drifted.alignment.unwrap().abs() < 1e-9);
    assert!(session.rhythm().samples()[0]
        .events
        .contains(&TurnEvent::LowAlignment));

    let on_thread = session.turn("at 10 0").await.unwrap();
    assert!((on_thread.alignment.unwrap() - 1.0).abs() < 1e-9);
    assert!(session.rhythm().samples()[1].events.is_empty());
    assert_eq!(session.store().last().unwrap().alignment, on_thread.alignment);

    session.reset();
    assert!(session.direction().unwrap().direction().is_none());
}

#[tokio::test]
async fn test_pod_surfaces_as_fatigue_escape() {
    let mut session = session_with(echo_backend("echo"));
    // Similarity to (10, n) stays below 0.85 for n <= 3 and passes 0.5 from n = 1.
    session.add_pod("escape 1 2", 1.0).await.unwrap();

    for step in 0..3 {
        let report = session.turn(&format!("at 10 {step}")).await.unwrap();
        assert!(report.unveiled_pod.is_none(), "no hard fatigue yet at {step}");
    }
    let report = session.turn("at 10 3").await.unwrap();
    assert!(report.fatigue.hard_flag);
    let pod = report.unveiled_pod.expect("hard fatigue should release the pod");
    assert_eq!(pod.condition, ActivationCondition::FatigueEscape);
    assert!(pod.similarity > 0.5 && pod.similarity < 0.85);
}

#[tokio::test]
async fn test_history_is_passed_to_backend() {
    let backend = echo_backend("echo");
    let mut session = session_with(Arc::clone(&backend));
    session.turn("at 1 0").await.unwrap();
    session.turn("at 2 0").await.unwrap();

    let requests = backend.requests();
    assert!(requests[0].history.is_empty());
    assert_eq!(requests[1].history.len(), 2);
    assert_eq!(requests[1].history[0].content, "at 1 0");
}

#[tokio::test]
async fn test_archive_round_trip_across_sessions() {
    let dir = temp_dir();
    let archive = Arc::new(SessionArchive::new(dir.path()));

    let mut first = session_with(echo_backend("echo"))
        .with_archive(Arc::clone(&archive) as Arc<dyn ArchiveStore>)
        .unwrap();
    first.add_pod("lighthouse 10 0", 1.0).await.unwrap();
    first.add_pod("harbour 0 10", 1.0).await.unwrap();
    first.turn("at 10 0").await.unwrap();
    let signature = first.end().unwrap();
    assert_eq!(signature.turns, 1);

    let ledger = archive
        .load_ledger("scripted", first.id())
        .unwrap()
        .expect("ledger written at session end");
    assert_eq!(ledger.turns.len(), 1);
    assert!(ledger.ended_at.is_some());

    let backend = echo_backend("echo");
    let mut second = session_with(Arc::clone(&backend))
        .with_archive(Arc::clone(&archive) as Arc<dyn ArchiveStore>)
        .unwrap();
    assert_eq!(second.pods().len(), 2);
    assert_eq!(second.pods().latent_count(), 2, "pods come back latent");
    let previous = second.previous_rhythm().expect("rhythm entry from first session");
    assert_eq!(previous.session_id, first.id());
    assert_eq!(previous.signature.turns, 1);

    let recap = second.recapitulation().expect("recap of the first session");
    assert!(recap.starts_with("[PRIOR SESSION]"));
    assert!(recap.contains("  User: at 10 0"));
    assert!(recap.contains("[PRIOR SESSION RHYTHM]"));

    second.turn("at 1 1").await.unwrap();
    second.turn("at 1 2").await.unwrap();
    for request in backend.requests() {
        assert!(request.context[0].starts_with("[PRIOR SESSION]"));
    }
}

#[tokio::test]
async fn test_recapitulation_can_be_disabled() {
    let dir = temp_dir();
    let archive = Arc::new(SessionArchive::new(dir.path()));
    let mut first = session_with(echo_backend("echo"))
        .with_archive(Arc::clone(&archive) as Arc<dyn ArchiveStore>)
        .unwrap();
    first.turn("at 1 0").await.unwrap();
    first.end().unwrap();

    let mut config = test_config();
    config.conversation.recapitulate = false;
    let second = Session::new(&config, "primary", "scripted", as_backends(&[echo_backend("echo")]), numeric_embedder())
        .with_archive(Arc::clone(&archive) as Arc<dyn ArchiveStore>)
        .unwrap();
    assert!(second.previous_rhythm().is_some());
    assert!(second.recapitulation().is_none());
}
