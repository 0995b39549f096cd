//! Context carried from a model's previous session into its next one.
//!
//! Two parts: the last few exchanges of the prior ledger, and a plain
//! language reading of the prior rhythm signature. Both are rendered as
//! context notes for every request of the new session.

use std::fmt::Write;

use crate::domain::models::{BreathingKind, FatigueTrend, RhythmSignature, SessionLedger, TurnEvent};

/// Breathing events listed in a rhythm summary.
const MAX_BREATHING_EVENTS: usize = 6;
/// Characters of pod content quoted per turn.
const POD_QUOTE_CHARS: usize = 80;

/// The last `turns` exchanges of a prior session, each side cut to
/// `max_chars`. `None` when the ledger has no turns.
pub fn prior_session_memory(ledger: &SessionLedger, turns: usize, max_chars: usize) -> Option<String> {
    if ledger.turns.is_empty() || turns == 0 {
        return None;
    }
    let skip = ledger.turns.len().saturating_sub(turns);
    let mut out = String::from("[PRIOR SESSION]\n");
    let _ = writeln!(out, "Session from: {}", ledger.started_at.to_rfc3339());
    let _ = writeln!(out, "Total turns that session: {}", ledger.turns.len());
    out.push_str("Last exchanges:\n");
    for turn in &ledger.turns[skip..] {
        let _ = writeln!(out, "Turn {}:", turn.index + 1);
        let _ = writeln!(out, "  User: {}", cut(&turn.user_message, max_chars));
        let _ = writeln!(out, "  You: {}", cut(&turn.result.visible_text, max_chars));
        if let Some(pod) = &turn.unveiled_pod {
            let _ = writeln!(out, "  [Pod unveiled: {}]", cut(&pod.content, POD_QUOTE_CHARS));
        }
    }
    out.push_str("[END PRIOR SESSION]");
    Some(out)
}

/// Plain-language rhythm summary. `None` for an empty signature.
pub fn rhythm_summary(signature: &RhythmSignature, soft_threshold: f64) -> Option<String> {
    if signature.turns == 0 {
        return None;
    }
    let mut lines = vec!["[PRIOR SESSION RHYTHM]".to_string()];
    let pulse = match (signature.mean_tau_h, signature.tau_h_variance) {
        (Some(mean), Some(var)) => format!(" (mean pulse {mean:.3}, variance {var:.3})"),
        _ => String::new(),
    };
    lines.push(format!("Session was {}{pulse}.", signature.dominant_rhythm));
    lines.push(format!(
        "Fatigue was {} (peaked at {:.2}).",
        signature.fatigue_trend, signature.peak_fatigue
    ));

    if !signature.breathing_events.is_empty() {
        lines.push("Key breathing events:".to_string());
        for event in signature.breathing_events.iter().take(MAX_BREATHING_EVENTS) {
            let value = event.value.unwrap_or_default();
            let text = match event.kind {
                BreathingKind::Pause => format!("Long pause (pulse dropped {value:.3})"),
                BreathingKind::Acceleration => format!("Acceleration (pulse rose {value:.3})"),
                BreathingKind::SoftFatigueOnset => format!("Soft fatigue onset (F={value:.2})"),
                BreathingKind::HardFatigueOnset => format!("Hard fatigue onset (F={value:.2})"),
                BreathingKind::Turn(TurnEvent::PodUnveiled) => "Pod unveiled".to_string(),
                BreathingKind::Turn(other) => other.to_string(),
            };
            lines.push(format!("  - Turn {}: {text}", event.turn + 1));
        }
    }

    let ci = signature.curvature_integral;
    lines.push(if ci > 3.0 {
        format!("Curvature was high ({ci:.2}), many direction changes.")
    } else if ci > 1.5 {
        format!("Curvature was moderate ({ci:.2}), some direction changes.")
    } else {
        format!("Curvature was low ({ci:.2}), the conversation was relatively linear.")
    });

    if signature.fatigue_trend == FatigueTrend::Rising && signature.peak_fatigue > soft_threshold {
        lines.push("The session ended with rising fatigue and likely unresolved threads.".to_string());
    }
    lines.push("[END RHYTHM]".to_string());
    Some(lines.join("\n"))
}

/// Join whichever parts are present.
pub fn recapitulation(memory: Option<String>, rhythm: Option<String>) -> Option<String> {
    match (memory, rhythm) {
        (Some(m), Some(r)) => Some(format!("{m}\n{r}")),
        (m, r) => m.or(r),
    }
}

fn cut(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::domain::models::{
        BreathingEvent, CommittedTurn, DominantRhythm, FatigueModel, FatigueSample, ParseKind,
        TurnResult,
    };

    fn turn(index: usize, user: &str, reply: &str) -> CommittedTurn {
        CommittedTurn {
            index,
            user_message: user.to_string(),
            result: TurnResult::degraded(reply),
            parse: ParseKind::Degraded,
            backend: "llama3".to_string(),
            model_identifier: "llama3".to_string(),
            fatigue: FatigueSample {
                turn_index: index,
                score: 0.1,
                model_used: FatigueModel::B,
                components: BTreeMap::new(),
                soft_flag: false,
                hard_flag: false,
            },
            residual_alerts: Vec::new(),
            unveiled_pod: None,
            tau_h: None,
            alignment: None,
            retries: 0,
            committed_at: Utc::now(),
        }
    }

    fn ledger(turns: Vec<CommittedTurn>) -> SessionLedger {
        SessionLedger {
            session_id: "s1".to_string(),
            model: "llama3".to_string(),
            started_at: Utc::now(),
            ended_at: None,
            turns,
            events: Vec::new(),
        }
    }

    #[test]
    fn test_memory_keeps_last_turns_cut() {
        let turns = (0..8).map(|i| turn(i, &format!("question {i}"), "a long answer")).collect();
        let memory = prior_session_memory(&ledger(turns), 6, 6).unwrap();
        assert!(memory.contains("Total turns that session: 8"));
        assert!(!memory.contains("Turn 2:"));
        assert!(memory.contains("Turn 3:"));
        assert!(memory.contains("Turn 8:"));
        assert!(memory.contains("  You: a long"));
        assert!(!memory.contains("answer"));
    }

    #[test]
    fn test_empty_ledger_has_no_memory() {
        assert!(prior_session_memory(&ledger(Vec::new()), 6, 300).is_none());
    }

    #[test]
    fn test_rhythm_summary_reads_signature() {
        let signature = RhythmSignature {
            turns: 4,
            mean_fatigue: 0.5,
            peak_fatigue: 0.9,
            fatigue_trend: FatigueTrend::Rising,
            mean_tau_h: None,
            tau_h_variance: None,
            breathing_events: vec![BreathingEvent {
                turn: 2,
                kind: BreathingKind::SoftFatigueOnset,
                value: Some(0.7),
            }],
            dominant_rhythm: DominantRhythm::Fatiguing,
            curvature_integral: 0.8,
        };
        let text = rhythm_summary(&signature, 0.68).unwrap();
        assert!(text.starts_with("[PRIOR SESSION RHYTHM]\nSession was fatiguing."));
        assert!(text.contains("  - Turn 3: Soft fatigue onset (F=0.70)"));
        assert!(text.contains("Curvature was low (0.80)"));
        assert!(text.contains("likely unresolved threads"));
        assert!(rhythm_summary(&RhythmSignature::empty(), 0.68).is_none());
    }

    #[test]
    fn test_recapitulation_joins_parts() {
        assert_eq!(recapitulation(None, None), None);
        assert_eq!(recapitulation(Some("a".into()), None).as_deref(), Some("a"));
        assert_eq!(
            recapitulation(Some("a".into()), Some("b".into())).as_deref(),
            Some("a\nb")
        );
    }
}
