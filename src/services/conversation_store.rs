//! Append-only store of committed turns for one session.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::models::{
    CommittedTurn, HistoryEntry, LedgerEvent, SessionLedger,
};

/// Committed turns in completion order plus the events they produced.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    session_id: String,
    model: String,
    started_at: DateTime<Utc>,
    turns: Vec<CommittedTurn>,
    events: Vec<LedgerEvent>,
}

impl ConversationStore {
    /// Empty store for a new session.
    pub fn new(session_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            model: model.into(),
            started_at: Utc::now(),
            turns: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Session identifier.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Model label the session is filed under.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// When the session started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Append a committed turn. Its index is overwritten with the next slot
    /// so indices always match commit order.
    pub fn append(&mut self, mut turn: CommittedTurn) -> usize {
        let index = self.turns.len();
        turn.index = index;

        if let Some(pod) = &turn.unveiled_pod {
            self.events.push(LedgerEvent::PodUnveiled {
                turn: index,
                pod_id: pod.id,
                condition: pod.condition,
                similarity: pod.similarity,
            });
        }
        if turn.fatigue.hard_flag {
            self.events.push(LedgerEvent::HardFatigue {
                turn: index,
                score: turn.fatigue.score,
            });
        } else if turn.fatigue.soft_flag {
            self.events.push(LedgerEvent::SoftFatigue {
                turn: index,
                score: turn.fatigue.score,
            });
        }

        debug!(turn_index = index, backend = %turn.backend, "Turn committed to store");
        self.turns.push(turn);
        index
    }

    /// All committed turns, oldest first.
    pub fn turns(&self) -> &[CommittedTurn] {
        &self.turns
    }

    /// Events recorded so far.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Number of committed turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True before the first commit.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn.
    pub fn last(&self) -> Option<&CommittedTurn> {
        self.turns.last()
    }

    /// Role-tagged history for the next backend request: the last `limit`
    /// entries, each cut to `max_chars` characters.
    pub fn history(&self, limit: usize, max_chars: usize) -> Vec<HistoryEntry> {
        let mut entries: Vec<HistoryEntry> = self
            .turns
            .iter()
            .flat_map(|t| {
                [
                    HistoryEntry::user(truncate(&t.user_message, max_chars)),
                    HistoryEntry::assistant(truncate(&t.result.visible_text, max_chars)),
                ]
            })
            .collect();
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
        entries
    }

    /// Snapshot for persistence.
    pub fn ledger(&self, ended_at: Option<DateTime<Utc>>) -> SessionLedger {
        SessionLedger {
            session_id: self.session_id.clone(),
            model: self.model.clone(),
            started_at: self.started_at,
            ended_at,
            turns: self.turns.clone(),
            events: self.events.clone(),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::models::{
        ActivationCondition, FatigueModel, FatigueSample, ParseKind, PodId, Role, TurnResult,
        UnveiledPod,
    };

    fn committed(user: &str, reply: &str, score: f64, pod: bool) -> CommittedTurn {
        CommittedTurn {
            index: 99,
            user_message: user.to_string(),
            result: TurnResult::degraded(reply),
            parse: ParseKind::Degraded,
            backend: "llama3".to_string(),
            model_identifier: "llama3:latest".to_string(),
            fatigue: FatigueSample {
                turn_index: 0,
                score,
                model_used: FatigueModel::B,
                components: BTreeMap::new(),
                soft_flag: score > 0.68,
                hard_flag: score > 0.84,
            },
            residual_alerts: Vec::new(),
            unveiled_pod: pod.then(|| UnveiledPod {
                id: PodId::new(),
                content: "stash".to_string(),
                condition: ActivationCondition::SemanticArrival,
                similarity: 0.9,
            }),
            tau_h: None,
            alignment: None,
            retries: 0,
            committed_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_assigns_sequential_indices() {
        let mut store = ConversationStore::new("s1", "llama3");
        assert_eq!(store.append(committed("a", "b", 0.1, false)), 0);
        assert_eq!(store.append(committed("c", "d", 0.1, false)), 1);
        assert_eq!(store.turns()[1].index, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_events_follow_commits() {
        let mut store = ConversationStore::new("s1", "llama3");
        store.append(committed("a", "b", 0.7, true));
        store.append(committed("c", "d", 0.9, false));
        let events = store.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], LedgerEvent::PodUnveiled { turn: 0, .. }));
        assert!(matches!(events[1], LedgerEvent::SoftFatigue { turn: 0, .. }));
        assert!(matches!(events[2], LedgerEvent::HardFatigue { turn: 1, .. }));
    }

    #[test]
    fn test_history_is_limited_and_truncated() {
        let mut store = ConversationStore::new("s1", "llama3");
        store.append(committed("first", "one", 0.0, false));
        store.append(committed("second question", "two", 0.0, false));
        let history = store.history(3, 6);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::Assistant);
        assert_eq!(history[1].content, "second");
        assert_eq!(history[2].content, "two");
    }

    #[test]
    fn test_ledger_snapshot() {
        let mut store = ConversationStore::new("s1", "llama3");
        store.append(committed("a", "b", 0.1, false));
        let ledger = store.ledger(None);
        assert_eq!(ledger.session_id, "s1");
        assert_eq!(ledger.turns.len(), 1);
        assert!(ledger.ended_at.is_none());
    }
}
