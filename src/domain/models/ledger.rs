//! Committed turns and the per-session ledger they are written to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alert::ValidationAlert;
use super::fatigue::FatigueSample;
use super::pod::{ActivationCondition, PodId};
use super::turn::{ParseKind, TurnResult};

/// A pod surfaced by a committed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnveiledPod {
    pub id: PodId,
    pub content: String,
    pub condition: ActivationCondition,
    pub similarity: f64,
}

/// One turn as committed to the conversation store. Never edited afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedTurn {
    pub index: usize,
    pub user_message: String,
    pub result: TurnResult,
    pub parse: ParseKind,
    pub backend: String,
    pub model_identifier: String,
    pub fatigue: FatigueSample,
    /// Alerts still present when the retry budget ran out.
    #[serde(default)]
    pub residual_alerts: Vec<ValidationAlert>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unveiled_pod: Option<UnveiledPod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau_h: Option<f64>,
    /// Alignment of the response with the user's sustained direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<f64>,
    pub retries: u32,
    pub committed_at: DateTime<Utc>,
}

/// Notable moments in a session, in commit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    PodUnveiled {
        turn: usize,
        pod_id: PodId,
        condition: ActivationCondition,
        similarity: f64,
    },
    SoftFatigue {
        turn: usize,
        score: f64,
    },
    HardFatigue {
        turn: usize,
        score: f64,
    },
}

/// Everything persisted about one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLedger {
    pub session_id: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub turns: Vec<CommittedTurn>,
    #[serde(default)]
    pub events: Vec<LedgerEvent>,
}
