//! Turn results, their structured metadata, and the parse outcome wrapper.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Speaker of one history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One role-tagged entry of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    /// A user entry.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant entry.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Internal-signal estimates a backend reports about its own generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalSignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_pressure: Option<f64>,
    /// Free-form level reported by the backend (e.g. "low", "0.4").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty_level: Option<Value>,
    /// Fraction of the context window in use, `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_usage: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Structured metadata block of a turn. Every field is optional so that the
/// validator can tell a missing field from a present-but-empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_signals: Option<InternalSignals>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_disclosures: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_block: Option<Map<String, Value>>,
}

impl ProcessMetadata {
    /// Resolve a dotted camelCase path (`internalSignals.contextUsage`) to a
    /// non-null value.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let mut current = serde_json::to_value(self).ok()?;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = current.get(segment)?.clone();
        }
        (!current.is_null()).then_some(current)
    }

    /// Context-usage fraction if reported.
    pub fn context_usage(&self) -> Option<f64> {
        self.internal_signals.as_ref()?.context_usage
    }

    /// Token pressure if reported.
    pub fn token_pressure(&self) -> Option<f64> {
        self.internal_signals.as_ref()?.token_pressure
    }
}

/// The structured result of one generated turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResult {
    pub visible_text: String,
    #[serde(default, rename = "processMetadata")]
    pub metadata: ProcessMetadata,
}

impl TurnResult {
    /// Degraded shape: the raw text verbatim with default metadata.
    pub fn degraded(raw: &str) -> Self {
        Self {
            visible_text: raw.to_string(),
            metadata: ProcessMetadata::default(),
        }
    }
}

/// How a raw backend output became a [`TurnResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The backend complied with the wire shape.
    Parsed(TurnResult),
    /// The fallback shape was substituted.
    Degraded(TurnResult),
}

impl ParseOutcome {
    /// Borrow the turn result regardless of outcome.
    pub fn turn(&self) -> &TurnResult {
        match self {
            Self::Parsed(t) | Self::Degraded(t) => t,
        }
    }

    /// Consume into the turn result.
    pub fn into_turn(self) -> TurnResult {
        match self {
            Self::Parsed(t) | Self::Degraded(t) => t,
        }
    }

    /// Outcome tag without the payload.
    pub fn kind(&self) -> ParseKind {
        match self {
            Self::Parsed(_) => ParseKind::Parsed,
            Self::Degraded(_) => ParseKind::Degraded,
        }
    }
}

/// Payload-free tag of a [`ParseOutcome`], for persistence and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseKind {
    Parsed,
    Degraded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_nested_path() {
        let turn: TurnResult = serde_json::from_value(serde_json::json!({
            "visibleText": "hi",
            "processMetadata": {
                "internalSignals": {"contextUsage": 0.5, "uncertaintyLevel": "low"},
                "complianceBlock": {}
            }
        }))
        .unwrap();
        assert_eq!(
            turn.metadata.lookup("internalSignals.contextUsage"),
            Some(serde_json::json!(0.5))
        );
        assert!(turn.metadata.lookup("complianceBlock").is_some());
        assert!(turn.metadata.lookup("processDisclosures").is_none());
        assert!(turn.metadata.lookup("internalSignals.tokenPressure").is_none());
    }

    #[test]
    fn test_degraded_keeps_raw_text() {
        let t = TurnResult::degraded("  raw output ");
        assert_eq!(t.visible_text, "  raw output ");
        assert_eq!(t.metadata, ProcessMetadata::default());
    }

    #[test]
    fn test_unknown_signals_are_kept() {
        let signals: InternalSignals =
            serde_json::from_value(serde_json::json!({"tokenPressure": 0.2, "drift": 3})).unwrap();
        assert_eq!(signals.token_pressure, Some(0.2));
        assert_eq!(signals.extra.get("drift"), Some(&serde_json::json!(3)));
    }
}
