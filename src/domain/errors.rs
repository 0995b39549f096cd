//! Domain errors for the Vessel conversation engine.

use thiserror::Error;

use super::models::{ModelAttempt, PodId, ValidationAlert};

/// Domain-level errors that can occur outside the turn loop.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Pod not found: {0}")]
    PodNotFound(PodId),

    #[error("Scratchpad item not found: {0}")]
    ScratchNotFound(String),

    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::PersistenceError(err.to_string())
    }
}

/// Context carried by every turn abort so the caller can decide whether to
/// retry the whole turn later.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbortDiagnostics {
    /// Every backend invocation made during the turn, in order.
    pub attempts: Vec<ModelAttempt>,
    /// Most recent backend error message.
    pub last_error: Option<String>,
    /// Alerts from the most recent validation, if any ran.
    pub last_alerts: Vec<ValidationAlert>,
    /// Retry cycles consumed.
    pub retries: u32,
}

impl AbortDiagnostics {
    /// Number of backend invocations made.
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// Typed turn failure. Session state is unchanged whenever one is returned.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Session is paused; no new turns are started")]
    Paused,

    #[error("No backends configured for role '{role}'")]
    NoBackends { role: String },

    #[error("Fatal backend error from {backend}: {message}")]
    Fatal {
        backend: String,
        message: String,
        diagnostics: AbortDiagnostics,
    },

    #[error("All ranked backends failed: {}", .errors.join("; "))]
    BackendsExhausted {
        errors: Vec<String>,
        diagnostics: AbortDiagnostics,
    },

    #[error("Circuit breaker tripped after {consecutive_failures} consecutive validation failures")]
    CircuitBreaker {
        consecutive_failures: u32,
        diagnostics: AbortDiagnostics,
    },

    #[error("Embedding failed: {message}")]
    Embedding {
        message: String,
        diagnostics: AbortDiagnostics,
    },
}

impl TurnError {
    /// Diagnostics attached to the abort, when the turn got far enough to
    /// collect any.
    pub fn diagnostics(&self) -> Option<&AbortDiagnostics> {
        match self {
            Self::Paused | Self::NoBackends { .. } => None,
            Self::Fatal { diagnostics, .. }
            | Self::BackendsExhausted { diagnostics, .. }
            | Self::CircuitBreaker { diagnostics, .. }
            | Self::Embedding { diagnostics, .. } => Some(diagnostics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ErrorClass;

    #[test]
    fn test_exhausted_message_joins_errors() {
        let err = TurnError::BackendsExhausted {
            errors: vec!["a: boom".to_string(), "b: HTTP 429".to_string()],
            diagnostics: AbortDiagnostics::default(),
        };
        assert_eq!(err.to_string(), "All ranked backends failed: a: boom; b: HTTP 429");
    }

    #[test]
    fn test_diagnostics_accessor() {
        let diagnostics = AbortDiagnostics {
            attempts: vec![ModelAttempt::failure(0, "a", ErrorClass::Fatal, "unauthorized")],
            last_error: Some("unauthorized".to_string()),
            last_alerts: Vec::new(),
            retries: 0,
        };
        let err = TurnError::Fatal {
            backend: "a".to_string(),
            message: "unauthorized".to_string(),
            diagnostics,
        };
        assert_eq!(err.diagnostics().map(AbortDiagnostics::attempt_count), Some(1));
        assert!(TurnError::Paused.diagnostics().is_none());
    }
}
