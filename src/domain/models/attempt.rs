//! Backend invocation attempts and error classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Class of a backend invocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Anything not recognised below; retried after a short backoff.
    Transient,
    /// Rate-limit or overload; retried after a longer backoff.
    Overload,
    /// Authentication or credential failure; aborts the turn.
    Fatal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Overload => write!(f, "overload"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

const FATAL_PHRASES: &[&str] = &[
    "authentication",
    "unauthorized",
    "unauthorised",
    "invalid api key",
    "invalid_api_key",
    "invalid credential",
    "invalid x-api-key",
    "permission denied",
    "forbidden",
    "http 401",
    "http 403",
];

const OVERLOAD_PHRASES: &[&str] = &[
    "rate limit",
    "rate-limit",
    "ratelimit",
    "rate_limit",
    "too many requests",
    "overload",
    "over capacity",
    "quota",
    "http 429",
    "http 529",
    "http 503",
];

impl ErrorClass {
    /// Classify a human-readable error message by phrase matching.
    ///
    /// Fatal phrases are checked first.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if FATAL_PHRASES.iter().any(|p| lower.contains(p)) {
            Self::Fatal
        } else if OVERLOAD_PHRASES.iter().any(|p| lower.contains(p)) {
            Self::Overload
        } else {
            Self::Transient
        }
    }
}

/// One invocation of one backend within a turn's retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAttempt {
    /// Zero-based position in the role's ranked list.
    pub backend_rank: usize,
    pub backend: String,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelAttempt {
    /// A successful attempt.
    pub fn success(backend_rank: usize, backend: impl Into<String>) -> Self {
        Self {
            backend_rank,
            backend: backend.into(),
            succeeded: true,
            error_class: None,
            error: None,
        }
    }

    /// A failed attempt.
    pub fn failure(
        backend_rank: usize,
        backend: impl Into<String>,
        class: ErrorClass,
        error: impl Into<String>,
    ) -> Self {
        Self {
            backend_rank,
            backend: backend.into(),
            succeeded: false,
            error_class: Some(class),
            error: Some(error.into()),
        }
    }
}
