//! Backend port - interface for generative-text models.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::{HistoryEntry, TokenProbabilities};

/// One backend invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendRequest {
    /// The user-role message for this turn.
    pub message: String,
    /// Prior conversation, oldest first.
    pub history: Vec<HistoryEntry>,
    /// Serialized alerts from the previous attempt, when retrying.
    pub feedback: Option<String>,
    /// Opaque system prompt, passed through unchanged.
    pub system: Option<String>,
    /// Context notes rendered alongside the system prompt: the prior-session
    /// recapitulation and any pods unveiled earlier in the conversation.
    pub context: Vec<String>,
}

/// Token accounting reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Raw backend output before parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub text: String,
    pub model_identifier: String,
    pub usage: Option<Usage>,
    /// Present only for backends that expose per-token distributions.
    pub token_probabilities: Option<TokenProbabilities>,
}

impl BackendResponse {
    /// A response carrying only text.
    pub fn text(text: impl Into<String>, model_identifier: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model_identifier: model_identifier.into(),
            usage: None,
            token_probabilities: None,
        }
    }
}

/// Backend failure. The rendered message is what gets classified, so
/// variants keep the upstream wording intact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

/// Invocation contract for one configured model.
///
/// An implementation is bound to a single model descriptor at construction,
/// so the request carries only the conversational inputs.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Configured model name (as referenced in role rankings).
    fn name(&self) -> &str;

    /// Run one request to completion or failure.
    async fn invoke(&self, request: BackendRequest) -> Result<BackendResponse, BackendError>;
}
