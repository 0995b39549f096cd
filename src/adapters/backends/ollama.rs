//! Ollama chat backend.
//!
//! Speaks the non-streaming `/api/chat` protocol. HTTP failures are rendered
//! as `HTTP <status>: <body>` so the orchestrator can classify them.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ModelDescriptor, RateLimitConfig, Role};
use crate::domain::ports::{Backend, BackendError, BackendRequest, BackendResponse, Usage};

/// Heading placed between the user message and validation feedback.
const FEEDBACK_HEADING: &str = "[VALIDATION FEEDBACK]";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    message: ChatResponseMessage,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// One Ollama-hosted model.
pub struct OllamaBackend {
    descriptor: ModelDescriptor,
    client: reqwest::Client,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl OllamaBackend {
    /// Build a backend for `descriptor`, throttled by `rate_limit`.
    pub fn new(descriptor: ModelDescriptor, rate_limit: &RateLimitConfig) -> DomainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(descriptor.timeout_secs))
            .build()
            .map_err(|e| DomainError::ValidationFailed(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            descriptor,
            client,
            limiter: Arc::new(build_limiter(rate_limit)),
        })
    }

    /// Model descriptor this backend was built from.
    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.descriptor.host.trim_end_matches('/'))
    }
}

/// Token-bucket limiter for one backend.
pub fn build_limiter(config: &RateLimitConfig) -> DefaultDirectRateLimiter {
    let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst_size).unwrap_or(rps);
    RateLimiter::direct(Quota::per_second(rps).allow_burst(burst))
}

/// System prompt followed by the request's context notes, blank-line
/// separated. `None` when there is neither.
fn system_content(request: &BackendRequest, default: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = request
        .system
        .as_deref()
        .or(default)
        .into_iter()
        .chain(request.context.iter().map(String::as_str))
        .filter(|part| !part.trim().is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

/// User content with any validation feedback appended.
fn user_content(request: &BackendRequest) -> String {
    match &request.feedback {
        Some(feedback) => format!("{}\n\n{FEEDBACK_HEADING}\n{feedback}", request.message),
        None => request.message.clone(),
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    async fn invoke(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        self.limiter.until_ready().await;

        let system = system_content(&request, self.descriptor.system_prompt.as_deref());
        let content = user_content(&request);
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        if let Some(system) = system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(request.history.iter().map(|h| ChatMessage {
            role: role_name(h.role),
            content: &h.content,
        }));
        messages.push(ChatMessage {
            role: "user",
            content: &content,
        });

        let body = ChatRequest {
            model: self.descriptor.model_id(),
            messages,
            stream: false,
            format: self.descriptor.json_format.then_some("json"),
        };

        debug!(backend = %self.descriptor.name, model = body.model, "Sending chat request");
        let response = self
            .client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(self.descriptor.timeout_secs)
                } else {
                    BackendError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(BackendError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (input, output) => Some(Usage {
                input_tokens: input.unwrap_or(0),
                output_tokens: output.unwrap_or(0),
            }),
        };
        Ok(BackendResponse {
            text: parsed.message.content,
            model_identifier: parsed
                .model
                .unwrap_or_else(|| self.descriptor.model_id().to_string()),
            usage,
            token_probabilities: None,
        })
    }
}
