//! Ollama embedding source (`/api/embeddings`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{EmbeddingConfig, EmbeddingVector};
use crate::domain::ports::EmbeddingSource;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}

/// Embeds text with an Ollama-hosted embedding model.
pub struct OllamaEmbeddingSource {
    host: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaEmbeddingSource {
    /// Source for the configured host and model.
    pub fn new(config: &EmbeddingConfig) -> DomainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::EmbeddingFailed(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            host: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    /// Embedding model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingSource for OllamaEmbeddingSource {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn embed(&self, text: &str) -> DomainResult<EmbeddingVector> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.host))
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| DomainError::EmbeddingFailed(format!("Embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::EmbeddingFailed(format!(
                "HTTP {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| DomainError::EmbeddingFailed(format!("Invalid embedding response: {e}")))?;
        if parsed.embedding.is_empty() {
            return Err(DomainError::EmbeddingFailed(
                "Embedding response was empty".to_string(),
            ));
        }
        Ok(EmbeddingVector::new(parsed.embedding))
    }
}
