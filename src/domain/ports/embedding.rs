//! Embedding source port for per-turn semantic vectors.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::EmbeddingVector;

/// Trait for embedding sources.
#[async_trait]
pub trait EmbeddingSource: Send + Sync {
    /// Source name (e.g., "ollama", "hashed").
    fn name(&self) -> &'static str;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> DomainResult<EmbeddingVector>;
}
