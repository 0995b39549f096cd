//! Embedding sources.

pub mod hashed;
pub mod ollama;

use std::sync::Arc;

pub use hashed::HashedEmbeddingSource;
pub use ollama::OllamaEmbeddingSource;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EmbeddingConfig, EmbeddingProviderKind};
use crate::domain::ports::EmbeddingSource;

/// Build the configured embedding source.
pub fn embedding_source_from_config(config: &EmbeddingConfig) -> DomainResult<Arc<dyn EmbeddingSource>> {
    Ok(match config.provider {
        EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbeddingSource::new(config)?),
        EmbeddingProviderKind::Hashed => Arc::new(HashedEmbeddingSource::new(config.dimension)),
    })
}
