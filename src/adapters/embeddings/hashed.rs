//! Deterministic hashed bag-of-words embeddings.
//!
//! Each lowercase alphanumeric token is hashed with FNV-1a into a signed
//! bucket; the result is L2-normalised. Requires no model server, so it backs
//! tests and offline sessions.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::EmbeddingVector;
use crate::domain::ports::EmbeddingSource;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Hashing embedder of fixed dimension.
#[derive(Debug, Clone)]
pub struct HashedEmbeddingSource {
    dimension: usize,
}

impl HashedEmbeddingSource {
    /// Embedder producing `dimension`-wide vectors (at least 1).
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed synchronously.
    pub fn embed_sync(&self, text: &str) -> EmbeddingVector {
        let mut values = vec![0.0; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(&token.to_lowercase());
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            values[bucket] += sign;
        }
        EmbeddingVector::new(values).normalized()
    }
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl EmbeddingSource for HashedEmbeddingSource {
    fn name(&self) -> &'static str {
        "hashed"
    }

    async fn embed(&self, text: &str) -> DomainResult<EmbeddingVector> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_and_normalised() {
        let source = HashedEmbeddingSource::new(32);
        let a = source.embed_sync("The quick brown fox");
        let b = source.embed_sync("the QUICK brown fox!");
        assert_eq!(a, b);
        assert!((a.norm() - 1.0).abs() < 1e-9);
        assert_eq!(a.dimension(), 32);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let source = HashedEmbeddingSource::new(8);
        assert_eq!(source.embed_sync("  ...  ").norm(), 0.0);
    }

    #[test]
    fn test_related_texts_are_closer() {
        let source = HashedEmbeddingSource::new(64);
        let a = source.embed_sync("rust borrow checker lifetimes");
        let b = source.embed_sync("rust borrow checker rules");
        let c = source.embed_sync("banana smoothie recipe");
        assert!(a.cosine_similarity(&b) > a.cosine_similarity(&c));
    }
}
