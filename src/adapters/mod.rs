//! Adapters for external systems.

pub mod backends;
pub mod embeddings;
