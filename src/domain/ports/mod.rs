//! Port trait definitions (Hexagonal Architecture)
//!
//! - Backend: generative-text model invocation
//! - EmbeddingSource: text to embedding vector
//! - ArchiveStore: pods, ledgers and the rhythm index across sessions
//!
//! These traits let the services stay independent of any backend SDK.

pub mod archive;
pub mod backend;
pub mod embedding;

pub use archive::ArchiveStore;
pub use backend::{Backend, BackendError, BackendRequest, BackendResponse, Usage};
pub use embedding::EmbeddingSource;
