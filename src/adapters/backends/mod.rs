//! Chat backends.

pub mod ollama;
pub mod registry;
pub mod scripted;

pub use ollama::{build_limiter, OllamaBackend};
pub use registry::{create_backend, BackendRegistry};
pub use scripted::{structured_reply, ScriptedBackend};
