//! Vessel - fatigue-aware conversational orchestration
//!
//! Vessel runs a multi-turn conversation between a human and a ranked list of
//! generative backends, and adds three capabilities on top of plain chat:
//!
//! - **Fatigue detection** from the sequence of response embeddings
//!   (similarity/entropy scoring, or trajectory geometry when no token
//!   probabilities are available)
//! - **Pods**: stashed content that resurfaces when the conversation arrives
//!   near it, or when fatigue calls for an escape route
//! - **Validated turns**: every response is parsed and validated; failures
//!   are retried with feedback, fall back across backends, and trip a circuit
//!   breaker after repeated failures
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, ports and errors
//! - **Service Layer** (`services`): detector, pods, validator, orchestrator,
//!   session
//! - **Adapters** (`adapters`): Ollama and scripted backends, embedding
//!   sources
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging,
//!   persistence
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vessel::adapters::backends::ScriptedBackend;
//! use vessel::adapters::embeddings::HashedEmbeddingSource;
//! use vessel::{Config, Session};
//!
//! # async fn run() -> Result<(), vessel::TurnError> {
//! let backend = Arc::new(ScriptedBackend::new("local"));
//! let embedder = Arc::new(HashedEmbeddingSource::new(64));
//! let mut session = Session::new(&Config::default(), "primary", "local", vec![backend], embedder);
//! let report = session.turn("hello").await?;
//! println!("{} (fatigue {:.2})", report.visible_text, report.fatigue.score);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{AbortDiagnostics, DomainError, DomainResult, TurnError};
pub use domain::models::{
    Config, EmbeddingVector, FatigueSample, Pod, PodId, TurnResult, ValidationAlert,
};
pub use domain::ports::{Backend, EmbeddingSource};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    ConversationStore, DirectionTracker, FatigueDetector, PodSpace, ResponseValidator,
    RetryOrchestrator, Scratchpad, Session, TurnReport,
};
