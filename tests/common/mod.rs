//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use vessel::adapters::backends::ScriptedBackend;
use vessel::domain::models::{Config, EmbeddingVector};
use vessel::domain::ports::{Backend, EmbeddingSource};
use vessel::DomainResult;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Embeds text as the vector of the numbers it contains.
///
/// `"at 10 3"` embeds as `[10.0, 3.0]`; text without numbers embeds as
/// `[0.0, 0.0]`. Lets tests steer trajectories precisely.
pub struct NumericEmbeddingSource;

impl NumericEmbeddingSource {
    pub fn vector(text: &str) -> EmbeddingVector {
        let values: Vec<f64> = text
            .split_whitespace()
            .filter_map(|t| t.parse::<f64>().ok())
            .collect();
        if values.is_empty() {
            EmbeddingVector::new(vec![0.0, 0.0])
        } else {
            EmbeddingVector::new(values)
        }
    }
}

#[async_trait]
impl EmbeddingSource for NumericEmbeddingSource {
    fn name(&self) -> &'static str {
        "numeric"
    }

    async fn embed(&self, text: &str) -> DomainResult<EmbeddingVector> {
        Ok(Self::vector(text))
    }
}

pub fn numeric_embedder() -> Arc<dyn EmbeddingSource> {
    Arc::new(NumericEmbeddingSource)
}

/// Config suited to fast tests: tiny backoff, no fatigue alerts.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 5;
    config.validation.fatigue_alerts = false;
    config.persistence.autosave_every = 0;
    config
}

/// A scripted backend that echoes every message as a well-formed turn.
pub fn echo_backend(name: &str) -> Arc<ScriptedBackend> {
    Arc::new(ScriptedBackend::new(name))
}

pub fn as_backends(backends: &[Arc<ScriptedBackend>]) -> Vec<Arc<dyn Backend>> {
    backends
        .iter()
        .map(|b| Arc::clone(b) as Arc<dyn Backend>)
        .collect()
}
