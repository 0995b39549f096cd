//! Backend registry: builds configured models and ranks them per role.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BackendProvider, BackendsConfig, ModelDescriptor, RateLimitConfig};
use crate::domain::ports::Backend;

use super::ollama::OllamaBackend;
use super::scripted::ScriptedBackend;

/// Built backends keyed by name, plus the role rankings.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
    roles: HashMap<String, Vec<String>>,
    default_role: String,
}

impl BackendRegistry {
    /// Build every configured model.
    pub fn from_config(config: &BackendsConfig, rate_limit: &RateLimitConfig) -> DomainResult<Self> {
        let mut backends = HashMap::with_capacity(config.models.len());
        for descriptor in &config.models {
            let backend = create_backend(descriptor.clone(), rate_limit)?;
            backends.insert(descriptor.name.clone(), backend);
        }
        debug!(count = backends.len(), "Backends registered");
        Ok(Self {
            backends,
            roles: config.roles.clone(),
            default_role: config.default_role.clone(),
        })
    }

    /// Empty registry; fill with [`Self::register`].
    pub fn new(default_role: impl Into<String>) -> Self {
        Self {
            backends: HashMap::new(),
            roles: HashMap::new(),
            default_role: default_role.into(),
        }
    }

    /// Add a backend under its own name.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    /// Set the ranking for a role.
    pub fn set_role(&mut self, role: impl Into<String>, ranking: Vec<String>) {
        self.roles.insert(role.into(), ranking);
    }

    /// Role used when none is requested.
    pub fn default_role(&self) -> &str {
        &self.default_role
    }

    /// Known role names, sorted.
    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = self.roles.keys().map(String::as_str).collect();
        roles.sort_unstable();
        roles
    }

    /// Backends for `role` in rank order.
    pub fn ranked(&self, role: &str) -> DomainResult<Vec<Arc<dyn Backend>>> {
        let names = self
            .roles
            .get(role)
            .ok_or_else(|| DomainError::UnknownRole(role.to_string()))?;
        names
            .iter()
            .map(|name| {
                self.backends
                    .get(name)
                    .cloned()
                    .ok_or_else(|| DomainError::UnknownModel(name.clone()))
            })
            .collect()
    }
}

/// Build one backend from its descriptor.
pub fn create_backend(
    descriptor: ModelDescriptor,
    rate_limit: &RateLimitConfig,
) -> DomainResult<Arc<dyn Backend>> {
    Ok(match descriptor.provider {
        BackendProvider::Ollama => Arc::new(OllamaBackend::new(descriptor, rate_limit)?),
        BackendProvider::Scripted => Arc::new(
            ScriptedBackend::new(descriptor.name).with_responses(descriptor.responses),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted(name: &str) -> ModelDescriptor {
        ModelDescriptor {
            provider: BackendProvider::Scripted,
            ..ModelDescriptor::ollama(name)
        }
    }

    #[test]
    fn test_ranked_follows_role_order() {
        let config = BackendsConfig {
            models: vec![scripted("a"), scripted("b")],
            roles: HashMap::from([("primary".to_string(), vec!["b".to_string(), "a".to_string()])]),
            default_role: "primary".to_string(),
        };
        let registry = BackendRegistry::from_config(&config, &RateLimitConfig::default()).unwrap();
        let names: Vec<String> = registry
            .ranked("primary")
            .unwrap()
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_unknown_role_and_model() {
        let mut registry = BackendRegistry::new("primary");
        assert!(matches!(registry.ranked("primary"), Err(DomainError::UnknownRole(_))));

        registry.set_role("primary", vec!["ghost".to_string()]);
        assert!(matches!(registry.ranked("primary"), Err(DomainError::UnknownModel(name)) if name == "ghost"));
    }

    #[test]
    fn test_default_config_builds_ollama_backends() {
        let registry =
            BackendRegistry::from_config(&BackendsConfig::default(), &RateLimitConfig::default())
                .unwrap();
        assert_eq!(registry.ranked("primary").unwrap().len(), 3);
        assert_eq!(registry.roles(), vec!["primary"]);
    }
}
