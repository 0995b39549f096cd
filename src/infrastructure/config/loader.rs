use std::collections::HashSet;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project-local configuration directory.
pub const CONFIG_DIR: &str = ".vessel";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid window_size: {0}. Must be at least 1")]
    InvalidWindowSize(usize),

    #[error("Invalid {0} weights: every weight must be finite and non-negative")]
    InvalidWeights(&'static str),

    #[error(
        "Invalid fatigue thresholds: soft ({0}) must be below hard ({1}) and both within [0, 1]"
    )]
    InvalidFatigueThresholds(f64, f64),

    #[error(
        "Invalid pod thresholds: fatigue_similarity ({0}) must be below high_similarity ({1})"
    )]
    InvalidPodThresholds(f64, f64),

    #[error("Invalid consecutive_failure_threshold: {0}. Must be at least 1")]
    InvalidFailureThreshold(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Role '{role}' names unknown model '{model}'")]
    UnknownModel { role: String, model: String },

    #[error("Default role '{0}' has no models")]
    EmptyDefaultRole(String),

    #[error("Invalid direction modulation_strength: {0}. Must be finite and non-negative")]
    InvalidModulationStrength(f64),

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .vessel/config.yaml (project config)
    /// 3. .vessel/local.yaml (project local overrides, optional)
    /// 4. Environment variables (VESSEL_* prefix, `__` nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file over the defaults.
    ///
    /// Environment variables still take precedence over the file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("VESSEL_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(format!("{CONFIG_DIR}/config.yaml")))
            .merge(Yaml::file(format!("{CONFIG_DIR}/local.yaml")))
            .merge(Env::prefixed("VESSEL_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let fatigue = &config.fatigue;
        if fatigue.window_size == 0 {
            return Err(ConfigError::InvalidWindowSize(fatigue.window_size));
        }
        if !fatigue.weights_a.is_valid() {
            return Err(ConfigError::InvalidWeights("weights_a"));
        }
        if !fatigue.weights_b.is_valid() {
            return Err(ConfigError::InvalidWeights("weights_b"));
        }
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !(in_unit(fatigue.soft_threshold)
            && in_unit(fatigue.hard_threshold)
            && fatigue.soft_threshold < fatigue.hard_threshold)
        {
            return Err(ConfigError::InvalidFatigueThresholds(
                fatigue.soft_threshold,
                fatigue.hard_threshold,
            ));
        }

        if config.pods.fatigue_similarity >= config.pods.high_similarity {
            return Err(ConfigError::InvalidPodThresholds(
                config.pods.fatigue_similarity,
                config.pods.high_similarity,
            ));
        }

        if config.retry.consecutive_failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(
                config.retry.consecutive_failure_threshold,
            ));
        }
        if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        let known: HashSet<&str> = config.backends.models.iter().map(|m| m.name.as_str()).collect();
        let mut roles: Vec<(&String, &Vec<String>)> = config.backends.roles.iter().collect();
        roles.sort_by(|a, b| a.0.cmp(b.0));
        for (role, models) in roles {
            if let Some(missing) = models.iter().find(|m| !known.contains(m.as_str())) {
                return Err(ConfigError::UnknownModel {
                    role: role.clone(),
                    model: missing.clone(),
                });
            }
        }
        let default_role = &config.backends.default_role;
        if config
            .backends
            .roles
            .get(default_role)
            .is_none_or(Vec::is_empty)
        {
            return Err(ConfigError::EmptyDefaultRole(default_role.clone()));
        }

        let strength = config.direction.modulation_strength;
        if !(strength.is_finite() && strength >= 0.0) {
            return Err(ConfigError::InvalidModulationStrength(strength));
        }

        if config.rate_limit.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(
                config.rate_limit.requests_per_second,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FatigueWeights;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fatigue.window_size, 5);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.backends.default_role, "primary");
        assert_eq!(config.logging.level, "warn");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
fatigue:
  window_size: 8
  model: b
  subspace_method: singular_values
pods:
  dormancy_ttl_secs: 3600
retry:
  max_retries: 4
backends:
  models:
    - name: local
      provider: scripted
  roles:
    primary: [local]
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.fatigue.window_size, 8);
        assert_eq!(config.pods.dormancy_ttl_secs, Some(3600));
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.retry.consecutive_failure_threshold, 3);
        assert_eq!(config.backends.models.len(), 1);
        assert_eq!(config.logging.format, "json");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_zero_window() {
        let mut config = Config::default();
        config.fatigue.window_size = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWindowSize(0))
        ));
    }

    #[test]
    fn test_validate_negative_weight() {
        let mut config = Config::default();
        config.fatigue.weights_b = FatigueWeights {
            gamma: -1.0,
            ..FatigueWeights::MODEL_B
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWeights("weights_b"))
        ));
    }

    #[test]
    fn test_validate_inverted_thresholds() {
        let mut config = Config::default();
        config.fatigue.soft_threshold = 0.9;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidFatigueThresholds(_, _))
        ));

        let mut config = Config::default();
        config.pods.fatigue_similarity = 0.9;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPodThresholds(_, _))
        ));
    }

    #[test]
    fn test_validate_zero_failure_threshold() {
        let mut config = Config::default();
        config.retry.consecutive_failure_threshold = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidFailureThreshold(0))
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 30000;
        config.retry.max_backoff_ms = 10000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(30000, 10000))
        ));
    }

    #[test]
    fn test_validate_negative_modulation_strength() {
        let mut config = Config::default();
        config.direction.modulation_strength = -0.3;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidModulationStrength(_))
        ));
    }

    #[test]
    fn test_validate_unknown_model_in_role() {
        let mut config = Config::default();
        config
            .backends
            .roles
            .insert("critic".to_string(), vec!["ghost".to_string()]);
        match ConfigLoader::validate(&config) {
            Err(ConfigError::UnknownModel { role, model }) => {
                assert_eq!(role, "critic");
                assert_eq!(model, "ghost");
            }
            other => panic!("Expected UnknownModel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_empty_default_role() {
        let mut config = Config::default();
        config.backends.default_role = "missing".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyDefaultRole(_))
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "invalid"),
            _ => panic!("Expected InvalidLogLevel error"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogFormat(format)) => assert_eq!(format, "xml"),
            _ => panic!("Expected InvalidLogFormat error"),
        }
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "fatigue:\n  window_size: 6\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "fatigue:\n  window_size: 9\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.fatigue.window_size, 9, "Override should win");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }
}
