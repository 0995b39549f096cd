//! Hierarchical configuration loading: defaults, YAML file, environment.

use std::io::Write;

use tempfile::NamedTempFile;
use vessel::domain::models::{BackendProvider, ModelSelection};
use vessel::ConfigLoader;

fn yaml_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_file_overrides_defaults() {
    let file = yaml_file(
        r"
fatigue:
  model: a
  soft_threshold: 0.6
backends:
  models:
    - name: offline
      provider: scripted
      responses: ['{}']
  roles:
    primary: [offline]
",
    );

    let config = ConfigLoader::load_from_file(file.path()).unwrap();
    assert_eq!(config.fatigue.model, ModelSelection::A);
    assert!((config.fatigue.soft_threshold - 0.6).abs() < f64::EPSILON);
    assert!((config.fatigue.hard_threshold - 0.84).abs() < f64::EPSILON);
    assert_eq!(config.backends.models[0].provider, BackendProvider::Scripted);
    assert_eq!(config.backends.models[0].responses, vec!["{}".to_string()]);
}

#[test]
fn test_environment_overrides_file() {
    let file = yaml_file("retry:\n  max_retries: 1\nlogging:\n  level: info\n");

    temp_env::with_vars(
        [
            ("VESSEL_RETRY__MAX_RETRIES", Some("5")),
            ("VESSEL_LOGGING__FORMAT", Some("json")),
        ],
        || {
            let config = ConfigLoader::load_from_file(file.path()).unwrap();
            assert_eq!(config.retry.max_retries, 5, "environment wins over file");
            assert_eq!(config.logging.level, "info", "file wins over defaults");
            assert_eq!(config.logging.format, "json");
        },
    );
}

#[test]
fn test_invalid_file_is_rejected() {
    let file = yaml_file("fatigue:\n  window_size: 0\n");
    let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("window_size"));
}

#[test]
fn test_unknown_model_in_role_is_rejected() {
    let file = yaml_file("backends:\n  roles:\n    primary: [llama3, ghost]\n");
    let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("ghost"));
}
