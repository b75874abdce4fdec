//! Integration tests for configuration loading

use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use track_engine::infra::{Config, EngineError, Metrics};
use track_engine::services::Engine;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[ingest]
min_detection_score = 0.6

[tracking]
association_gate_distance = 120.0
track_timeout_ms = 1500
tracked_classes = ["person", "laptop"]
reference_width = 1280
reference_height = 720

[activity]
run_speed = 90.0

[theft]
valuable_classes = ["laptop"]
theft_suppression_ms = 3000

[density]
low_density_count = 1
high_density_count = 3
density_hold_frames = 2

[egress]
events_file = "/tmp/events.jsonl"

[logging]
json = true
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.min_detection_score(), 0.6);
    assert_eq!(config.association_gate_distance(), 120.0);
    assert_eq!(config.track_timeout_ms(), 1500);
    assert_eq!(config.tracked_classes(), &["person".to_string(), "laptop".to_string()]);
    assert_eq!(config.reference_width(), 1280);
    assert_eq!(config.run_speed(), 90.0);
    assert_eq!(config.valuable_classes(), &["laptop".to_string()]);
    assert_eq!(config.theft_suppression_ms(), 3000);
    assert_eq!(config.low_density_count(), 1);
    assert_eq!(config.high_density_count(), 3);
    assert_eq!(config.density_hold_frames(), 2);
    assert_eq!(config.events_file(), "/tmp/events.jsonl");
    assert!(config.log_json());

    // Unspecified keys keep their defaults
    assert_eq!(config.walk_speed(), 40.0);
    assert_eq!(config.velocity_window_size(), 5);
    assert_eq!(config.person_class(), "person");
    assert_eq!(config.report_file(), "report.txt");
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.association_gate_distance(), 100.0);
    assert_eq!(config.track_timeout_ms(), 1000);
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_malformed_toml_is_an_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[tracking\nassociation_gate_distance = ").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_negative_distance_fails_engine_construction() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[theft]\nproximity_distance = -150.0\n").unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    let result = Engine::new(config, Arc::new(Metrics::new()));
    assert!(matches!(result, Err(EngineError::Configuration(_))));
}

#[test]
fn test_shipped_dev_profile_is_valid() {
    let config = Config::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/config/dev.toml")).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.events_file(), "out/events.jsonl");
}
