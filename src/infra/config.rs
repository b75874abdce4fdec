//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Every pixel threshold is expressed at the reference resolution
//! (640x480 unless overridden) and scaled per frame by `scale_factor`.

use crate::infra::error::EngineError;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub min_detection_score: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { min_detection_score: 0.5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Max centroid distance (px at reference resolution) to keep identity
    pub association_gate_distance: f64,
    /// Gate floor as a multiple of the track's last box diagonal (0 disables)
    pub gate_box_factor: f64,
    pub track_timeout_ms: u64,
    pub velocity_window_size: usize,
    /// Classes that get tracks (empty = every class)
    pub tracked_classes: Vec<String>,
    pub reference_width: u32,
    pub reference_height: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            association_gate_distance: 100.0,
            gate_box_factor: 1.0,
            track_timeout_ms: 1000,
            velocity_window_size: 5,
            tracked_classes: Vec::new(),
            reference_width: 640,
            reference_height: 480,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    pub jump_delta: f64,
    pub run_speed: f64,
    pub walk_speed: f64,
    pub exit_delta_x: f64,
    pub exit_delta_y: f64,
    /// Classes whose activity changes are reported
    pub activity_classes: Vec<String>,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            jump_delta: 40.0,
            run_speed: 80.0,
            walk_speed: 40.0,
            exit_delta_x: 70.0,
            exit_delta_y: 20.0,
            activity_classes: vec!["person".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TheftConfig {
    pub valuable_classes: Vec<String>,
    pub person_class: String,
    pub object_displacement: f64,
    pub proximity_distance: f64,
    pub theft_suppression_ms: u64,
}

impl Default for TheftConfig {
    fn default() -> Self {
        Self {
            valuable_classes: ["cell phone", "laptop", "backpack", "handbag", "suitcase", "wallet"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            person_class: "person".to_string(),
            object_displacement: 30.0,
            proximity_distance: 150.0,
            theft_suppression_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    pub low_density_count: usize,
    pub high_density_count: usize,
    /// Consecutive frames a new level must hold before it is reported
    pub density_hold_frames: u32,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self { low_density_count: 10, high_density_count: 30, density_hold_frames: 1 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    pub weapon_classes: Vec<String>,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self { weapon_classes: vec!["knife".to_string(), "gun".to_string()] }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub metrics_interval_secs: u64,
    /// Capacity of the event broadcast ring
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { metrics_interval_secs: 10, event_buffer: 1024 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EgressConfig {
    /// File path for event egress (JSONL format)
    pub events_file: String,
    /// File path for the human-readable report
    pub report_file: String,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self { events_file: "events.jsonl".to_string(), report_file: "report.txt".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
    #[serde(default)]
    pub theft: TheftConfig,
    #[serde(default)]
    pub density: DensityConfig,
    #[serde(default)]
    pub weapon: WeaponConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub egress: EgressConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    min_detection_score: f64,
    association_gate_distance: f64,
    gate_box_factor: f64,
    track_timeout_ms: u64,
    velocity_window_size: usize,
    tracked_classes: Vec<String>,
    reference_width: u32,
    reference_height: u32,
    jump_delta: f64,
    run_speed: f64,
    walk_speed: f64,
    exit_delta_x: f64,
    exit_delta_y: f64,
    activity_classes: Vec<String>,
    valuable_classes: Vec<String>,
    person_class: String,
    object_displacement: f64,
    proximity_distance: f64,
    theft_suppression_ms: u64,
    low_density_count: usize,
    high_density_count: usize,
    density_hold_frames: u32,
    weapon_classes: Vec<String>,
    metrics_interval_secs: u64,
    event_buffer: usize,
    events_file: String,
    report_file: String,
    log_json: bool,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            min_detection_score: toml_config.ingest.min_detection_score,
            association_gate_distance: toml_config.tracking.association_gate_distance,
            gate_box_factor: toml_config.tracking.gate_box_factor,
            track_timeout_ms: toml_config.tracking.track_timeout_ms,
            velocity_window_size: toml_config.tracking.velocity_window_size,
            tracked_classes: toml_config.tracking.tracked_classes,
            reference_width: toml_config.tracking.reference_width,
            reference_height: toml_config.tracking.reference_height,
            jump_delta: toml_config.activity.jump_delta,
            run_speed: toml_config.activity.run_speed,
            walk_speed: toml_config.activity.walk_speed,
            exit_delta_x: toml_config.activity.exit_delta_x,
            exit_delta_y: toml_config.activity.exit_delta_y,
            activity_classes: toml_config.activity.activity_classes,
            valuable_classes: toml_config.theft.valuable_classes,
            person_class: toml_config.theft.person_class,
            object_displacement: toml_config.theft.object_displacement,
            proximity_distance: toml_config.theft.proximity_distance,
            theft_suppression_ms: toml_config.theft.theft_suppression_ms,
            low_density_count: toml_config.density.low_density_count,
            high_density_count: toml_config.density.high_density_count,
            density_hold_frames: toml_config.density.density_hold_frames,
            weapon_classes: toml_config.weapon.weapon_classes,
            metrics_interval_secs: toml_config.pipeline.metrics_interval_secs,
            event_buffer: toml_config.pipeline.event_buffer,
            events_file: toml_config.egress.events_file,
            report_file: toml_config.egress.report_file,
            log_json: toml_config.logging.json,
            config_file: config_file.to_string(),
        }
    }

    /// Determine config file path from the command line or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration from a path, falling back to defaults if unreadable
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Reject threshold values the engine cannot run with
    ///
    /// Values are never clamped: a bad value is a deployment mistake.
    pub fn validate(&self) -> Result<(), EngineError> {
        fn non_negative(name: &str, value: f64) -> Result<(), EngineError> {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::Configuration(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, value
                )));
            }
            Ok(())
        }

        if !(0.0..=1.0).contains(&self.min_detection_score) {
            return Err(EngineError::Configuration(format!(
                "min_detection_score must be within [0, 1] (got {})",
                self.min_detection_score
            )));
        }
        non_negative("association_gate_distance", self.association_gate_distance)?;
        non_negative("gate_box_factor", self.gate_box_factor)?;
        non_negative("jump_delta", self.jump_delta)?;
        non_negative("run_speed", self.run_speed)?;
        non_negative("walk_speed", self.walk_speed)?;
        non_negative("exit_delta_x", self.exit_delta_x)?;
        non_negative("exit_delta_y", self.exit_delta_y)?;
        non_negative("object_displacement", self.object_displacement)?;
        non_negative("proximity_distance", self.proximity_distance)?;

        if self.track_timeout_ms == 0 {
            return Err(EngineError::Configuration("track_timeout_ms must be > 0".to_string()));
        }
        if self.velocity_window_size == 0 {
            return Err(EngineError::Configuration(
                "velocity_window_size must be > 0".to_string(),
            ));
        }
        if self.reference_width == 0 || self.reference_height == 0 {
            return Err(EngineError::Configuration(
                "reference resolution must be non-zero".to_string(),
            ));
        }
        if self.walk_speed > self.run_speed {
            return Err(EngineError::Configuration(format!(
                "walk_speed ({}) must not exceed run_speed ({})",
                self.walk_speed, self.run_speed
            )));
        }
        if self.low_density_count > self.high_density_count {
            return Err(EngineError::Configuration(format!(
                "low_density_count ({}) must not exceed high_density_count ({})",
                self.low_density_count, self.high_density_count
            )));
        }
        if self.density_hold_frames == 0 {
            return Err(EngineError::Configuration(
                "density_hold_frames must be > 0".to_string(),
            ));
        }
        if self.person_class.is_empty() {
            return Err(EngineError::Configuration("person_class must not be empty".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(EngineError::Configuration("event_buffer must be > 0".to_string()));
        }
        Ok(())
    }

    /// Ratio of the frame diagonal to the reference diagonal
    pub fn scale_factor(&self, width: u32, height: u32) -> f64 {
        let diag = |w: u32, h: u32| ((w as f64).powi(2) + (h as f64).powi(2)).sqrt();
        diag(width, height) / diag(self.reference_width, self.reference_height)
    }

    pub fn is_activity_class(&self, class: &str) -> bool {
        self.activity_classes.iter().any(|c| c == class)
    }

    // Getters for all config fields
    pub fn min_detection_score(&self) -> f64 {
        self.min_detection_score
    }

    pub fn association_gate_distance(&self) -> f64 {
        self.association_gate_distance
    }

    pub fn gate_box_factor(&self) -> f64 {
        self.gate_box_factor
    }

    pub fn track_timeout_ms(&self) -> u64 {
        self.track_timeout_ms
    }

    pub fn velocity_window_size(&self) -> usize {
        self.velocity_window_size
    }

    pub fn tracked_classes(&self) -> &[String] {
        &self.tracked_classes
    }

    pub fn reference_width(&self) -> u32 {
        self.reference_width
    }

    pub fn reference_height(&self) -> u32 {
        self.reference_height
    }

    pub fn jump_delta(&self) -> f64 {
        self.jump_delta
    }

    pub fn run_speed(&self) -> f64 {
        self.run_speed
    }

    pub fn walk_speed(&self) -> f64 {
        self.walk_speed
    }

    pub fn exit_delta_x(&self) -> f64 {
        self.exit_delta_x
    }

    pub fn exit_delta_y(&self) -> f64 {
        self.exit_delta_y
    }

    pub fn activity_classes(&self) -> &[String] {
        &self.activity_classes
    }

    pub fn valuable_classes(&self) -> &[String] {
        &self.valuable_classes
    }

    pub fn person_class(&self) -> &str {
        &self.person_class
    }

    pub fn object_displacement(&self) -> f64 {
        self.object_displacement
    }

    pub fn proximity_distance(&self) -> f64 {
        self.proximity_distance
    }

    pub fn theft_suppression_ms(&self) -> u64 {
        self.theft_suppression_ms
    }

    pub fn low_density_count(&self) -> usize {
        self.low_density_count
    }

    pub fn high_density_count(&self) -> usize {
        self.high_density_count
    }

    pub fn density_hold_frames(&self) -> u32 {
        self.density_hold_frames
    }

    pub fn weapon_classes(&self) -> &[String] {
        &self.weapon_classes
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn event_buffer(&self) -> usize {
        self.event_buffer
    }

    pub fn events_file(&self) -> &str {
        &self.events_file
    }

    pub fn report_file(&self) -> &str {
        &self.report_file
    }

    pub fn log_json(&self) -> bool {
        self.log_json
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    // Builder methods, used by tests and embedders
    pub fn with_min_detection_score(mut self, score: f64) -> Self {
        self.min_detection_score = score;
        self
    }

    pub fn with_association_gate_distance(mut self, px: f64) -> Self {
        self.association_gate_distance = px;
        self
    }

    pub fn with_gate_box_factor(mut self, factor: f64) -> Self {
        self.gate_box_factor = factor;
        self
    }

    pub fn with_track_timeout_ms(mut self, ms: u64) -> Self {
        self.track_timeout_ms = ms;
        self
    }

    pub fn with_velocity_window_size(mut self, size: usize) -> Self {
        self.velocity_window_size = size;
        self
    }

    pub fn with_tracked_classes(mut self, classes: &[&str]) -> Self {
        self.tracked_classes = classes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_activity_speeds(mut self, walk_speed: f64, run_speed: f64) -> Self {
        self.walk_speed = walk_speed;
        self.run_speed = run_speed;
        self
    }

    pub fn with_theft_suppression_ms(mut self, ms: u64) -> Self {
        self.theft_suppression_ms = ms;
        self
    }

    pub fn with_density_counts(mut self, low: usize, high: usize) -> Self {
        self.low_density_count = low;
        self.high_density_count = high;
        self
    }

    pub fn with_density_hold_frames(mut self, frames: u32) -> Self {
        self.density_hold_frames = frames;
        self
    }
}
