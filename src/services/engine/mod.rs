//! Track-and-classify engine
//!
//! The Engine owns all per-run state and drives one frame to completion:
//! - Detection ingest (frame checks, per-detection validation)
//! - Track registry (expiry, association, creation)
//! - Motion estimation and activity classification
//! - Event rules (weapon sighting, activity change, theft, density)
//! - Publication to the registered sinks
//!
//! Events of a frame are collected first and published only after every
//! stage has run, so a frame never produces a partial event set.
//! The engine is not internally synchronized; drive it from one task.

mod handlers;

use crate::domain::event::Event;
use crate::domain::track::TrackSnapshot;
use crate::domain::types::{DensityLevel, FrameDetections};
use crate::infra::config::Config;
use crate::infra::error::{EngineError, InferenceFailure};
use crate::infra::metrics::Metrics;
use crate::io::event_bus::EventSink;
use crate::services::activity_events::ActivityEmitter;
use crate::services::associator::{Associator, GreedyAssociator};
use crate::services::classifier::ActivityClassifier;
use crate::services::density::DensityMonitor;
use crate::services::ingest::DetectionIngest;
use crate::services::registry::TrackRegistry;
use crate::services::theft::TheftDetector;
use crate::services::weapon::WeaponRule;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Engine {
    pub(crate) config: Config,
    pub(crate) ingest: DetectionIngest,
    pub(crate) registry: TrackRegistry,
    pub(crate) classifier: ActivityClassifier,
    pub(crate) activity_events: ActivityEmitter,
    pub(crate) theft: TheftDetector,
    pub(crate) density: DensityMonitor,
    pub(crate) weapon: WeaponRule,
    /// Output port consumers, in registration order
    pub(crate) sinks: Vec<Box<dyn EventSink>>,
    pub(crate) metrics: Arc<Metrics>,
    /// Timestamp of the last accepted frame or inference failure
    pub(crate) last_timestamp_ms: Option<u64>,
    pub(crate) running: bool,
}

impl Engine {
    /// Build an engine with the default greedy associator
    ///
    /// Fails fast on invalid thresholds.
    pub fn new(config: Config, metrics: Arc<Metrics>) -> Result<Self, EngineError> {
        Self::with_associator(config, metrics, Box::new(GreedyAssociator))
    }

    pub fn with_associator(
        config: Config,
        metrics: Arc<Metrics>,
        associator: Box<dyn Associator>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        info!(
            associator = %associator.name(),
            gate_px = %config.association_gate_distance(),
            track_timeout_ms = %config.track_timeout_ms(),
            window = %config.velocity_window_size(),
            low_density = %config.low_density_count(),
            high_density = %config.high_density_count(),
            "engine_created"
        );

        Ok(Self {
            ingest: DetectionIngest::new(config.min_detection_score()),
            registry: TrackRegistry::with_associator(&config, associator),
            classifier: ActivityClassifier::new(&config),
            activity_events: ActivityEmitter::new(),
            theft: TheftDetector::new(&config),
            density: DensityMonitor::new(&config),
            weapon: WeaponRule::new(config.weapon_classes()),
            sinks: Vec::new(),
            metrics,
            last_timestamp_ms: None,
            running: true,
            config,
        })
    }

    /// Register an output consumer
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Input port: process one frame; problems are logged and counted
    pub fn submit_frame(&mut self, frame: &FrameDetections) {
        if let Err(e) = self.process_frame(frame) {
            warn!(timestamp_ms = %frame.timestamp_ms, error = %e, "frame_rejected");
        }
    }

    /// Process one frame to completion and return the events it published
    pub fn process_frame(&mut self, frame: &FrameDetections) -> Result<Vec<Event>, EngineError> {
        if !self.running {
            debug!(timestamp_ms = %frame.timestamp_ms, "frame_ignored_stopped");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        if let Err(e) = self.ingest.check_frame(frame, self.last_timestamp_ms) {
            if frame.width == 0 || frame.height == 0 {
                self.metrics.record_frame_invalid();
            } else {
                self.metrics.record_frame_stale();
            }
            return Err(e);
        }

        let now = frame.timestamp_ms;
        self.last_timestamp_ms = Some(now);
        let scale = self.config.scale_factor(frame.width, frame.height);

        let detections = self.normalize_detections(frame);
        self.expire_tracks(now);

        let update = self.registry.associate(&detections, now, scale);
        for _ in &update.created {
            self.metrics.record_track_created();
        }

        let mut events = Vec::new();
        self.apply_weapon_rule(&update.created, now, &mut events);
        self.classify_tracks(&update.matched, now, scale, &mut events);

        let mut seen = update.matched.clone();
        seen.extend_from_slice(&update.created);
        seen.sort_unstable();
        self.apply_theft_rule(&seen, now, scale, &mut events);
        self.apply_density_rule(now, &mut events);

        self.publish(now, &events);

        let latency_us = started.elapsed().as_micros() as u64;
        self.metrics.record_frame_processed(latency_us);
        debug!(
            timestamp_ms = %now,
            detections = %detections.len(),
            matched = %update.matched.len(),
            created = %update.created.len(),
            untracked = %update.untracked,
            live_tracks = %self.registry.len(),
            events = %events.len(),
            latency_us = %latency_us,
            "frame_processed"
        );
        Ok(events)
    }

    /// The detection model failed for a frame: skip association, but keep
    /// ageing tracks against the failed frame's time
    pub fn submit_failure(&mut self, failure: &InferenceFailure) {
        if !self.running {
            return;
        }
        self.metrics.record_inference_failure();
        warn!(
            seq = %failure.seq,
            timestamp_ms = %failure.timestamp_ms,
            reason = %failure.reason,
            "inference_failed"
        );

        if self.last_timestamp_ms.is_some_and(|last| failure.timestamp_ms < last) {
            return;
        }
        self.last_timestamp_ms = Some(failure.timestamp_ms);
        self.expire_tracks(failure.timestamp_ms);
        self.publish(failure.timestamp_ms, &[]);
    }

    /// Snapshot of live tracks, sorted by id
    pub fn current_tracks(&self) -> Vec<TrackSnapshot> {
        self.registry.sorted().into_iter().map(|t| t.snapshot()).collect()
    }

    /// Drop all tracks and rule state; further frames are ignored until `start`
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        let dropped = self.registry.len();
        self.running = false;
        self.registry.clear();
        self.theft.reset();
        self.activity_events.reset();
        self.density.reset();
        self.last_timestamp_ms = None;
        info!(dropped_tracks = %dropped, "engine_stopped");
    }

    /// Re-arm a stopped engine with fresh state
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        info!("engine_started");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn active_tracks(&self) -> usize {
        self.registry.len()
    }

    pub fn density_level(&self) -> DensityLevel {
        self.density.level()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
