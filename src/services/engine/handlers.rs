//! Per-frame stages of the Engine
//!
//! Each stage reads or updates engine state and appends to the frame's
//! event list. None of them can fail the frame: a track a rule cannot
//! evaluate is skipped and logged.

use super::Engine;
use crate::domain::event::Event;
use crate::domain::types::{Detection, FrameDetections, TrackId};
use crate::services::motion;
use tracing::{trace, warn};

impl Engine {
    /// Validate the frame's detections, counting rejections
    pub(crate) fn normalize_detections(&mut self, frame: &FrameDetections) -> Vec<Detection> {
        let outcome = self.ingest.normalize(frame);
        for &(idx, reason) in &outcome.rejected {
            self.metrics.record_detection_rejected(reason);
            if let Some(raw) = frame.detections.get(idx) {
                trace!(
                    timestamp_ms = %frame.timestamp_ms,
                    class = %raw.class,
                    score = %raw.score,
                    reason = %reason.as_str(),
                    "detection_rejected"
                );
            }
        }
        self.metrics.record_detections_accepted(outcome.accepted.len() as u64);
        outcome.accepted
    }

    /// Remove timed-out tracks and forget rule state that referenced them
    pub(crate) fn expire_tracks(&mut self, now_ms: u64) {
        let expired = self.registry.expire(now_ms);
        if expired.is_empty() {
            return;
        }
        self.metrics.record_tracks_expired(expired.len() as u64);
        self.theft.retain_live(&self.registry);
        self.activity_events.retain_live(&self.registry);
    }

    pub(crate) fn apply_weapon_rule(&mut self, created: &[TrackId], now_ms: u64, events: &mut Vec<Event>) {
        for &id in created {
            if let Some(track) = self.registry.get(id) {
                if let Some(event) = self.weapon.on_track_created(track, now_ms) {
                    events.push(event);
                }
            }
        }
    }

    /// Re-classify every track that absorbed a detection this frame
    pub(crate) fn classify_tracks(
        &mut self,
        matched: &[TrackId],
        now_ms: u64,
        scale: f64,
        events: &mut Vec<Event>,
    ) {
        for &id in matched {
            let Some(track) = self.registry.get_mut(id) else {
                continue;
            };
            let Some(estimate) = motion::estimate(track) else {
                warn!(track_id = %id, class = %track.class, "track_skipped_malformed");
                self.metrics.record_track_skipped();
                continue;
            };
            track.activity = self.classifier.classify(&estimate, scale);

            if self.config.is_activity_class(&track.class) {
                if let Some(event) = self.activity_events.observe(track, now_ms) {
                    events.push(event);
                }
            }
        }
    }

    pub(crate) fn apply_theft_rule(
        &mut self,
        seen: &[TrackId],
        now_ms: u64,
        scale: f64,
        events: &mut Vec<Event>,
    ) {
        events.extend(self.theft.evaluate(&self.registry, seen, now_ms, scale));
    }

    pub(crate) fn apply_density_rule(&mut self, now_ms: u64, events: &mut Vec<Event>) {
        let persons = self.registry.count_class(self.config.person_class());
        if let Some(event) = self.density.observe(persons, now_ms) {
            events.push(event);
        }
    }

    /// Hand the frame's events, then the track snapshot, to every sink
    pub(crate) fn publish(&mut self, now_ms: u64, events: &[Event]) {
        for event in events {
            self.metrics.record_event(event.kind);
        }
        if self.sinks.is_empty() {
            return;
        }
        let snapshot = self.current_tracks();
        for sink in &mut self.sinks {
            for event in events {
                sink.publish(event);
            }
            sink.on_frame(now_ms, &snapshot);
        }
    }
}
