//! Track model: one persistent identity per physical entity

use crate::domain::types::{Activity, BoundingBox, Detection, Point, TrackId};
use serde::Serialize;
use std::collections::VecDeque;

/// Push onto a bounded history, evicting the oldest sample
fn push_bounded<T>(history: &mut VecDeque<T>, value: T, capacity: usize) {
    history.push_back(value);
    while history.len() > capacity {
        history.pop_front();
    }
}

/// Engine-owned tracked entity
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    /// Class at creation, never re-classified
    pub class: String,
    pub center: Point,
    pub bbox: BoundingBox,
    /// Recent centroids, newest last
    pub position_history: VecDeque<Point>,
    /// Recent per-observation displacement magnitudes, newest last
    pub velocity_history: VecDeque<f64>,
    pub last_seen_ms: u64,
    pub created_ms: u64,
    pub activity: Activity,
    /// Number of matched detections, including the one that created it
    pub observations: u64,
    window: usize,
}

impl Track {
    pub fn new(id: TrackId, detection: &Detection, now_ms: u64, window: usize) -> Self {
        let mut position_history = VecDeque::with_capacity(window + 1);
        position_history.push_back(detection.centroid);
        Self {
            id,
            class: detection.class.clone(),
            center: detection.centroid,
            bbox: detection.bbox,
            position_history,
            velocity_history: VecDeque::with_capacity(window + 1),
            last_seen_ms: now_ms,
            created_ms: now_ms,
            activity: Activity::New,
            observations: 1,
            window,
        }
    }

    /// Fold a matched detection into the track, returning this frame's displacement
    pub fn observe(&mut self, detection: &Detection, now_ms: u64) -> f64 {
        let displacement = self.center.distance(&detection.centroid);
        self.center = detection.centroid;
        self.bbox = detection.bbox;
        push_bounded(&mut self.position_history, detection.centroid, self.window);
        push_bounded(&mut self.velocity_history, displacement, self.window);
        self.last_seen_ms = now_ms;
        self.observations += 1;
        displacement
    }

    /// Centroid before the most recent observation
    pub fn previous_center(&self) -> Option<Point> {
        let len = self.position_history.len();
        if len < 2 {
            return None;
        }
        self.position_history.get(len - 2).copied()
    }

    #[inline]
    pub fn is_expired(&self, now_ms: u64, timeout_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_seen_ms) > timeout_ms
    }

    pub fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            id: self.id,
            class: self.class.clone(),
            center: self.center,
            bbox: self.bbox,
            activity: self.activity,
            last_seen_ms: self.last_seen_ms,
            created_ms: self.created_ms,
            observations: self.observations,
        }
    }
}

/// Read-only copy of a track for overlay rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub class: String,
    pub center: Point,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub activity: Activity,
    pub last_seen_ms: u64,
    pub created_ms: u64,
    pub observations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f64, y: f64) -> Detection {
        let bbox = BoundingBox::new(x, y, 10.0, 10.0);
        Detection { class: "person".to_string(), score: 0.9, bbox, centroid: bbox.centroid() }
    }

    #[test]
    fn test_new_track_has_no_velocity() {
        let track = Track::new(TrackId(1), &det(0.0, 0.0), 0, 5);
        assert_eq!(track.activity, Activity::New);
        assert!(track.velocity_history.is_empty());
        assert!(track.previous_center().is_none());
    }

    #[test]
    fn test_observe_records_displacement() {
        let mut track = Track::new(TrackId(1), &det(0.0, 0.0), 0, 5);
        let moved = track.observe(&det(3.0, 4.0), 33);
        assert_eq!(moved, 5.0);
        assert_eq!(track.last_seen_ms, 33);
        assert_eq!(track.previous_center(), Some(Point::new(5.0, 5.0)));
        assert_eq!(track.center, Point::new(8.0, 9.0));
    }

    #[test]
    fn test_histories_are_bounded() {
        let mut track = Track::new(TrackId(1), &det(0.0, 0.0), 0, 5);
        for i in 1..=20 {
            track.observe(&det(i as f64, 0.0), i * 33);
        }
        assert_eq!(track.position_history.len(), 5);
        assert_eq!(track.velocity_history.len(), 5);
        assert_eq!(track.observations, 21);
    }

    #[test]
    fn test_expiry_is_strict() {
        let track = Track::new(TrackId(1), &det(0.0, 0.0), 1000, 5);
        assert!(!track.is_expired(2000, 1000));
        assert!(track.is_expired(2001, 1000));
    }
}
