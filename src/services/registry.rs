//! Track registry - identity resolution and track lifecycle
//!
//! Per frame: expire stale tracks first, then associate each tracked class
//! independently. Unmatched detections spawn new tracks; unmatched tracks are
//! left alone until they time out. Expiry is the only deletion path.

use crate::domain::track::Track;
use crate::domain::types::{Detection, Point, TrackId};
use crate::infra::config::Config;
use crate::services::associator::{Associator, Candidate, GreedyAssociator};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What changed in the registry during one frame
#[derive(Debug, Default)]
pub struct RegistryUpdate {
    /// Existing tracks that absorbed a detection, ascending id
    pub matched: Vec<TrackId>,
    /// Tracks spawned this frame, in allocation order
    pub created: Vec<TrackId>,
    /// Detections skipped because their class is not tracked
    pub untracked: usize,
}

pub struct TrackRegistry {
    tracks: FxHashMap<TrackId, Track>,
    next_id: u64,
    associator: Box<dyn Associator>,
    gate_distance: f64,
    gate_box_factor: f64,
    timeout_ms: u64,
    window: usize,
    tracked_classes: Vec<String>,
}

impl TrackRegistry {
    pub fn new(config: &Config) -> Self {
        Self::with_associator(config, Box::new(GreedyAssociator))
    }

    pub fn with_associator(config: &Config, associator: Box<dyn Associator>) -> Self {
        Self {
            tracks: FxHashMap::default(),
            next_id: 1,
            associator,
            gate_distance: config.association_gate_distance(),
            gate_box_factor: config.gate_box_factor(),
            timeout_ms: config.track_timeout_ms(),
            window: config.velocity_window_size(),
            tracked_classes: config.tracked_classes().to_vec(),
        }
    }

    fn is_tracked(&self, class: &str) -> bool {
        self.tracked_classes.is_empty() || self.tracked_classes.iter().any(|c| c == class)
    }

    /// Remove every track unseen for longer than the timeout
    pub fn expire(&mut self, now_ms: u64) -> Vec<Track> {
        let timeout = self.timeout_ms;
        let mut expired_ids: Vec<TrackId> = self
            .tracks
            .values()
            .filter(|t| t.is_expired(now_ms, timeout))
            .map(|t| t.id)
            .collect();
        expired_ids.sort_unstable();

        let mut expired = Vec::with_capacity(expired_ids.len());
        for id in expired_ids {
            if let Some(track) = self.tracks.remove(&id) {
                info!(
                    track_id = %track.id,
                    class = %track.class,
                    age_ms = %now_ms.saturating_sub(track.created_ms),
                    observations = %track.observations,
                    "track_expired"
                );
                expired.push(track);
            }
        }
        expired
    }

    /// Associate this frame's detections with live tracks
    ///
    /// `scale` converts reference-resolution gate distances to frame pixels.
    pub fn associate(&mut self, detections: &[Detection], now_ms: u64, scale: f64) -> RegistryUpdate {
        let mut update = RegistryUpdate::default();

        // BTreeMap keeps class processing order deterministic
        let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, det) in detections.iter().enumerate() {
            if self.is_tracked(&det.class) {
                by_class.entry(det.class.as_str()).or_default().push(idx);
            } else {
                update.untracked += 1;
            }
        }

        for (class, det_indices) in by_class {
            let mut candidates: Vec<Candidate> = self
                .tracks
                .values()
                .filter(|t| t.class == class)
                .map(|t| Candidate {
                    track_id: t.id,
                    center: t.center,
                    gate: self.gate_for(t, scale),
                })
                .collect();
            candidates.sort_unstable_by_key(|c| c.track_id);

            let points: Vec<Point> =
                det_indices.iter().map(|&i| detections[i].centroid).collect();
            let assignments = self.associator.associate(&candidates, &points);

            let mut consumed = vec![false; det_indices.len()];
            for a in &assignments {
                let id = candidates[a.track].track_id;
                let det = &detections[det_indices[a.detection]];
                if let Some(track) = self.tracks.get_mut(&id) {
                    let moved = track.observe(det, now_ms);
                    consumed[a.detection] = true;
                    update.matched.push(id);
                    debug!(track_id = %id, class = %class, moved_px = %format!("{:.1}", moved), "track_matched");
                }
            }

            for (local, &det_idx) in det_indices.iter().enumerate() {
                if consumed[local] {
                    continue;
                }
                let id = self.allocate_id();
                let track = Track::new(id, &detections[det_idx], now_ms, self.window);
                info!(
                    track_id = %id,
                    class = %track.class,
                    x = %format!("{:.1}", track.center.x),
                    y = %format!("{:.1}", track.center.y),
                    "track_created"
                );
                self.tracks.insert(id, track);
                update.created.push(id);
            }
        }

        update.matched.sort_unstable();
        update
    }

    /// Size-aware gate: the larger of the scaled fixed gate and a multiple of
    /// the track's own box diagonal
    fn gate_for(&self, track: &Track, scale: f64) -> f64 {
        (self.gate_distance * scale).max(self.gate_box_factor * track.bbox.diagonal())
    }

    fn allocate_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.tracks.contains_key(&id)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Live tracks sorted by id
    pub fn sorted(&self) -> Vec<&Track> {
        let mut tracks: Vec<&Track> = self.tracks.values().collect();
        tracks.sort_unstable_by_key(|t| t.id);
        tracks
    }

    pub fn count_class(&self, class: &str) -> usize {
        self.tracks.values().filter(|t| t.class == class).count()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn associator_name(&self) -> &'static str {
        self.associator.name()
    }

    /// Drop every track. Ids keep counting so none is ever reused.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::BoundingBox;
    use crate::services::associator::Assignment;

    fn det(class: &str, x: f64, y: f64) -> Detection {
        let bbox = BoundingBox::new(x, y, 20.0, 20.0);
        Detection { class: class.to_string(), score: 0.9, bbox, centroid: bbox.centroid() }
    }

    fn registry() -> TrackRegistry {
        TrackRegistry::new(&Config::default())
    }

    #[test]
    fn test_first_frame_creates_tracks() {
        let mut reg = registry();
        let update = reg.associate(&[det("person", 0.0, 0.0), det("person", 300.0, 0.0)], 0, 1.0);
        assert_eq!(update.created, vec![TrackId(1), TrackId(2)]);
        assert!(update.matched.is_empty());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_nearby_detection_keeps_identity() {
        let mut reg = registry();
        reg.associate(&[det("person", 0.0, 0.0)], 0, 1.0);
        let update = reg.associate(&[det("person", 60.0, 0.0)], 33, 1.0);
        assert_eq!(update.matched, vec![TrackId(1)]);
        assert!(update.created.is_empty());
        assert_eq!(reg.get(TrackId(1)).map(|t| t.observations), Some(2));
    }

    #[test]
    fn test_far_detection_spawns_new_track() {
        let mut reg = registry();
        reg.associate(&[det("person", 0.0, 0.0)], 0, 1.0);
        let update = reg.associate(&[det("person", 200.0, 0.0)], 33, 1.0);
        assert_eq!(update.created, vec![TrackId(2)]);
        // The unmatched track survives until timeout
        assert!(reg.contains(TrackId(1)));
    }

    #[test]
    fn test_classes_never_cross_match() {
        let mut reg = registry();
        reg.associate(&[det("person", 0.0, 0.0)], 0, 1.0);
        let update = reg.associate(&[det("laptop", 5.0, 0.0)], 33, 1.0);
        assert_eq!(update.created, vec![TrackId(2)]);
        assert_eq!(reg.count_class("person"), 1);
        assert_eq!(reg.count_class("laptop"), 1);
    }

    #[test]
    fn test_untracked_classes_are_skipped() {
        let config = Config::default().with_tracked_classes(&["person"]);
        let mut reg = TrackRegistry::new(&config);
        let update = reg.associate(&[det("dog", 0.0, 0.0)], 0, 1.0);
        assert_eq!(update.untracked, 1);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_expiry_and_no_id_reuse() {
        let mut reg = registry();
        reg.associate(&[det("person", 0.0, 0.0)], 0, 1.0);
        assert!(reg.expire(1000).is_empty());
        let expired = reg.expire(1001);
        assert_eq!(expired.len(), 1);
        assert!(reg.is_empty());

        let update = reg.associate(&[det("person", 0.0, 0.0)], 1002, 1.0);
        assert_eq!(update.created, vec![TrackId(2)]);
    }

    #[test]
    fn test_gate_scales_with_frame() {
        let config = Config::default().with_gate_box_factor(0.0);
        let mut reg = TrackRegistry::new(&config);
        reg.associate(&[det("person", 0.0, 0.0)], 0, 2.0);
        // 150px is outside the 100px reference gate but inside it at 2x scale
        let update = reg.associate(&[det("person", 150.0, 0.0)], 33, 2.0);
        assert_eq!(update.matched, vec![TrackId(1)]);
    }

    struct NeverMatch;

    impl Associator for NeverMatch {
        fn associate(&self, _tracks: &[Candidate], _detections: &[Point]) -> Vec<Assignment> {
            Vec::new()
        }

        fn name(&self) -> &'static str {
            "never"
        }
    }

    #[test]
    fn test_associator_is_pluggable() {
        let mut reg = TrackRegistry::with_associator(&Config::default(), Box::new(NeverMatch));
        assert_eq!(reg.associator_name(), "never");
        reg.associate(&[det("person", 0.0, 0.0)], 0, 1.0);
        let update = reg.associate(&[det("person", 0.0, 0.0)], 33, 1.0);
        assert_eq!(update.created, vec![TrackId(2)]);
    }
}
