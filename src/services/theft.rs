//! Theft heuristic - a valuable object moves while a person is close to it
//!
//! Each valuable-class track seen this frame is compared with the centroid
//! recorded at its previous check. When it moved further than the
//! displacement threshold, the nearest person track within the proximity
//! threshold is blamed. Repeat triggers for the same object are suppressed
//! for `theft_suppression_ms`.

use crate::domain::event::{Event, EventKind, Severity};
use crate::domain::track::Track;
use crate::domain::types::{Point, TrackId};
use crate::infra::config::Config;
use crate::services::registry::TrackRegistry;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

pub struct TheftDetector {
    valuable_classes: Vec<String>,
    person_class: String,
    object_displacement: f64,
    proximity_distance: f64,
    suppression_ms: u64,
    /// Object centroid at its last check
    last_checked: FxHashMap<TrackId, Point>,
    /// Object id -> end of its suppression window (exclusive)
    suppressed_until: FxHashMap<TrackId, u64>,
}

impl TheftDetector {
    pub fn new(config: &Config) -> Self {
        Self {
            valuable_classes: config.valuable_classes().to_vec(),
            person_class: config.person_class().to_string(),
            object_displacement: config.object_displacement(),
            proximity_distance: config.proximity_distance(),
            suppression_ms: config.theft_suppression_ms(),
            last_checked: FxHashMap::default(),
            suppressed_until: FxHashMap::default(),
        }
    }

    fn is_valuable(&self, class: &str) -> bool {
        self.valuable_classes.iter().any(|c| c == class)
    }

    /// Evaluate every valuable track that was observed this frame
    pub fn evaluate(
        &mut self,
        registry: &TrackRegistry,
        seen: &[TrackId],
        now_ms: u64,
        scale: f64,
    ) -> Vec<Event> {
        let mut events = Vec::new();

        for &id in seen {
            let Some(object) = registry.get(id) else { continue };
            if !self.is_valuable(&object.class) {
                continue;
            }

            let Some(previous) = self.last_checked.insert(id, object.center) else {
                // First sighting only records the baseline
                continue;
            };
            let displacement = previous.distance(&object.center);
            if displacement <= self.object_displacement * scale {
                continue;
            }

            let Some((person, distance)) = self.nearest_person(registry, object, scale) else {
                continue;
            };

            if let Some(&until) = self.suppressed_until.get(&id) {
                if now_ms < until {
                    debug!(object_id = %id, person_id = %person, "theft_suppressed");
                    continue;
                }
            }
            self.suppressed_until.insert(id, now_ms + self.suppression_ms);

            info!(
                object_id = %id,
                object_class = %object.class,
                person_id = %person,
                distance_px = %format!("{:.1}", distance),
                displacement_px = %format!("{:.1}", displacement),
                "theft_suspected"
            );
            events.push(
                Event::new(EventKind::TheftSuspected, now_ms, Severity::High)
                    .with_track(id)
                    .with_track(person)
                    .with_detail("object_class", object.class.as_str())
                    .with_detail("distance_px", distance)
                    .with_detail("displacement_px", displacement),
            );
        }

        events
    }

    /// Closest live person strictly inside the proximity radius; ties go to the lower id
    fn nearest_person(
        &self,
        registry: &TrackRegistry,
        object: &Track,
        scale: f64,
    ) -> Option<(TrackId, f64)> {
        let radius = self.proximity_distance * scale;
        registry
            .tracks()
            .filter(|t| t.class == self.person_class)
            .map(|t| (t.id, t.center.distance(&object.center)))
            .filter(|(_, d)| *d < radius)
            .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
    }

    /// Forget state for tracks that no longer exist
    pub fn retain_live(&mut self, registry: &TrackRegistry) {
        self.last_checked.retain(|id, _| registry.contains(*id));
        self.suppressed_until.retain(|id, _| registry.contains(*id));
    }

    pub fn reset(&mut self) {
        self.last_checked.clear();
        self.suppressed_until.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{BoundingBox, Detection};

    fn det(class: &str, x: f64, y: f64) -> Detection {
        let bbox = BoundingBox::new(x, y, 20.0, 20.0);
        Detection { class: class.to_string(), score: 0.9, bbox, centroid: bbox.centroid() }
    }

    /// Registry with a person parked at (200, 200) and a laptop track
    fn setup(laptop_x: f64) -> (TrackRegistry, TrackId) {
        let mut reg = TrackRegistry::new(&Config::default());
        let update =
            reg.associate(&[det("person", 200.0, 200.0), det("laptop", laptop_x, 200.0)], 0, 1.0);
        let laptop = update.created.iter().copied().find(|id| {
            reg.get(*id).map(|t| t.class == "laptop").unwrap_or(false)
        });
        (reg, laptop.unwrap())
    }

    fn step(reg: &mut TrackRegistry, laptop_x: f64, now: u64) -> Vec<TrackId> {
        let update =
            reg.associate(&[det("person", 200.0, 200.0), det("laptop", laptop_x, 200.0)], now, 1.0);
        update.matched
    }

    #[test]
    fn test_moving_object_near_person_triggers() {
        let (mut reg, laptop) = setup(250.0);
        let mut theft = TheftDetector::new(&Config::default());
        assert!(theft.evaluate(&reg, &[laptop], 0, 1.0).is_empty());

        let seen = step(&mut reg, 290.0, 33);
        let events = theft.evaluate(&reg, &seen, 33, 1.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::TheftSuspected);
        assert_eq!(events[0].track_ids[0], laptop);
        assert_eq!(events[0].severity, Severity::High);
    }

    #[test]
    fn test_small_movement_is_ignored() {
        let (mut reg, laptop) = setup(250.0);
        let mut theft = TheftDetector::new(&Config::default());
        theft.evaluate(&reg, &[laptop], 0, 1.0);
        let seen = step(&mut reg, 280.0, 33);
        assert!(theft.evaluate(&reg, &seen, 33, 1.0).is_empty());
    }

    #[test]
    fn test_far_person_is_not_blamed() {
        let (mut reg, laptop) = setup(500.0);
        let mut theft = TheftDetector::new(&Config::default());
        theft.evaluate(&reg, &[laptop], 0, 1.0);
        let seen = step(&mut reg, 560.0, 33);
        assert!(theft.evaluate(&reg, &seen, 33, 1.0).is_empty());
    }

    #[test]
    fn test_suppression_window() {
        let (mut reg, laptop) = setup(250.0);
        let mut theft = TheftDetector::new(&Config::default());
        theft.evaluate(&reg, &[laptop], 0, 1.0);

        let seen = step(&mut reg, 290.0, 33);
        assert_eq!(theft.evaluate(&reg, &seen, 33, 1.0).len(), 1);
        let seen = step(&mut reg, 250.0, 66);
        assert!(theft.evaluate(&reg, &seen, 66, 1.0).is_empty());

        // Window closes at 33 + 5000
        let seen = step(&mut reg, 290.0, 5033);
        assert_eq!(theft.evaluate(&reg, &seen, 5033, 1.0).len(), 1);
    }
}
