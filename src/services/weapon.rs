//! Weapon sighting rule: one critical event when a weapon-class track appears

use crate::domain::event::{Event, EventKind, Severity};
use crate::domain::track::Track;
use tracing::warn;

pub struct WeaponRule {
    weapon_classes: Vec<String>,
}

impl WeaponRule {
    pub fn new(weapon_classes: &[String]) -> Self {
        Self { weapon_classes: weapon_classes.to_vec() }
    }

    /// Called once per newly created track
    pub fn on_track_created(&self, track: &Track, now_ms: u64) -> Option<Event> {
        if !self.weapon_classes.iter().any(|c| *c == track.class) {
            return None;
        }
        warn!(track_id = %track.id, class = %track.class, "weapon_sighted");
        Some(
            Event::new(EventKind::WeaponSighted, now_ms, Severity::Critical)
                .with_track(track.id)
                .with_detail("class", track.class.as_str())
                .with_detail("x", track.center.x)
                .with_detail("y", track.center.y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{BoundingBox, Detection, TrackId};

    fn track(class: &str) -> Track {
        let bbox = BoundingBox::new(10.0, 10.0, 20.0, 40.0);
        let det = Detection { class: class.to_string(), score: 0.8, bbox, centroid: bbox.centroid() };
        Track::new(TrackId(9), &det, 500, 5)
    }

    #[test]
    fn test_weapon_track_emits_critical() {
        let rule = WeaponRule::new(&["knife".to_string(), "gun".to_string()]);
        let event = rule.on_track_created(&track("knife"), 500).unwrap();
        assert_eq!(event.kind, EventKind::WeaponSighted);
        assert_eq!(event.severity, Severity::Critical);
        assert_eq!(event.track_ids.as_slice(), &[TrackId(9)]);
        assert_eq!(event.detail_str("class"), Some("knife"));
    }

    #[test]
    fn test_other_classes_are_ignored() {
        let rule = WeaponRule::new(&["knife".to_string()]);
        assert!(rule.on_track_created(&track("person"), 500).is_none());
    }
}
