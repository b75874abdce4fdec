//! Suspicious-activity emitter
//!
//! Emits `ActivityChange` when a track enters a non-standing state, not on
//! every frame the state persists. Returning to `Standing` re-arms the track.

use crate::domain::event::{Event, EventKind, Severity};
use crate::domain::track::Track;
use crate::domain::types::{Activity, TrackId};
use crate::services::registry::TrackRegistry;
use rustc_hash::FxHashMap;
use tracing::info;

#[derive(Default)]
pub struct ActivityEmitter {
    /// Last notable activity reported per track
    last_emitted: FxHashMap<TrackId, Activity>,
}

pub fn severity_for(activity: Activity) -> Severity {
    match activity {
        Activity::Running | Activity::Jumping | Activity::QuickExit => Severity::High,
        Activity::Walking | Activity::Standing | Activity::New => Severity::Low,
    }
}

impl ActivityEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect a freshly classified track
    pub fn observe(&mut self, track: &Track, now_ms: u64) -> Option<Event> {
        let activity = track.activity;
        if !activity.is_notable() {
            if activity == Activity::Standing {
                self.last_emitted.remove(&track.id);
            }
            return None;
        }

        let previous = self.last_emitted.insert(track.id, activity);
        if previous == Some(activity) {
            return None;
        }

        info!(
            track_id = %track.id,
            class = %track.class,
            activity = %activity,
            previous = %previous.map(|a| a.as_str()).unwrap_or("standing"),
            "activity_change"
        );
        Some(
            Event::new(EventKind::ActivityChange, now_ms, severity_for(activity))
                .with_track(track.id)
                .with_detail("activity", activity.as_str())
                .with_detail("class", track.class.as_str()),
        )
    }

    pub fn retain_live(&mut self, registry: &TrackRegistry) {
        self.last_emitted.retain(|id, _| registry.contains(*id));
    }

    pub fn reset(&mut self) {
        self.last_emitted.clear();
    }
}
