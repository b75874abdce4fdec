//! Event records emitted by the engine
//!
//! Events are append-only. A condition that clears is reported by a new
//! corrective event (e.g. density falling back to `low`), never by retraction.

use crate::domain::types::TrackId;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable)
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ActivityChange,
    TheftSuspected,
    DensityLevelChanged,
    WeaponSighted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ActivityChange => "activity_change",
            EventKind::TheftSuspected => "theft_suspected",
            EventKind::DensityLevelChanged => "density_level_changed",
            EventKind::WeaponSighted => "weapon_sighted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Immutable event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// UUIDv7 event id
    pub id: String,
    pub kind: EventKind,
    /// Monotonic timestamp of the frame that produced the event
    pub timestamp_ms: u64,
    /// Wall clock at emission (epoch ms), for reports only
    pub emitted_at: u64,
    pub track_ids: SmallVec<[TrackId; 2]>,
    pub severity: Severity,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl Event {
    pub fn new(kind: EventKind, timestamp_ms: u64, severity: Severity) -> Self {
        Self {
            id: new_uuid_v7(),
            kind,
            timestamp_ms,
            emitted_at: epoch_ms(),
            track_ids: smallvec![],
            severity,
            details: BTreeMap::new(),
        }
    }

    pub fn with_track(mut self, id: TrackId) -> Self {
        self.track_ids.push(id);
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Detail value as a string slice, if present and a string
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(|v| v.as_str())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
