//! Output port - event subscription and track snapshots
//!
//! The engine pushes every emitted event, in order, to each registered
//! `EventSink`, then offers the frame's track snapshot. `EventBus` fans both
//! out to async consumers: events over a bounded broadcast ring (slow
//! subscribers lag and skip, they never block the engine), snapshots over a
//! watch channel that always holds the latest frame.

use crate::domain::event::Event;
use crate::domain::track::TrackSnapshot;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::debug;

/// Consumer of the engine's output
pub trait EventSink: Send {
    fn publish(&mut self, event: &Event);

    /// Called once per processed frame with the live tracks, sorted by id
    fn on_frame(&mut self, _timestamp_ms: u64, _tracks: &[TrackSnapshot]) {}
}

/// Latest per-frame view for overlay rendering
#[derive(Debug, Clone, Default)]
pub struct FrameSnapshot {
    pub timestamp_ms: u64,
    pub tracks: Vec<TrackSnapshot>,
}

pub struct EventBus {
    events: broadcast::Sender<Event>,
    snapshots: Arc<watch::Sender<FrameSnapshot>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        let (snapshots, _) = watch::channel(FrameSnapshot::default());
        Self { events, snapshots: Arc::new(snapshots) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn watch_tracks(&self) -> watch::Receiver<FrameSnapshot> {
        self.snapshots.subscribe()
    }

    /// Cheap handle that can be moved into the engine as a sink
    pub fn sink(&self) -> BusSink {
        BusSink { events: self.events.clone(), snapshots: self.snapshots.clone() }
    }
}

/// `EventSink` half of an `EventBus`
pub struct BusSink {
    events: broadcast::Sender<Event>,
    snapshots: Arc<watch::Sender<FrameSnapshot>>,
}

impl EventSink for BusSink {
    fn publish(&mut self, event: &Event) {
        // Err only means nobody is subscribed right now
        if self.events.send(event.clone()).is_err() {
            debug!(kind = %event.kind.as_str(), "event_no_subscribers");
        }
    }

    fn on_frame(&mut self, timestamp_ms: u64, tracks: &[TrackSnapshot]) {
        self.snapshots.send_replace(FrameSnapshot { timestamp_ms, tracks: tracks.to_vec() });
    }
}

/// Shared in-memory event log
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for EventLog {
    fn publish(&mut self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}
