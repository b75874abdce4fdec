//! Human-readable run report built from the event stream
//!
//! Summary counts by event kind and by activity, the peak number of live
//! persons with the frame it occurred in, theft and weapon totals, then a
//! tabular raw event log.

use crate::domain::event::{Event, EventKind};
use crate::domain::track::TrackSnapshot;
use crate::io::event_bus::EventSink;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeakCount {
    pub count: usize,
    pub timestamp_ms: u64,
}

#[derive(Debug)]
pub struct RunReport {
    person_class: String,
    started_at: DateTime<Utc>,
    frames: u64,
    peak_persons: PeakCount,
    by_kind: BTreeMap<EventKind, u64>,
    by_activity: BTreeMap<String, u64>,
    events: Vec<Event>,
}

impl RunReport {
    pub fn new(person_class: &str) -> Self {
        Self {
            person_class: person_class.to_string(),
            started_at: Utc::now(),
            frames: 0,
            peak_persons: PeakCount::default(),
            by_kind: BTreeMap::new(),
            by_activity: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn record_event(&mut self, event: &Event) {
        *self.by_kind.entry(event.kind).or_default() += 1;
        if event.kind == EventKind::ActivityChange {
            if let Some(activity) = event.detail_str("activity") {
                *self.by_activity.entry(activity.to_string()).or_default() += 1;
            }
        }
        self.events.push(event.clone());
    }

    pub fn record_frame(&mut self, timestamp_ms: u64, tracks: &[TrackSnapshot]) {
        self.frames += 1;
        let persons = tracks.iter().filter(|t| t.class == self.person_class).count();
        if persons > self.peak_persons.count {
            self.peak_persons = PeakCount { count: persons, timestamp_ms };
        }
    }

    pub fn count(&self, kind: EventKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn peak_persons(&self) -> PeakCount {
        self.peak_persons
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "ACTIVITY REPORT");
        let _ = writeln!(out, "===============");
        let _ = writeln!(out, "Started:   {}", self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true));
        let _ = writeln!(out, "Generated: {}", Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        let _ = writeln!(out, "Frames:    {}", self.frames);
        let _ = writeln!(out);

        let _ = writeln!(out, "Summary");
        let _ = writeln!(out, "-------");
        let _ = writeln!(out, "Total events:       {}", self.events.len());
        let _ = writeln!(out, "Theft suspected:    {}", self.count(EventKind::TheftSuspected));
        let _ = writeln!(out, "Weapons sighted:    {}", self.count(EventKind::WeaponSighted));
        let _ = writeln!(out, "Density changes:    {}", self.count(EventKind::DensityLevelChanged));
        let _ = writeln!(
            out,
            "Peak person count:  {} (at {} ms)",
            self.peak_persons.count, self.peak_persons.timestamp_ms
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "Activity changes by activity");
        let _ = writeln!(out, "----------------------------");
        if self.by_activity.is_empty() {
            let _ = writeln!(out, "(none)");
        }
        for (activity, count) in &self.by_activity {
            let _ = writeln!(out, "{:<12} {}", activity, count);
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "Event log");
        let _ = writeln!(out, "---------");
        let _ = writeln!(
            out,
            "{:<24} {:>10}  {:<22} {:<9} {:<10} DETAILS",
            "EMITTED", "FRAME_MS", "KIND", "SEVERITY", "TRACKS"
        );
        for event in &self.events {
            let emitted = DateTime::<Utc>::from_timestamp_millis(event.emitted_at as i64)
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_else(|| "-".to_string());
            let tracks = event.track_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
            let details = event
                .details
                .iter()
                .map(|(k, v)| match v.as_str() {
                    Some(s) => format!("{}={}", k, s),
                    None => format!("{}={}", k, v),
                })
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(
                out,
                "{:<24} {:>10}  {:<22} {:<9} {:<10} {}",
                emitted,
                event.timestamp_ms,
                event.kind.as_str(),
                event.severity.as_str(),
                if tracks.is_empty() { "-".to_string() } else { tracks },
                details
            );
        }
        out
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.render())?;
        info!(path = %path.display(), events = %self.events.len(), "report_written");
        Ok(())
    }
}

/// Cloneable handle: one clone goes into the engine as a sink, the other
/// stays with the caller to render the report afterwards
#[derive(Clone)]
pub struct SharedReport {
    inner: Arc<Mutex<RunReport>>,
}

impl SharedReport {
    pub fn new(person_class: &str) -> Self {
        Self { inner: Arc::new(Mutex::new(RunReport::new(person_class))) }
    }

    pub fn with<R>(&self, f: impl FnOnce(&RunReport) -> R) -> R {
        f(&self.inner.lock())
    }
}

impl EventSink for SharedReport {
    fn publish(&mut self, event: &Event) {
        self.inner.lock().record_event(event);
    }

    fn on_frame(&mut self, timestamp_ms: u64, tracks: &[TrackSnapshot]) {
        self.inner.lock().record_frame(timestamp_ms, tracks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::Severity;
    use crate::domain::types::{Activity, BoundingBox, Point, TrackId};

    fn person(id: u64) -> TrackSnapshot {
        TrackSnapshot {
            id: TrackId(id),
            class: "person".to_string(),
            center: Point::new(0.0, 0.0),
            bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            activity: Activity::Standing,
            last_seen_ms: 0,
            created_ms: 0,
            observations: 1,
        }
    }

    #[test]
    fn test_counts_and_peak() {
        let mut report = RunReport::new("person");
        report.record_frame(0, &[person(1)]);
        report.record_frame(33, &[person(1), person(2), person(3)]);
        report.record_frame(66, &[person(1)]);
        report.record_event(
            &Event::new(EventKind::ActivityChange, 33, Severity::High).with_detail("activity", "running"),
        );
        report.record_event(&Event::new(EventKind::TheftSuspected, 66, Severity::High));

        assert_eq!(report.frames(), 3);
        assert_eq!(report.peak_persons(), PeakCount { count: 3, timestamp_ms: 33 });
        assert_eq!(report.count(EventKind::TheftSuspected), 1);
        assert_eq!(report.count(EventKind::WeaponSighted), 0);
    }

    #[test]
    fn test_render_contains_sections() {
        let mut report = RunReport::new("person");
        report.record_event(
            &Event::new(EventKind::TheftSuspected, 66, Severity::High)
                .with_track(TrackId(4))
                .with_track(TrackId(1))
                .with_detail("object_class", "laptop"),
        );
        let text = report.render();
        assert!(text.contains("Theft suspected:    1"));
        assert!(text.contains("theft_suspected"));
        assert!(text.contains("4,1"));
        assert!(text.contains("object_class=laptop"));
    }

    #[test]
    fn test_shared_handle_as_sink() {
        let report = SharedReport::new("person");
        let mut sink = report.clone();
        sink.on_frame(10, &[person(1), person(2)]);
        sink.publish(&Event::new(EventKind::WeaponSighted, 10, Severity::Critical));
        assert_eq!(report.with(|r| r.count(EventKind::WeaponSighted)), 1);
        assert_eq!(report.with(|r| r.peak_persons().count), 2);
    }
}
