//! Event egress - appends every emitted event to a file
//!
//! Events are written in JSONL format (one JSON object per line)
//! to the file specified in config.

use crate::domain::event::Event;
use crate::io::event_bus::EventSink;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};

/// Egress writer for events
pub struct EventEgress {
    file_path: String,
    written: u64,
    failed: u64,
}

impl EventEgress {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "egress_initialized");
        Self { file_path: file_path.to_string(), written: 0, failed: 0 }
    }

    /// Write an event to the egress file
    /// Returns true if successful, false otherwise
    pub fn write_event(&mut self, event: &Event) -> bool {
        match self.append_line(&event.to_json()) {
            Ok(()) => {
                self.written += 1;
                true
            }
            Err(e) => {
                self.failed += 1;
                error!(
                    event_id = %event.id,
                    kind = %event.kind.as_str(),
                    error = %e,
                    "event_egress_failed"
                );
                false
            }
        }
    }

    /// Append a line to the egress file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path, bytes = %line.len(), "egress_written");

        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }
}

impl EventSink for EventEgress {
    fn publish(&mut self, event: &Event) {
        self.write_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{EventKind, Severity};
    use crate::domain::types::TrackId;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_egress_new() {
        let egress = EventEgress::new("test.jsonl");
        assert_eq!(egress.file_path, "test.jsonl");
        assert_eq!(egress.written(), 0);
    }

    #[test]
    fn test_write_event() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("events.jsonl");
        let mut egress = EventEgress::new(file_path.to_str().unwrap());

        let event = Event::new(EventKind::TheftSuspected, 1234, Severity::High)
            .with_track(TrackId(4))
            .with_track(TrackId(2))
            .with_detail("object_class", "handbag");
        assert!(egress.write_event(&event));

        let content = fs::read_to_string(&file_path).unwrap();
        assert!(content.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["id"], event.id);
        assert_eq!(parsed["kind"], "theft_suspected");
        assert_eq!(parsed["track_ids"][0], 4);
    }

    #[test]
    fn test_sink_appends_lines_in_order() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("nested").join("events.jsonl");
        let mut egress = EventEgress::new(file_path.to_str().unwrap());

        for ts in [10, 20, 30] {
            egress.publish(&Event::new(EventKind::ActivityChange, ts, Severity::Low));
        }

        let content = fs::read_to_string(&file_path).unwrap();
        let stamps: Vec<u64> = content
            .lines()
            .map(|l| serde_json::from_str::<Event>(l).unwrap().timestamp_ms)
            .collect();
        assert_eq!(stamps, vec![10, 20, 30]);
        assert_eq!(egress.written(), 3);
    }

    #[test]
    fn test_unwritable_path_counts_failure() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened for append
        let mut egress = EventEgress::new(dir.path().to_str().unwrap());
        assert!(!egress.write_event(&Event::new(EventKind::ActivityChange, 1, Severity::Low)));
        assert_eq!(egress.failed(), 1);
    }
}
