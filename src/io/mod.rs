//! I/O adapters - output port implementations and file sources
//!
//! This module contains the engine's external surfaces:
//! - `event_bus` - Sink trait, broadcast subscription and track snapshots
//! - `egress` - JSONL event log
//! - `frame_source` - Recorded detection streams and replay detector
//! - `report` - Human-readable run report

pub mod egress;
pub mod event_bus;
pub mod frame_source;
pub mod report;

// Re-export commonly used types
pub use egress::EventEgress;
pub use event_bus::{BusSink, EventBus, EventLog, EventSink, FrameSnapshot};
pub use frame_source::{captured_frames, read_recording, FrameRecord, ReplayDetector};
pub use report::{RunReport, SharedReport};
