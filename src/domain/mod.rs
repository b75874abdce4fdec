//! Domain models - core value types of the engine
//!
//! This module contains the canonical data types used throughout the system:
//! - `RawDetection` / `Detection` - per-frame model output before and after validation
//! - `Track` - a persistent identity re-associated frame to frame
//! - `Activity` / `DensityLevel` - classified labels
//! - `Event` - immutable records emitted to consumers

pub mod event;
pub mod track;
pub mod types;

// Re-export commonly used types at module level
pub use event::{Event, EventKind, Severity};
pub use track::{Track, TrackSnapshot};
pub use types::{
    Activity, BoundingBox, DensityLevel, Detection, FrameDetections, Point, RawDetection, TrackId,
};
