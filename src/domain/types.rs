//! Shared value types for the track-and-classify engine

use serde::{Deserialize, Serialize};

/// Newtype wrapper for track IDs to provide type safety
///
/// Ids are allocated monotonically by the registry and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TrackId(pub u64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned box in pixel space, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    #[inline]
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    pub fn centroid(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    #[inline]
    pub fn diagonal(&self) -> f64 {
        (self.w * self.w + self.h * self.h).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }
}

/// Detection as emitted by the external model, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class: String,
    pub score: f64,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(class: &str, score: f64, bbox: BoundingBox) -> Self {
        Self { class: class.to_string(), score, bbox }
    }
}

/// Validated detection with its centroid precomputed
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class: String,
    pub score: f64,
    pub bbox: BoundingBox,
    pub centroid: Point,
}

/// Classified motion label of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// Only one observation so far, no velocity sample yet
    New,
    Standing,
    Walking,
    Running,
    Jumping,
    QuickExit,
}

impl Activity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::New => "new",
            Activity::Standing => "standing",
            Activity::Walking => "walking",
            Activity::Running => "running",
            Activity::Jumping => "jumping",
            Activity::QuickExit => "quick_exit",
        }
    }

    /// Whether entering this state is worth an `ActivityChange` event
    #[inline]
    pub fn is_notable(&self) -> bool {
        !matches!(self, Activity::New | Activity::Standing)
    }
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crowd density level derived from the live person count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityLevel {
    Low,
    Medium,
    High,
}

impl DensityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DensityLevel::Low => "low",
            DensityLevel::Medium => "medium",
            DensityLevel::High => "high",
        }
    }
}

impl std::fmt::Display for DensityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame's worth of model output, as submitted to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    /// Monotonic frame timestamp in milliseconds
    pub timestamp_ms: u64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

impl FrameDetections {
    pub fn new(timestamp_ms: u64, width: u32, height: u32, detections: Vec<RawDetection>) -> Self {
        Self { timestamp_ms, width, height, detections }
    }
}
