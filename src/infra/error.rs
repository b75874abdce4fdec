//! Error taxonomy
//!
//! Only `Configuration` is fatal. Everything on the per-frame path degrades to
//! "no update this frame" and is counted, never propagated mid-frame.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid threshold values, rejected at engine construction
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Frame-level rejection (zero dimensions, timestamp went backwards)
    #[error("invalid frame at {timestamp_ms}ms: {reason}")]
    InvalidFrame { timestamp_ms: u64, reason: String },

    /// Malformed line in a recorded detection stream
    #[error("recording error: {0}")]
    Recording(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Why a single detection was dropped at ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidDetection {
    NonFinite,
    Degenerate,
    OutOfBounds,
    ScoreOutOfRange,
    LowScore,
}

impl InvalidDetection {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidDetection::NonFinite => "non_finite",
            InvalidDetection::Degenerate => "degenerate",
            InvalidDetection::OutOfBounds => "out_of_bounds",
            InvalidDetection::ScoreOutOfRange => "score_out_of_range",
            InvalidDetection::LowScore => "low_score",
        }
    }
}

/// The detection model failed for one frame; the frame is skipped
#[derive(Debug, Clone, Error)]
#[error("inference failed for frame {seq}: {reason}")]
pub struct InferenceFailure {
    pub seq: u64,
    pub timestamp_ms: u64,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = EngineError::Configuration("track_timeout_ms must be > 0".to_string());
        assert_eq!(err.to_string(), "configuration error: track_timeout_ms must be > 0");

        let failure =
            InferenceFailure { seq: 4, timestamp_ms: 132, reason: "model timeout".to_string() };
        assert_eq!(failure.to_string(), "inference failed for frame 4: model timeout");
    }
}
