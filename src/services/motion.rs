//! Motion estimation from a track's bounded histories

use crate::domain::track::Track;

/// Per-track motion summary for the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEstimate {
    /// Mean displacement per observation over the velocity window (0 with no samples)
    pub avg_speed: f64,
    /// Raw single-frame vertical delta, current minus previous centroid
    pub vertical_delta: f64,
    /// Raw single-frame horizontal delta
    pub horizontal_delta: f64,
    /// Number of velocity samples behind `avg_speed`
    pub samples: usize,
}

/// Estimate motion for a track, or `None` when its state is not usable
pub fn estimate(track: &Track) -> Option<MotionEstimate> {
    let samples = track.velocity_history.len();
    let avg_speed = if samples == 0 {
        0.0
    } else {
        track.velocity_history.iter().sum::<f64>() / samples as f64
    };

    let (horizontal_delta, vertical_delta) = match track.previous_center() {
        Some(prev) => (track.center.x - prev.x, track.center.y - prev.y),
        None => (0.0, 0.0),
    };

    if !avg_speed.is_finite() || !vertical_delta.is_finite() || !horizontal_delta.is_finite() {
        return None;
    }

    Some(MotionEstimate { avg_speed, vertical_delta, horizontal_delta, samples })
}
