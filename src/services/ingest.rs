//! Detection ingest - validates raw model output for one frame
//!
//! Bad detections are routine noise from the model: they are dropped and
//! reported back as rejection reasons, never as errors.

use crate::domain::types::{Detection, FrameDetections, RawDetection};
use crate::infra::error::{EngineError, InvalidDetection};

/// Result of normalizing one frame
#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Accepted detections, in model output order
    pub accepted: Vec<Detection>,
    /// Rejected detections as (index in raw list, reason)
    pub rejected: Vec<(usize, InvalidDetection)>,
}

pub struct DetectionIngest {
    min_score: f64,
}

impl DetectionIngest {
    pub fn new(min_score: f64) -> Self {
        Self { min_score }
    }

    /// Frame-level checks: dimensions must be non-zero and time must not run backwards
    pub fn check_frame(
        &self,
        frame: &FrameDetections,
        last_timestamp_ms: Option<u64>,
    ) -> Result<(), EngineError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(EngineError::InvalidFrame {
                timestamp_ms: frame.timestamp_ms,
                reason: format!("zero frame dimensions {}x{}", frame.width, frame.height),
            });
        }
        if let Some(last) = last_timestamp_ms {
            if frame.timestamp_ms < last {
                return Err(EngineError::InvalidFrame {
                    timestamp_ms: frame.timestamp_ms,
                    reason: format!("timestamp regressed from {}ms", last),
                });
            }
        }
        Ok(())
    }

    /// Validate every detection of the frame and compute centroids
    pub fn normalize(&self, frame: &FrameDetections) -> IngestOutcome {
        let mut outcome = IngestOutcome {
            accepted: Vec::with_capacity(frame.detections.len()),
            rejected: Vec::new(),
        };
        for (idx, raw) in frame.detections.iter().enumerate() {
            match self.validate(raw, frame.width, frame.height) {
                Ok(det) => outcome.accepted.push(det),
                Err(reason) => outcome.rejected.push((idx, reason)),
            }
        }
        outcome
    }

    fn validate(
        &self,
        raw: &RawDetection,
        width: u32,
        height: u32,
    ) -> Result<Detection, InvalidDetection> {
        let b = &raw.bbox;
        if !b.is_finite() || !raw.score.is_finite() {
            return Err(InvalidDetection::NonFinite);
        }
        if b.w <= 0.0 || b.h <= 0.0 {
            return Err(InvalidDetection::Degenerate);
        }
        if b.x < 0.0 || b.y < 0.0 || b.x + b.w > width as f64 || b.y + b.h > height as f64 {
            return Err(InvalidDetection::OutOfBounds);
        }
        if !(0.0..=1.0).contains(&raw.score) {
            return Err(InvalidDetection::ScoreOutOfRange);
        }
        if raw.score < self.min_score {
            return Err(InvalidDetection::LowScore);
        }
        Ok(Detection {
            class: raw.class.clone(),
            score: raw.score,
            bbox: raw.bbox,
            centroid: raw.bbox.centroid(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{BoundingBox, Point};

    fn frame(detections: Vec<RawDetection>) -> FrameDetections {
        FrameDetections::new(0, 640, 480, detections)
    }

    fn person(x: f64, y: f64, score: f64) -> RawDetection {
        RawDetection::new("person", score, BoundingBox::new(x, y, 50.0, 150.0))
    }

    #[test]
    fn test_accepts_valid_detection_with_centroid() {
        let ingest = DetectionIngest::new(0.5);
        let outcome = ingest.normalize(&frame(vec![person(100.0, 100.0, 0.9)]));
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].centroid, Point::new(125.0, 175.0));
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn test_score_floor_is_inclusive() {
        let ingest = DetectionIngest::new(0.5);
        let outcome =
            ingest.normalize(&frame(vec![person(0.0, 0.0, 0.5), person(0.0, 0.0, 0.49)]));
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected, vec![(1, InvalidDetection::LowScore)]);
    }

    #[test]
    fn test_rejection_reasons() {
        let ingest = DetectionIngest::new(0.5);
        let outcome = ingest.normalize(&frame(vec![
            RawDetection::new("person", 0.9, BoundingBox::new(f64::NAN, 0.0, 10.0, 10.0)),
            RawDetection::new("person", 0.9, BoundingBox::new(0.0, 0.0, 0.0, 10.0)),
            RawDetection::new("person", 0.9, BoundingBox::new(600.0, 0.0, 50.0, 10.0)),
            RawDetection::new("person", 1.2, BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
            RawDetection::new("person", 0.9, BoundingBox::new(-1.0, 0.0, 10.0, 10.0)),
        ]));
        assert!(outcome.accepted.is_empty());
        let reasons: Vec<_> = outcome.rejected.iter().map(|(_, r)| *r).collect();
        assert_eq!(
            reasons,
            vec![
                InvalidDetection::NonFinite,
                InvalidDetection::Degenerate,
                InvalidDetection::OutOfBounds,
                InvalidDetection::ScoreOutOfRange,
                InvalidDetection::OutOfBounds,
            ]
        );
    }

    #[test]
    fn test_box_touching_frame_edge_is_accepted() {
        let ingest = DetectionIngest::new(0.5);
        let det = RawDetection::new("laptop", 0.8, BoundingBox::new(590.0, 430.0, 50.0, 50.0));
        assert_eq!(ingest.normalize(&frame(vec![det])).accepted.len(), 1);
    }

    #[test]
    fn test_check_frame() {
        let ingest = DetectionIngest::new(0.5);
        let zero = FrameDetections::new(10, 0, 480, vec![]);
        assert!(matches!(ingest.check_frame(&zero, None), Err(EngineError::InvalidFrame { .. })));

        let ok = FrameDetections::new(10, 640, 480, vec![]);
        assert!(ingest.check_frame(&ok, Some(10)).is_ok());
        assert!(ingest.check_frame(&ok, Some(11)).is_err());
    }
}
