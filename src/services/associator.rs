//! Detection-to-track association
//!
//! The registry hands an `Associator` the live tracks of one class and the
//! new detections of that class; it answers which pairs continue an identity.
//! `GreedyAssociator` is the default. A globally optimal solver can be
//! dropped in behind the same trait.
//!
//! Known limitation of the greedy strategy: two entities crossing within the
//! gate of each other can swap identities. Tracks are never merged or split
//! to correct this.

use crate::domain::types::{Point, TrackId};

/// A live track offered for matching
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub track_id: TrackId,
    pub center: Point,
    /// Maximum centroid distance (exclusive) for this track, already scaled
    pub gate: f64,
}

/// One accepted track/detection pairing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    /// Index into the candidate slice
    pub track: usize,
    /// Index into the detection slice
    pub detection: usize,
    pub distance: f64,
}

/// Strategy for resolving identities within one class
pub trait Associator: Send {
    /// Pair detections with tracks. Each track and each detection appears at
    /// most once; every pair must be strictly inside the track's gate.
    fn associate(&self, tracks: &[Candidate], detections: &[Point]) -> Vec<Assignment>;

    fn name(&self) -> &'static str;
}

/// Greedy nearest-centroid matching
///
/// All in-gate pairs sorted by ascending distance, taken first come first
/// served. Ties break on lower track id, then lower detection index.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyAssociator;

impl Associator for GreedyAssociator {
    fn associate(&self, tracks: &[Candidate], detections: &[Point]) -> Vec<Assignment> {
        let mut pairs: Vec<Assignment> = Vec::with_capacity(tracks.len() * detections.len());
        for (ti, track) in tracks.iter().enumerate() {
            for (di, det) in detections.iter().enumerate() {
                let distance = track.center.distance(det);
                if distance < track.gate {
                    pairs.push(Assignment { track: ti, detection: di, distance });
                }
            }
        }

        pairs.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| tracks[a.track].track_id.cmp(&tracks[b.track].track_id))
                .then_with(|| a.detection.cmp(&b.detection))
        });

        let mut track_taken = vec![false; tracks.len()];
        let mut det_taken = vec![false; detections.len()];
        let mut assignments = Vec::with_capacity(tracks.len().min(detections.len()));
        for pair in pairs {
            if track_taken[pair.track] || det_taken[pair.detection] {
                continue;
            }
            track_taken[pair.track] = true;
            det_taken[pair.detection] = true;
            assignments.push(pair);
        }
        assignments
    }

    fn name(&self) -> &'static str {
        "greedy"
    }
}
